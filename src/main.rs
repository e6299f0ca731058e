//! Runs or searches a program from the command line.
//!
//! # Usage
//! ```text
//! vmsearch <program> [OPTIONS]
//! ```
//!
//! # Modes
//! - `run` (default): run once and print the final state
//! - `sweep`: enumerate `--sweep` ranges until `--target` holds
//! - `mutate`: swap one mnemonic at a time until the program terminates
//!
//! # Environment
//! `VMSEARCH_WORKERS` and `VMSEARCH_MAX_STEPS` supply defaults for
//! `--workers` and `--max-steps`.

use std::env;
use std::fs;
use std::process;
use std::str::FromStr;
use vmsearch::search::sweep::Dimension;
use vmsearch::utils::log::{Level, set_min_level};
use vmsearch::virtual_machine::assembler::parse_source_with_name;
use vmsearch::virtual_machine::vm::{DEFAULT_STEP_LIMIT, ExecutionResult, StopReason};
use vmsearch::{
    Dialect, Invocation, Location, Outcome, SearchConfig, SearchMode, Target, VMError,
};
use vmsearch::{error, warn};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let program_path = &args[1];
    let mut dialect = Dialect::Accumulator;
    let mut mode = "run".to_string();
    let mut memory: Vec<i64> = Vec::new();
    let mut overrides: Vec<(Location, i64)> = Vec::new();
    let mut dimensions: Vec<Dimension> = Vec::new();
    let mut target: Option<Target> = None;
    let mut swaps: Vec<(String, String)> = Vec::new();
    let mut loop_detect = false;
    let mut max_steps = initial_max_steps(env_number("VMSEARCH_MAX_STEPS"));
    let mut workers: usize = env_number("VMSEARCH_WORKERS").unwrap_or(1);

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--loop-detect" => loop_detect = true,
            "--quiet" | "-q" => set_min_level(Level::Warn),
            "--dialect" | "-d" => dialect = parse_or_exit(flag, value(&args, &mut i)),
            "--mode" | "-m" => mode = value(&args, &mut i).to_string(),
            "--set" => {
                let text = value(&args, &mut i);
                let Some((location, v)) = text.split_once('=') else {
                    error!("{flag} expects LOC=VALUE, got '{text}'");
                    process::exit(1);
                };
                overrides.push((parse_or_exit(flag, location), parse_or_exit(flag, v.trim())));
            }
            "--memory" => {
                memory = value(&args, &mut i)
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| parse_or_exit(flag, s.trim()))
                    .collect();
            }
            "--sweep" => dimensions.push(parse_or_exit(flag, value(&args, &mut i))),
            "--target" | "-t" => target = Some(parse_or_exit(flag, value(&args, &mut i))),
            "--swap" => {
                let text = value(&args, &mut i);
                let Some((a, b)) = text.split_once(':') else {
                    error!("{flag} expects A:B, got '{text}'");
                    process::exit(1);
                };
                swaps.push((a.to_string(), b.to_string()));
            }
            "--max-steps" => {
                let text = value(&args, &mut i);
                max_steps = match text {
                    "none" => None,
                    n => Some(parse_or_exit(flag, n)),
                };
            }
            "--workers" | "-j" => workers = parse_or_exit(flag, value(&args, &mut i)),
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let source = fs::read_to_string(program_path).unwrap_or_else(|e| {
        error!("Failed to read {}: {}", program_path, e);
        process::exit(1);
    });
    let program = parse_source_with_name(&source, program_path).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    let mode = match mode.as_str() {
        "run" => SearchMode::SingleRun,
        "sweep" => SearchMode::ParameterSweep(dimensions),
        "mutate" => SearchMode::SingleMutation {
            pairs: (!swaps.is_empty()).then_some(swaps),
        },
        other => {
            error!("Unknown mode '{other}', expected run, sweep or mutate");
            process::exit(1);
        }
    };

    if loop_detect && !dialect.pc_loop_detection_sound() {
        warn!("{dialect} branches read registers; --loop-detect may stop terminating runs");
    }

    let mut invocation = Invocation::new(source, dialect)
        .with_memory(memory)
        .with_mode(mode)
        .with_config(search_config(workers, max_steps, loop_detect));
    invocation.overrides = overrides;
    invocation.target = target;

    match invocation.execute_program(&program) {
        Ok(Outcome::Run(result)) => {
            print_result(&result);
            if !result.terminated() {
                process::exit(2);
            }
        }
        Ok(Outcome::Sweep(found)) => {
            let point = invocation_dimensions(&invocation)
                .iter()
                .zip(&found.candidate)
                .map(|(d, v)| format!("{}={}", d.location, v))
                .collect::<Vec<_>>()
                .join(" ");
            println!("found: {point}");
            print_result(&found.result);
        }
        Ok(Outcome::Mutation(found)) => {
            println!("found: {}", found.candidate);
            print_result(&found.result);
        }
        Err(e @ VMError::NoSatisfyingCandidate { .. }) => {
            error!("{e}");
            process::exit(2);
        }
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

/// Step limit before `--max-steps` is seen: the environment, else the default.
fn initial_max_steps(from_env: Option<u64>) -> Option<u64> {
    from_env.or(Some(DEFAULT_STEP_LIMIT))
}

fn search_config(workers: usize, max_steps: Option<u64>, loop_detect: bool) -> SearchConfig {
    let mut config = SearchConfig::default().with_workers(workers);
    config.run = config
        .run
        .with_max_steps(max_steps)
        .with_loop_detection(loop_detect);
    config
}

fn invocation_dimensions(invocation: &Invocation) -> &[Dimension] {
    match &invocation.mode {
        SearchMode::ParameterSweep(dimensions) => dimensions,
        _ => &[],
    }
}

fn print_result(result: &ExecutionResult) {
    let stop = match result.stop {
        StopReason::Halted => "halted".to_string(),
        StopReason::LoopDetected { pc } => format!("loop detected at pc {pc}"),
        StopReason::StepLimitExceeded { limit } => format!("step limit {limit} exceeded"),
    };
    println!("{stop} after {} step(s)", result.steps);
    println!("{}", result.final_state);
    if !result.final_state.memory().is_empty() {
        let cells = result
            .final_state
            .memory()
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!("memory: {cells}");
    }
}

/// Advances past the flag and returns its argument, exiting if it is missing.
fn value<'a>(args: &'a [String], i: &mut usize) -> &'a str {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            error!("{flag} requires an argument");
            process::exit(1);
        }
    }
}

fn parse_or_exit<T>(flag: &str, text: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text.parse().unwrap_or_else(|e| {
        error!("Invalid value for {flag}: '{text}' ({e})");
        process::exit(1);
    })
}

fn env_number<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {key}: '{raw}' is not a number");
            None
        }
    }
}

const USAGE: &str = "\
VM runner and search

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Program source file, one instruction per line

OPTIONS:
    -d, --dialect <tag>      accumulator (default), lock or tape
    -m, --mode <mode>        run (default), sweep or mutate
        --set <LOC=V>        Initial value for a register or @cell (repeatable)
        --memory <v,v,...>   Initial flat memory
        --sweep <LOC=LO..HI> Sweep dimension, outermost first (repeatable)
    -t, --target <LOC=V>     Value required after a terminating run
        --swap <A:B>         Mutable mnemonic pair (repeatable)
        --max-steps <n>      Step limit per run (default 1000000), 'none' for unbounded
    -j, --workers <n>        Worker threads for searches (default 1)
        --loop-detect        Stop runs that revisit an instruction
    -q, --quiet              Only log warnings and errors
    -h, --help               Print this help message

ENVIRONMENT:
    VMSEARCH_WORKERS         Default for --workers
    VMSEARCH_MAX_STEPS       Default for --max-steps

EXAMPLES:
    # Find the jmp/nop swap that makes a boot program terminate
    {program} boot.txt --mode mutate

    # Find noun and verb for a tape program
    {program} tape.txt -d tape --memory 1,0,0,3 --mode sweep \\
        --sweep @1=0..99 --sweep @2=0..99 --target @0=19690720 -j 8
";

fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
