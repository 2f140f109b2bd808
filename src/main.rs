//! CREATE2 Vanity Salt Miner CLI
//!
//! Usage:
//!   create2-vanity -p 0x92e9 --artifacts out --contract Token --constructor-args 0x...
//!   create2-vanity -p dead --init-code-hash 0x... -m 10000000
//!   create2-vanity -p dead --bytecode 0x6080... --start 4000000   # resume
//!
//! Prints the salt, the predicted address and the factory calldata to submit.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;

use create2_vanity::deploy::factory_calldata;
use create2_vanity::search::{self, Progress};
use create2_vanity::{Config, SearchOutcome, SearchResult};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        process::exit(1);
    }

    let target = match config.target() {
        Ok(target) => target,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // Random starts stay below 2^48 so the printed resume point is easy to reuse.
    let start = if config.random_start {
        rand::thread_rng().gen_range(0..1u64 << 48)
    } else {
        config.start
    };

    let params = match config.search_params(&target, start) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    let pattern = &params.pattern;

    println!("CREATE2 Vanity Salt Miner");
    println!("=========================");
    println!(
        "Prefix:     0x{} ({})",
        pattern.prefix(),
        if pattern.case_sensitive() {
            "case sensitive"
        } else {
            "case insensitive"
        }
    );
    println!("Difficulty: {}", pattern.difficulty_description());
    println!("Factory:    {}", params.deployer);
    println!("Init hash:  {}", params.init_code_hash);
    println!("Start:      {}", params.starting_iteration);
    match params.max_iterations {
        Some(budget) => println!("Budget:     {} iterations", format_number(budget)),
        None => println!("Budget:     unlimited"),
    }
    println!("Workers:    {}", config.worker_count());
    println!();

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("could not install Ctrl-C handler: {}", e);
    }

    println!("Searching... (Press Ctrl+C to stop)\n");

    let outcome = search::search_with(
        &params,
        config.worker_count(),
        cancel,
        Duration::from_secs(config.report_interval),
        &mut print_progress,
    );

    match outcome {
        SearchOutcome::Found(result) => print_result(&result, target.init_code.as_deref()),
        SearchOutcome::Exhausted { searched } => {
            println!("\nNo match in {} iterations.", format_number(searched));
            println!(
                "Resume with --start {} or relax the prefix.",
                params.starting_iteration.saturating_add(searched)
            );
            process::exit(2);
        }
        SearchOutcome::Cancelled {
            searched,
            resume_at,
        } => {
            println!("\nStopped after {} iterations.", format_number(searched));
            println!("Resume with --start {} to continue.", resume_at);
            process::exit(130);
        }
    }
}

fn print_result(result: &SearchResult, init_code: Option<&[u8]>) {
    println!("=== Match ===");
    println!("Address:    {}", result.address);
    println!("Salt:       {}", result.salt);
    println!("Iteration:  {}", result.iteration);
    if let Some(code) = init_code {
        println!(
            "Calldata:   0x{}",
            hex::encode(factory_calldata(&result.salt, code))
        );
    }
    println!();
}

fn print_progress(progress: Progress) {
    println!(
        "[{:>4}s] Tried {} salts ({}/s)",
        progress.elapsed.as_secs(),
        format_number(progress.iterations),
        format_number(progress.per_second() as u64)
    );
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1e9)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1e6)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1e3)
    } else {
        n.to_string()
    }
}
