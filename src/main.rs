//! Bitcoin private-key range scanner CLI
//!
//! Usage:
//!   btc_range_finder --puzzle 20 -f wallets.txt        # Scan puzzle #20
//!   btc_range_finder --min 1 --max 0x10000 -a 1BgGZ9... # Explicit range
//!   RUST_LOG=debug btc_range_finder -p 30 -f wallets.txt -w 4

use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use btc_range_finder::worker::{ProgressSample, StopHandle};
use btc_range_finder::{
    Config, Coordinator, FileSink, Match, ProgressSink, RunStatus, SearchError, SearchStats,
    Secp256k1Provider,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        process::exit(1);
    }

    let (range, targets) = match config.key_range().and_then(|r| Ok((r, config.load_targets()?))) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // Print startup info
    println!("Bitcoin Range Finder");
    println!("====================");
    println!("Range:      {}", range);
    println!("Keys:       {}", range.size());
    println!("Targets:    {} address(es)", targets.len());
    println!("Workers:    {}", config.worker_count());
    println!("Output:     {}", config.output.display());
    println!();

    let coordinator = match Coordinator::new(config.search_config(), Arc::new(Secp256k1Provider::new())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    ctrlc_handler(coordinator.stop_handle());

    println!("Searching... (Press Ctrl+C to stop)\n");

    let mut sink = FileSink::new(&config.output, &config.checkpoint);
    let mut progress = ConsoleProgress::new(Duration::from_secs(config.report_interval));

    match coordinator.search(range, Arc::new(targets), &mut sink, &mut progress) {
        Ok(stats) => {
            if stats.status == RunStatus::Stopped {
                println!("\nStopped by user.");
            }
            print_matches(&stats.total_matches);
            print_stats(&stats);
        }
        Err(SearchError::WorkerFailed {
            worker,
            reason,
            stats,
        }) => {
            eprintln!("\nWorker {} failed: {}", worker, reason);
            print_matches(&stats.total_matches);
            print_stats(&stats);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Search error: {}", e);
            process::exit(2);
        }
    }
}

/// Prints aggregate throughput at most once per interval.
struct ConsoleProgress {
    interval: Duration,
    started: Instant,
    last_report: Instant,
}

impl ConsoleProgress {
    fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            interval,
            started: now,
            last_report: now,
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&mut self, sample: &ProgressSample, total_keys_checked: u64) {
        if self.last_report.elapsed() < self.interval {
            return;
        }
        self.last_report = Instant::now();

        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            total_keys_checked as f64 / elapsed
        } else {
            0.0
        };

        println!(
            "[{:>4}s] Checked {} keys ({}/s), last 0x{}",
            elapsed as u64,
            format_number(total_keys_checked),
            format_number(rate as u64),
            sample.last_candidate_hex.trim_start_matches('0')
        );
    }
}

fn print_matches(matches: &[Match]) {
    for (i, found) in matches.iter().enumerate() {
        println!("=== Match #{} ===", i + 1);
        println!("Address:     {}", found.address);
        println!("Private Key: {}", found.candidate_hex);
        println!("WIF:         {}", found.secret_export);
        println!();
    }
}

fn print_stats(stats: &SearchStats) {
    println!("\n--- Final Statistics ---");
    println!("Total keys checked:   {}", format_number(stats.total_keys_checked));
    println!("Total matches found:  {}", stats.total_matches.len());
    println!("Time elapsed:         {:.2}s", stats.elapsed.as_secs_f64());
    println!(
        "Average speed:        {}/s",
        format_number(stats.keys_per_second() as u64)
    );
    if stats.detached_workers > 0 {
        println!("Workers abandoned:    {}", stats.detached_workers);
    }
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn ctrlc_handler(stop: StopHandle) {
    if let Err(e) = ctrlc::set_handler(move || stop.stop()) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }
}
