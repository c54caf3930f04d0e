//! Example Processor (peer)
//!
//! Attaches to a segment created by the `host` example and serves requests
//! until the requested number of cycles is done.
//!
//!   cargo run --example processor -- --name audio_demo

use audio_shm::{AudioShmError, Processor, Served, TransportConfig};
use clap::Parser;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "processor")]
#[command(about = "Serve audio requests from a shared memory segment", long_about = None)]
struct Cli {
    /// Segment name
    #[arg(short, long, default_value = "audio_demo")]
    name: String,

    /// Number of requests to serve before exiting
    #[arg(short, long, default_value = "1")]
    cycles: u32,

    /// How long to wait for the host, in seconds
    #[arg(short, long, default_value = "30")]
    wait_secs: u64,
}

fn attach(name: &str, config: &TransportConfig, deadline: Instant) -> Result<Processor, AudioShmError> {
    loop {
        match Processor::open(name, config.clone()) {
            Ok(p) => return Ok(p),
            Err(AudioShmError::ShmOpen { .. }) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let wait = Duration::from_secs(cli.wait_secs);
    let config = TransportConfig::default().with_timeout(wait);

    println!("[Processor] Attaching to segment: {}", cli.name);

    let processor = match attach(&cli.name, &config, Instant::now() + wait) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[Processor] Failed to attach: {}", e);
            eprintln!("[Processor] Make sure the host is running first!");
            std::process::exit(1);
        }
    };

    println!("[Processor] Attached, waiting for requests...");

    for cycle in 1..=cli.cycles {
        match processor.wait_and_serve() {
            Ok(Served::Done { elapsed_ns }) => {
                println!("[Processor] #{} DONE in {} ns", cycle, elapsed_ns);
            }
            Ok(Served::Failed(e)) => {
                println!("[Processor] #{} ERROR: {}", cycle, e);
            }
            Err(e) => {
                eprintln!("[Processor] Gave up: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("[Processor] Served {} request(s), exiting", cli.cycles);
}
