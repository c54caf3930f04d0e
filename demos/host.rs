//! Example Host (producer)
//!
//! Creates a segment, submits a sine test signal and writes the input and the
//! processed output as 16-bit WAV files.
//!
//!   cargo run --example host -- --name audio_demo --gain 1.5
//!   cargo run --example processor -- --name audio_demo

use audio_shm::{pcm, wav, ProcessParams, Producer, StreamShape, TransportConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "host")]
#[command(about = "Submit a test signal through a shared memory segment", long_about = None)]
struct Cli {
    /// Segment name
    #[arg(short, long, default_value = "audio_demo")]
    name: String,

    /// Sample rate in Hz
    #[arg(long, default_value = "44100")]
    sample_rate: u32,

    /// Number of channels
    #[arg(long, default_value = "2")]
    channels: u16,

    /// Number of frames
    #[arg(long, default_value = "44100")]
    frames: u32,

    /// Sine frequency in Hz
    #[arg(long, default_value = "440.0")]
    freq: f32,

    /// Linear gain before soft clipping
    #[arg(short, long, default_value = "1.0")]
    gain: f32,

    /// Copy input to output untouched
    #[arg(short, long)]
    bypass: bool,

    /// How long to wait for the processor, in seconds
    #[arg(short, long, default_value = "30")]
    timeout_secs: u64,

    /// Directory for input.wav / output.wav
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let shape = StreamShape::new(cli.sample_rate, cli.channels as u32, cli.frames);
    let config = TransportConfig::default().with_timeout(Duration::from_secs(cli.timeout_secs));

    let mut producer = match Producer::create(&cli.name, shape, config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[Host] Failed to create segment: {}", e);
            std::process::exit(1);
        }
    };
    println!("[Host] Segment '{}' ready ({:?})", producer.name(), shape);

    let input = pcm::generate_test_signal(cli.sample_rate, cli.frames, shape.channels, cli.freq);
    let params = ProcessParams {
        gain: cli.gain,
        bypass: cli.bypass,
    };

    println!("[Host] Submitting {} samples, waiting for processor...", input.len());
    let completion = match producer.submit(&input, params) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[Host] Request failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("[Host] Processed in {} ns", completion.elapsed_ns);

    let files = [("input.wav", &input), ("output.wav", &completion.samples)];
    for (file, samples) in files {
        let path = cli.out_dir.join(file);
        match wav::write_wav(&path, samples, cli.sample_rate, cli.channels, cli.frames) {
            Ok(()) => println!("[Host] Wrote {}", path.display()),
            Err(e) => eprintln!("[Host] {}", e),
        }
    }
}
