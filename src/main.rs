use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use sound_recogniser::audio::MicSource;
use sound_recogniser::replay::ReplaySource;
use sound_recogniser::{AudioSource, Library, Recognizer};

#[derive(Parser)]
#[command(name = "sound-recogniser")]
#[command(about = "Recognise whistles, claps and short cues from spectral peaks")]
struct Args {
    /// Pattern library (TOML)
    #[arg(short, long)]
    patterns: PathBuf,

    /// Replay analysed frames from a file instead of the microphone
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Command to execute on detection
    #[arg(short, long)]
    command: Option<String>,

    /// Log every frame's peaks
    #[arg(long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_frame<S: AudioSource>(recognizer: &Recognizer<S>) {
    if let Some(frame) = recognizer.window().last() {
        debug!(peaks = ?frame.peaks(), window = recognizer.window().len(), "frame");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let start = Instant::now();
    let library = Library::load(&args.patterns)
        .with_context(|| format!("Failed to load patterns from {}", args.patterns.display()))?;

    let (source, replay_frames): (Box<dyn AudioSource>, Option<usize>) = match &args.replay {
        Some(path) => {
            let replay = ReplaySource::load(path)?;
            let frames = replay.frames().len();
            (Box::new(replay) as Box<dyn AudioSource>, Some(frames))
        }
        None => (Box::new(MicSource::new()?) as Box<dyn AudioSource>, None),
    };
    let mut recognizer = library.recognizer(source)?;
    info!(
        patterns = library.patterns.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "patterns loaded"
    );

    let command = args.command.clone();
    recognizer.start_analysing(move |name: &str| {
        println!(">>> DETECTED: {} <<<", name);

        // Execute command if provided
        if let Some(cmd) = &command {
            info!("Executing: {}", cmd);
            if let Err(err) = Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .env("SOUND_NAME", name)
                .spawn()
            {
                warn!("Failed to run '{}': {}", cmd, err);
            }
        }
    })?;

    match replay_frames {
        Some(frames) => {
            let mut detections = 0;
            for _ in 0..frames {
                if recognizer.ingest()?.is_some() {
                    detections += 1;
                }
                if args.verbose {
                    log_frame(&recognizer);
                }
            }
            recognizer.stop_analysing()?;
            info!(frames, detections, "replay finished");
        }
        None => {
            info!("Listening... (Ctrl+C to quit)");
            loop {
                recognizer.ingest()?;
                if args.verbose {
                    log_frame(&recognizer);
                }
            }
        }
    }

    Ok(())
}
