//! gx-track: headless playback, WAV export and pattern dumps.
//!
//! # Usage
//!
//! ```bash
//! gx-track play demos/progression.txt
//! gx-track render demos/progression.txt --wav out.wav --loops 2
//! gx-track dump demos/progression.txt
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gx_ir::notation::note_label;
use gx_ir::{Pattern, CHANNELS, FM_CHANNELS, ROWS};
use gx_master::{AudioError, Controller, EngineConfig};

#[derive(Parser)]
#[command(name = "gx-track")]
#[command(author, version, about = "FM step-sequencer tracker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a pattern on the default audio device
    Play {
        /// Pattern text file
        pattern: PathBuf,

        /// Row to start from (hex or decimal)
        #[arg(long, short = 'r', default_value = "0", value_parser = parse_row)]
        row: usize,

        /// Stop after this many seconds (default: until a stop effect)
        #[arg(long, short = 's')]
        seconds: Option<u64>,

        /// Ticks per row until the pattern sets its own speed
        #[arg(long, default_value = "6")]
        speed: u8,
    },
    /// Render a pattern to a WAV file
    Render {
        /// Pattern text file
        pattern: PathBuf,

        /// Output file
        #[arg(long, short = 'w')]
        wav: PathBuf,

        /// Times to play the pattern through
        #[arg(long, short = 'l', default_value = "1")]
        loops: u32,

        /// Output sample rate
        #[arg(long, default_value = "44100")]
        rate: u32,

        /// Upper bound on output length
        #[arg(long, default_value = "300")]
        max_seconds: u32,

        #[arg(long, default_value = "6")]
        speed: u8,
    },
    /// Print a pattern as a table
    Dump {
        /// Pattern text file
        pattern: PathBuf,

        /// Show the four sequencer-only channels too
        #[arg(long, short = 'a')]
        all: bool,
    },
}

fn parse_row(s: &str) -> Result<usize, String> {
    let row = match s.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| e.to_string())?;
    if row >= ROWS {
        return Err(format!("row must be below {ROWS}"));
    }
    Ok(row)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Play {
            pattern,
            row,
            seconds,
            speed,
        } => {
            let config = EngineConfig {
                initial_speed: speed,
                ..Default::default()
            };
            play(config, &pattern, row, seconds.map(Duration::from_secs))
        }
        Command::Render {
            pattern,
            wav,
            loops,
            rate,
            max_seconds,
            speed,
        } => {
            let config = EngineConfig {
                sample_rate: rate,
                initial_speed: speed,
                ..Default::default()
            };
            render(config, &pattern, &wav, loops, max_seconds)
        }
        Command::Dump { pattern, all } => {
            let pattern = gx_formats::load_pattern_file(&pattern)
                .with_context(|| format!("reading {}", pattern.display()))?;
            dump(&pattern, if all { CHANNELS } else { FM_CHANNELS });
            Ok(())
        }
    }
}

fn load(ctrl: &Controller, path: &Path) -> Result<()> {
    ctrl.load_pattern_file(path)
        .with_context(|| format!("reading {}", path.display()))
}

fn play(config: EngineConfig, path: &Path, row: usize, limit: Option<Duration>) -> Result<()> {
    let mut ctrl = Controller::new(config);
    load(&ctrl, path)?;

    let rate = match ctrl.open_audio() {
        Ok(rate) => rate,
        Err(AudioError::NoDevice) => bail!("no audio output device found"),
        Err(AudioError::FormatMismatch(what)) => {
            bail!("audio device cannot play 16-bit stereo ({what})")
        }
        Err(err) => return Err(err).context("could not open audio device"),
    };
    tracing::info!("output at {rate} Hz");

    ctrl.start(row);
    let started = Instant::now();
    let mut out = std::io::stdout();

    while ctrl.playhead().playing {
        if limit.is_some_and(|l| started.elapsed() >= l) {
            break;
        }
        if !ctrl.is_audio_open() {
            bail!("audio stream ended unexpectedly");
        }
        if ctrl.take_redraw() {
            let ph = ctrl.playhead();
            let _ = write!(out, "\rRow: {:02X} | Speed: {}  ", ph.row, ph.speed);
            let _ = out.flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    ctrl.stop();
    // Let the cut notes release before closing the device.
    std::thread::sleep(Duration::from_millis(100));
    ctrl.close_audio();
    println!("\rDone.                    ");
    Ok(())
}

fn render(
    config: EngineConfig,
    path: &Path,
    wav_path: &Path,
    loops: u32,
    max_seconds: u32,
) -> Result<()> {
    let rate = config.sample_rate;
    let ctrl = Controller::new(config);
    load(&ctrl, path)?;

    println!("Rendering to {} at {} Hz...", wav_path.display(), rate);
    let wav = ctrl.render_to_wav(loops, max_seconds);
    std::fs::write(wav_path, &wav)
        .with_context(|| format!("writing {}", wav_path.display()))?;
    println!("Wrote {} bytes", wav.len());
    Ok(())
}

fn dump(pattern: &Pattern, channels: usize) {
    let mut header = String::from("   ");
    for ch in 0..channels {
        header.push_str(&format!("| ch{ch:<9}"));
    }
    println!("{header}");

    for row in 0..ROWS {
        let mut line = format!("{row:02x} ");
        for cell in &pattern.row(row)[..channels] {
            let label = note_label(cell.note());
            line.push_str(&format!(
                "| {} {:02x} {:02x} {:x}{:02x}",
                String::from_utf8_lossy(&label),
                cell.instrument,
                cell.volume,
                cell.effect_hi & 0x0f,
                cell.effect_lo
            ));
        }
        println!("{line}");
    }
}
