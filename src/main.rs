//! gifplug - GIF inspector and player
//!
//! Command line front end over the decode context.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gp_context::animation::delay_duration;
use gp_context::{Animation, Playback, Tick};
use gp_core::config::LogLevel;
use gp_core::{logging, Config};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "gifplug", version, about = "Inspect and play GIF animations")]
struct Cli {
    /// Configuration file to use instead of the per-user one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print canvas and per-frame information
    Info { file: PathBuf },

    /// Run the playback schedule in real time
    Play {
        file: PathBuf,

        /// Restart from the first frame instead of stopping
        #[arg(long = "loop")]
        looping: bool,

        /// Playback rate multiplier (0 to 10)
        #[arg(long)]
        speed: Option<f32>,
    },
}

fn parse_log_level(value: &str) -> std::result::Result<LogLevel, String> {
    match value.to_ascii_lowercase().as_str() {
        "off" => Ok(LogLevel::Off),
        "error" => Ok(LogLevel::Error),
        "warn" => Ok(LogLevel::Warn),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "trace" => Ok(LogLevel::Trace),
        other => Err(format!("unknown log level '{}'", other)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    logging::init(cli.log_level.unwrap_or(config.debug.log_level));

    match cli.command {
        Command::Info { file } => info_command(&file, &config),
        Command::Play {
            file,
            looping,
            speed,
        } => play_command(&file, &config, looping, speed),
    }
}

fn open(path: &Path, config: &Config) -> Result<Animation<'static>> {
    Animation::open(path, &config.io).with_context(|| format!("failed to open {}", path.display()))
}

fn info_command(path: &Path, config: &Config) -> Result<()> {
    let animation = open(path, config)?;

    println!("{}", path.display());
    println!("  canvas: {}x{}", animation.width(), animation.height());
    match animation.loop_count() {
        Some(0) => println!("  loops:  forever"),
        Some(count) => println!("  loops:  {}", count),
        None => println!("  loops:  none"),
    }
    println!("  frames: {}", animation.frame_count());

    for (index, frame) in animation.frames().iter().enumerate() {
        println!(
            "  {:>4}: {}x{} at ({}, {}), {} ms, {:?}{}",
            index,
            frame.width,
            frame.height,
            frame.left,
            frame.top,
            delay_duration(frame.delay).as_millis(),
            frame.disposal,
            if frame.display { "" } else { ", off canvas" }
        );
    }
    Ok(())
}

fn play_command(path: &Path, config: &Config, looping: bool, speed: Option<f32>) -> Result<()> {
    let mut settings = config.playback.clone();
    settings.looping |= looping;
    if let Some(speed) = speed {
        settings.speed = speed;
    }

    let mut animation = open(path, config)?;
    let mut playback = Playback::new(&settings);
    if playback.speed() == 0.0 {
        bail!("playback speed is 0, nothing would ever advance");
    }
    playback.start(&animation);
    info!(
        "playing {} ({} frames, {}x{})",
        path.display(),
        animation.frame_count(),
        animation.width(),
        animation.height()
    );

    let mut last = Instant::now();
    while let Some(wait) = playback.until_next() {
        thread::sleep(wait);
        let now = Instant::now();
        let tick = playback.tick(&mut animation, now - last)?;
        last = now;

        match tick {
            Tick::Advanced { frame } => {
                info!("frame {} for {:?}", frame, animation.current_delay())
            }
            Tick::Hold => debug!("early wake-up"),
            Tick::Finished => break,
        }
    }
    info!("playback finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("TRACE"), Ok(LogLevel::Trace));
        assert_eq!(parse_log_level("warn"), Ok(LogLevel::Warn));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_cli_parses_play() {
        let cli = Cli::parse_from(["gifplug", "play", "a.gif", "--loop", "--speed", "2"]);
        match cli.command {
            Command::Play {
                file,
                looping,
                speed,
            } => {
                assert_eq!(file, PathBuf::from("a.gif"));
                assert!(looping);
                assert_eq!(speed, Some(2.0));
            }
            Command::Info { .. } => panic!("expected play"),
        }
    }
}
