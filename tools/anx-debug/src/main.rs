//! ANX7625 Debug Tool
//!
//! Host-side companion to the `anx7625` driver crate.
//!
//! # Usage
//!
//! ```bash
//! # Solve the MIPI PLL for a pixel clock
//! anx-debug pll 74.25M
//!
//! # List the standard video modes
//! anx-debug modes list
//!
//! # Decode a raw EDID dump
//! anx-debug edid decode panel.bin
//!
//! # Run the full bring-up against the simulated chip
//! anx-debug simulate --mode auto --config anx.toml
//!
//! # Write a config file with the hardware defaults
//! anx-debug config generate -o anx.toml
//! ```

mod config;
mod report;

use std::path::PathBuf;

use anx7625::sim::{SimChip, SimDelay, SimPin};
use anx7625::{edid, pll, Anx7625, PowerPins, VideoMode};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::LevelFilter;

use config::ToolConfig;

/// ANX7625 Debug Tool
///
/// PLL calculator, EDID decoder and simulated bring-up for the ANX7625
/// MIPI-DSI to DisplayPort bridge
#[derive(Parser)]
#[command(name = "anx-debug")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Debugging tool for the ANX7625 MIPI-DSI to DisplayPort bridge")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show driver debug logs
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve M, N and the post-divider for a pixel clock
    Pll {
        /// Pixel clock in Hz, or with a k/M suffix (e.g. 74.25M)
        #[arg(value_parser = parse_frequency)]
        clock: u32,
    },

    /// Video mode operations
    #[command(subcommand)]
    Modes(ModeCommands),

    /// EDID operations
    #[command(subcommand)]
    Edid(EdidCommands),

    /// Bring the simulated bridge up: power on, hot plug, EDID, DSI
    Simulate {
        /// Tool configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Video mode (auto, 640x480, ..., 1280x720)
        #[arg(short, long, default_value = "auto")]
        mode: VideoMode,

        /// Raw EDID to present instead of the configured one
        #[arg(short, long)]
        edid: Option<PathBuf>,
    },

    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ModeCommands {
    /// List the standard modes with their clocks
    List,
}

#[derive(Subcommand)]
enum EdidCommands {
    /// Decode a raw EDID file
    Decode {
        /// Path to the EDID (binary, 128 bytes per block)
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a configuration with the hardware defaults
    Generate {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    match cli.command {
        Commands::Pll { clock } => handle_pll(clock),
        Commands::Modes(ModeCommands::List) => {
            report::print_modes();
            Ok(())
        }
        Commands::Edid(EdidCommands::Decode { path }) => handle_edid_decode(path),
        Commands::Simulate { config, mode, edid } => handle_simulate(config, mode, edid),
        Commands::Config(ConfigCommands::Generate { output }) => handle_config_generate(output),
    }
}

/// Parse `74250000`, `74250k` or `74.25M`
fn parse_frequency(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let (number, scale) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1e3),
        Some((i, 'M')) => (&s[..i], 1e6),
        _ => (s, 1.0),
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid frequency: {}", s))?;
    let hz = (value * scale).round();
    if !(0.0..=u32::MAX as f64).contains(&hz) {
        return Err(format!("frequency out of range: {}", s));
    }
    Ok(hz as u32)
}

fn handle_pll(clock: u32) -> Result<()> {
    let coeffs = pll::calculate(clock).with_context(|| format!("No PLL settings for {} Hz", clock))?;
    report::print_pll(clock, &coeffs);
    Ok(())
}

fn handle_edid_decode(path: PathBuf) -> Result<()> {
    let raw = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

    report::header(&format!("EDID: {}", path.display()));
    let decoded = edid::decode(&raw).with_context(|| format!("Failed to decode {}", path.display()))?;
    report::print_edid(&decoded);
    report::footer();
    Ok(())
}

fn handle_simulate(config: Option<PathBuf>, mode: VideoMode, edid: Option<PathBuf>) -> Result<()> {
    let mut tool = match config {
        Some(path) => ToolConfig::load(&path)?,
        None => ToolConfig::default(),
    };
    if edid.is_some() {
        tool.simulation.edid_file = edid;
    }

    let mut chip = SimChip::new(tool.simulation.chip);
    if let Some(raw) = tool.simulation.load_edid()? {
        chip = chip.with_edid(raw);
    }

    let mut pins = PowerPins::new(SimPin::new(), SimPin::new(), SimPin::new());
    let mut driver = Anx7625::with_config(chip, SimDelay::new(), tool.driver);

    println!("{} Bringing up simulated ANX7625 in mode {}\n", "[*]".cyan().bold(), mode);
    let result = driver.bring_up(&mut pins, mode);
    let state = driver.state();
    let (chip, delay) = driver.release();

    report::header("Simulated Bring-up");
    println!("\n  State: {:?}", state);
    println!(
        "  Pins: VIDEO_ON {} VIDEO_RST {} OTG_ON {}",
        level(pins.video_on.is_high()),
        level(pins.video_rst.is_high()),
        level(pins.otg_on.is_high())
    );
    report::print_stats(&chip.stats(), delay.elapsed_ms());

    let outcome = match result {
        Ok((decoded, timing)) => {
            report::print_edid(&decoded);
            println!("\n{}", "Scan-out timing:".white().bold());
            println!("  {}", timing);
            if let Ok(coeffs) = pll::calculate(timing.pixel_clock_hz()) {
                println!(
                    "  PLL: M {} N {} post divider {}",
                    coeffs.m, coeffs.n, coeffs.post_divider
                );
            }
            println!("\n{} Bring-up complete", "[OK]".green().bold());
            Ok(())
        }
        Err(e) => {
            println!("\n{} Bring-up failed: {}", "[ERROR]".red().bold(), e);
            Err(anyhow!("bring-up failed in state {:?}: {}", state, e))
        }
    };
    report::footer();
    outcome
}

fn level(high: bool) -> &'static str {
    if high {
        "high"
    } else {
        "low"
    }
}

fn handle_config_generate(output: Option<PathBuf>) -> Result<()> {
    let text = ToolConfig::default().to_toml()?;

    if let Some(path) = output {
        std::fs::write(&path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} Config written to {}", "[OK]".green().bold(), path.display());
    } else {
        println!("{}", text);
    }
    Ok(())
}
