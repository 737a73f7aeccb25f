use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use dose_alarm::{AlarmEngine, Config, DoseChain, ManualClock, SignalKind, TimeSource};

#[derive(Parser)]
#[command(name = "dose_alarm")]
#[command(about = "Medication timing alarm with efficacy-curve scheduling")]
struct Cli {
    /// Regimen configuration file (JSON); uses the built-in regimen if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target efficiency percent for the projected schedule
    #[arg(short, long, default_value = "100")]
    target: f64,

    /// Alarm threshold percent (overrides the configured value)
    #[arg(long)]
    threshold: Option<f64>,

    /// Run an accelerated simulated day instead of printing the projection
    #[arg(short, long)]
    simulate: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    if !(0.0..=100.0).contains(&cli.target) {
        anyhow::bail!("target efficiency {} outside [0, 100]", cli.target);
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded regimen from {:?}", path);
            config
        }
        None => {
            info!("Using built-in regimen");
            Config::default_regimen()
        }
    };
    if let Some(threshold) = cli.threshold {
        config.monitor.threshold_percent = threshold;
        config.validate()?;
    }

    if cli.simulate {
        run_simulation(&config, cli.target)
    } else {
        print_projection(&config, cli.target)
    }
}

/// Print the hypothetical schedule for taking every dose at the target
/// efficiency, anchored at the current time.
fn print_projection(config: &Config, target: f64) -> anyhow::Result<()> {
    let mut chain = DoseChain::from_config(config)?;
    chain.start(chrono::Utc::now());

    println!("Projected schedule at {}% target efficiency:", target);
    for projected in dose_alarm::projector::project(&chain, target) {
        let dose = chain.dose(&projected.dose_id)?;
        println!(
            "  {:<10} {:<20} {}",
            projected.predicted_at.format("%H:%M"),
            dose.name,
            dose.description
        );
    }

    if let Some(milestone) = dose_alarm::projector::milestone(&chain, target) {
        let total = milestone - chain.anchor_time().unwrap_or(milestone);
        println!(
            "Milestone ({}) at {} ({} minutes from start)",
            chain.doses().last().map(|d| d.name.as_str()).unwrap_or("-"),
            milestone.format("%H:%M"),
            total.num_minutes()
        );
    }

    Ok(())
}

/// Drive a whole run against a manual clock in one-minute ticks, taking
/// each dose the moment its alarm fires.
fn run_simulation(config: &Config, target: f64) -> anyhow::Result<()> {
    let clock = ManualClock::new(chrono::Utc::now());
    let mut engine = AlarmEngine::with_clock(config, Box::new(clock.clone()))?;
    engine.set_alarm_threshold(target)?;
    engine.start_sequence(None);

    info!(
        "Simulating run with {}% alarm threshold (1-minute ticks)",
        target
    );

    // Cap at two simulated days in case a regimen can never reach the
    // threshold.
    let mut ticks = 0u32;
    while engine.is_running() && ticks < 48 * 60 {
        if let Some(signal) = engine.tick()? {
            if signal.kind == SignalKind::Trigger {
                info!(
                    "ALARM: {} reached {}% efficacy at {}",
                    signal.dose_name,
                    signal.efficacy_percent,
                    clock.now().format("%H:%M")
                );
                engine.administer_dose(&signal.dose_id, None)?;
            }
        }
        clock.advance_minutes(1.0);
        ticks += 1;
    }

    if engine.is_running() {
        warn!("Simulation stopped after {} ticks without completing", ticks);
        return Ok(());
    }

    println!("Simulated administration times:");
    for dose in engine.chain().doses() {
        match engine.chain().administered_at(&dose.id) {
            Some(at) => println!("  {:<10} {}", at.format("%H:%M"), dose.name),
            None => println!("  {:<10} {}", "-", dose.name),
        }
    }
    println!("Completed in {} simulated minutes", ticks);

    Ok(())
}
