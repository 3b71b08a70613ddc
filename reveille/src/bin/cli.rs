//! Command-line interface for the alarm daemon.
//!
//! Talks to the daemon the same way the buttons do: by reading and writing
//! files under the alarm home directory.

use std::env;
use std::fs;

use anyhow::{Context, Result};
use chrono::Local;

use reveille::config::{AlarmConfig, Paths};
use reveille::schedule::{ChainedSchedule, ScheduleSource};
use reveille::signals::{DISPLAY_ERROR, DISPLAY_WAKE, SignalStore};
use reveille::state::StateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: reveille-cli <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status    Show alarm state and display");
        eprintln!("  next      Look up the next wake-up");
        eprintln!("  snooze    Request a snooze");
        eprintln!("  stop      Request the alarm to stop");
        eprintln!("  reset     Forget that the alarm rang today");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  REVEILLE_HOME           Alarm home (default: /home/pi/monty-alarm)");
        eprintln!("  REVEILLE_STATUS_URLS    Comma-separated scheduler base URLs");
        std::process::exit(1);
    }

    let config = AlarmConfig::from_env();
    let command = &args[1];

    match command.as_str() {
        "status" => cmd_status(&config)?,
        "next" => cmd_next(&config).await?,
        "snooze" => touch(&config.paths.snooze_markers()[0], "Snooze requested")?,
        "stop" => touch(&config.paths.stop_markers()[0], "Stop requested")?,
        "reset" => touch(&config.paths.reset_marker(), "Reset requested")?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Print the daily guard and what the display currently shows.
fn cmd_status(config: &AlarmConfig) -> Result<()> {
    let now = Local::now().naive_local();
    let store = StateStore::new(&config.paths);
    let state = store
        .peek(now)
        .with_context(|| format!("failed to read {}", store.path().display()))?;

    match state.last_trigger_instant {
        Some(at) => println!("Last trigger:  {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Last trigger:  (never)"),
    }
    println!(
        "Rang today:    {}",
        if state.triggered_today { "yes" } else { "no" }
    );
    if store.reset_pending() {
        println!("Reset:         pending");
    }
    print_display(&config.paths);
    Ok(())
}

/// One schedule lookup, as the daemon would do it.
async fn cmd_next(config: &AlarmConfig) -> Result<()> {
    let signals = SignalStore::new(&config.paths);
    let schedule = match ChainedSchedule::from_config(config) {
        Ok(schedule) => schedule,
        Err(e) => {
            signals.write_display(DISPLAY_ERROR);
            return Err(e).context("failed to set up schedule sources");
        }
    };

    let now = Local::now().naive_local();
    match schedule.fetch(now).await {
        Some(wake) => {
            let remaining = wake - now;
            println!(
                "Next wake-up: {} (in {}h {:02}m)",
                wake.format("%a %H:%M"),
                remaining.num_hours(),
                remaining.num_minutes() % 60
            );
        }
        None => println!("No alarm set"),
    }
    print_display(&config.paths);
    Ok(())
}

fn print_display(paths: &Paths) {
    match SignalStore::new(paths).read_display().as_deref() {
        Some(DISPLAY_WAKE) => println!("Display:       {DISPLAY_WAKE} (alarm is ringing)"),
        Some(text) if text.starts_with("SNZ") => println!("Display:       {text} (snoozing)"),
        Some("") | None => println!("Display:       (idle)"),
        Some(text) => println!("Display:       {text}"),
    }
}

fn touch(path: &std::path::Path, message: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    fs::write(path, "").with_context(|| format!("failed to write {}", path.display()))?;
    println!("{message}");
    Ok(())
}
