use anyhow::{ensure, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::process::Command as ProcessCommand;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Use modules from the library
use resmon::{MonitorConfig, ResourceMonitor};

fn main() -> Result<()> {
    resmon::init_logging();

    let matches = Command::new("resmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Lightweight runtime resource monitor")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            monitor_flags(Command::new("run"))
                .about("Run a command under resource monitoring")
                .arg(
                    Arg::new("command")
                        .value_name("COMMAND")
                        .help("Command to run, with its arguments")
                        .required(true)
                        .num_args(1..)
                        .allow_hyphen_values(true)
                        .trailing_var_arg(true),
                ),
        )
        .subcommand(
            monitor_flags(Command::new("sleep"))
                .about("Monitor an idle workload for a fixed duration")
                .arg(
                    Arg::new("duration")
                        .short('d')
                        .long("duration")
                        .value_name("SECONDS")
                        .help("How long to monitor")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("10"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub_matches)) => run_command(sub_matches),
        Some(("sleep", sub_matches)) => run_sleep(sub_matches),
        _ => unreachable!("subcommand is required"),
    }
}

/// Monitoring flags shared by all subcommands
fn monitor_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("interval")
            .short('i')
            .long("interval")
            .value_name("SECONDS")
            .help("Sampling interval for CPU/memory/network")
            .value_parser(clap::value_parser!(f64))
            .default_value("1.0"),
    )
    .arg(
        Arg::new("output-interval")
            .long("output-interval")
            .value_name("SECONDS")
            .help("Energy polling cadence")
            .value_parser(clap::value_parser!(f64))
            .default_value("60"),
    )
    .arg(
        Arg::new("csv")
            .long("csv")
            .help("Export energy readings to resmon_energy.csv")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("energy-logs")
            .long("energy-logs")
            .help("Show detailed energy estimator logs")
            .action(ArgAction::SetTrue),
    )
}

fn monitor_config(matches: &ArgMatches) -> Result<MonitorConfig> {
    let interval = matches.get_one::<f64>("interval").copied().unwrap_or(1.0);
    let output_interval = matches
        .get_one::<f64>("output-interval")
        .copied()
        .unwrap_or(60.0);

    ensure!(
        interval.is_finite() && interval > 0.0,
        "sampling interval must be a positive number of seconds"
    );
    ensure!(
        output_interval.is_finite() && output_interval > 0.0,
        "output interval must be a positive number of seconds"
    );

    Ok(MonitorConfig {
        sampling_interval: Duration::from_secs_f64(interval),
        output_interval: Duration::from_secs_f64(output_interval),
        show_detailed_logs: matches.get_flag("energy-logs"),
        export_csv: matches.get_flag("csv"),
    })
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;
    Ok(interrupted)
}

/// Execute the run command: monitor a child process for its lifetime
fn run_command(matches: &ArgMatches) -> Result<()> {
    let config = monitor_config(matches)?;
    let command: Vec<String> = matches
        .get_many::<String>("command")
        .context("missing command")?
        .cloned()
        .collect();

    let interrupted = interrupt_flag()?;

    println!(
        "{} {}",
        "Monitoring:".bright_cyan().bold(),
        command.join(" ")
    );

    let mut monitor = ResourceMonitor::new();
    let guard = monitor.scoped(config)?;

    let mut child = ProcessCommand::new(&command[0])
        .args(&command[1..])
        .spawn()
        .with_context(|| format!("failed to spawn '{}'", command[0]))?;

    let status = loop {
        if let Some(status) = child.try_wait().context("failed to poll child process")? {
            break Some(status);
        }
        if interrupted.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(Duration::from_millis(100));
    };

    guard.stop()?;

    match status {
        Some(status) if status.success() => {}
        Some(status) => println!(
            "{} command exited with {}",
            "warning:".yellow().bold(),
            status
        ),
        None => println!(
            "{} interrupted, command terminated",
            "warning:".yellow().bold()
        ),
    }

    Ok(())
}

/// Execute the sleep command: monitor an idle period
fn run_sleep(matches: &ArgMatches) -> Result<()> {
    let config = monitor_config(matches)?;
    let duration = matches.get_one::<f64>("duration").copied().unwrap_or(10.0);
    ensure!(
        duration.is_finite() && duration >= 0.0,
        "duration must be a non-negative number of seconds"
    );

    let interrupted = interrupt_flag()?;

    println!(
        "{} idle workload for {duration}s",
        "Monitoring:".bright_cyan().bold()
    );

    let mut monitor = ResourceMonitor::new();
    let guard = monitor.scoped(config)?;

    let deadline = Instant::now() + Duration::from_secs_f64(duration);
    while Instant::now() < deadline && !interrupted.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        thread::sleep(remaining.min(Duration::from_millis(100)));
    }

    guard.stop()?;
    Ok(())
}
