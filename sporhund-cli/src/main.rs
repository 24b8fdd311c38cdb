//! ## sporhund
//! Log-line scanner for intrusion-detection workflows: scans input against
//! a large set of IP, CIDR, IP-range, domain, and fixed-string signatures
//! and raises scored alarms for matching lines.

use clap::Parser;

use sporhund_telemetry::ScanLogger;

mod commands;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli)?;
    ScanLogger::init(&config.telemetry.log_level);

    if cli.aggregate {
        commands::run_aggregation(&cli, &config)
    } else {
        commands::run_scan(&cli, &config)
    }
}
