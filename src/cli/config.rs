//! `distributor config` handlers

use crate::cli::ConfigInitArgs;
use crate::config::DistributorConfig;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const EXAMPLE_CONFIG: &str = include_str!("../../distributor.example.toml");

/// Write the example configuration to `args.output`, or to stdout when the
/// output is `-`.
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output == Path::new("-") {
        print!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;
    let config = DistributorConfig::load(Some(&args.output))?;

    println!("Configuration file created: {}", args.output.display());
    println!("  Provisions {}.", provisioning_summary(&config));
    println!("  Edit the [[queues]] section to provision your own.");

    Ok(())
}

/// Queue and tenant count of a configuration, e.g. `2 queues for 1 tenant`.
fn provisioning_summary(config: &DistributorConfig) -> String {
    let tenants: BTreeSet<&str> = config.queues.iter().map(|q| q.tenant.as_str()).collect();
    format!(
        "{} queue{} for {} tenant{}",
        config.queues.len(),
        if config.queues.len() == 1 { "" } else { "s" },
        tenants.len(),
        if tenants.len() == 1 { "" } else { "s" },
    )
}
