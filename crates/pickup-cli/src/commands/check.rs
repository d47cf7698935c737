//! Check command - run format validation on a single file.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::debug;

use pickup_core::intake::{AdmissionProfile, FormatValidator};

use super::ProfileArg;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// File to check
    #[arg(required = true)]
    input: PathBuf,

    /// Expected format
    #[arg(short, long, value_enum, default_value = "document")]
    profile: ProfileArg,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let data = fs::read(&args.input)?;
    let profile = AdmissionProfile::from(args.profile);
    debug!("Checking {} ({} bytes) as {:?}", args.input.display(), data.len(), profile);

    let kind = match profile {
        AdmissionProfile::Document => "PDF document",
        AdmissionProfile::Image => "image",
    };

    if !FormatValidator::new(profile).validate(&data) {
        anyhow::bail!("{} is not a valid {}", args.input.display(), kind);
    }

    println!(
        "{} {} is a valid {}",
        style("✓").green(),
        args.input.display(),
        kind
    );

    Ok(())
}
