//! Study configuration: TOML file first, then command-line overrides.

use crate::cli::RunArgs;
use anyhow::{bail, Context, Result};
use sra_algo::StudyConfig;
use std::fs;
use std::path::Path;

pub fn load_study_config(path: &Path) -> Result<StudyConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading study config '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing study config '{}'", path.display()))
}

/// Worker count from a flag value: a positive integer or `auto`.
pub fn parse_workers(value: &str) -> Result<usize> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok(num_cpus::get());
    }
    match value.parse::<usize>() {
        Ok(0) => bail!("--workers must be at least 1"),
        Ok(n) => Ok(n),
        Err(_) => bail!("--workers expects a number or 'auto', got '{value}'"),
    }
}

/// Final study configuration for a `run` invocation, validated.
pub fn resolve(args: &RunArgs) -> Result<StudyConfig> {
    let mut config = match &args.config {
        Some(path) => load_study_config(path)?,
        None => StudyConfig::default(),
    };
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if let Some(hours) = args.hours {
        config.horizon_hours = hours;
    }
    if let Some(workers) = &args.workers {
        config.workers = parse_workers(workers)?;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(mode) = args.mode {
        config.dispatch_mode = mode.into();
    }
    config.validate()?;
    Ok(config)
}
