//! Configuration file commands

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::cli::context::load_config;
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::output;

/// Write the built-in defaults to the config file
pub fn init(opts: &GlobalOptions, force: bool) -> Result<()> {
    let path = Config::resolve_path(opts.config_ref())?;
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.display().to_string()).into());
    }

    Config::default().save_to(&path)?;

    if opts.is_json() {
        let json = serde_json::json!({ "path": path.display().to_string(), "written": true });
        return output::print_json(&json);
    }
    println!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
    Ok(())
}

/// Show the effective configuration, overrides applied
pub fn show(opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let path = Config::resolve_path(opts.config_ref())?;

    if opts.is_json() {
        return output::print_json(&config);
    }

    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, built-in defaults)", path.display());
    }
    print!(
        "{}",
        serde_yaml::to_string(&config).map_err(|e| ConfigError::SaveError(e.to_string()))?
    );
    Ok(())
}
