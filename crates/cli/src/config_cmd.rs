//! `locus config path|show|init`

use std::path::{Path, PathBuf};

use locus_config::Settings;

use crate::context::Context;
use crate::exit_codes::EXIT_CONFIG;
use crate::CliError;

pub fn cmd_path(explicit: Option<&Path>) -> Result<(), CliError> {
    let path = explicit.map(Path::to_path_buf).unwrap_or_else(Settings::default_path);
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("note: file does not exist, built-in defaults apply");
    }
    Ok(())
}

/// Effective settings with paths resolved.
pub fn cmd_show(explicit: Option<&Path>) -> Result<(), CliError> {
    let ctx = Context::load(explicit)?;
    let text = ctx.settings.to_toml_string().map_err(|e| CliError::new(EXIT_CONFIG, e))?;
    match &ctx.config_path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# built-in defaults"),
    }
    print!("{text}");
    Ok(())
}

pub fn cmd_init(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.unwrap_or_else(Settings::default_path);
    Settings::write_template(&path)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
