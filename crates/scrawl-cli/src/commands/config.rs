use std::path::{Path, PathBuf};

use scrawl_core::config::ClientConfig;

use crate::cli::ConfigCommands;
use crate::context::{resolve_config_path, CliContext};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, cli_config_path: Option<PathBuf>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            debounce_ms,
        } => {
            let path = resolve_config_path(cli_config_path)?;
            let config = run_config_init(&path, api_base_url, debounce_ms)?;
            println!("Config written to {}", path.display());
            println!("API: {}", config.api_base_url);
            Ok(())
        }
        ConfigCommands::Show => {
            let context = CliContext::load(cli_config_path)?;
            println!("# {}", context.config_path.display());
            println!("{}", render_config(&context.config)?);
            Ok(())
        }
    }
}

/// Merge the given values into the file at `path` and write it back.
pub fn run_config_init(
    path: &Path,
    api_base_url: Option<String>,
    debounce_ms: Option<u64>,
) -> Result<ClientConfig, CliError> {
    let config = ClientConfig::load_from_path(path)?
        .with_overrides(api_base_url, debounce_ms.map(|value| value.to_string()))?;
    config.save_to_path(path)?;
    Ok(config)
}

pub fn render_config(config: &ClientConfig) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(config)?)
}
