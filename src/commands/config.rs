use mockup::MockupResult;

use crate::cli::ConfigCommand;

use super::utils::resolve_effect_config;

/// Print the resolved effect config, so it can be saved and edited.
pub fn run(cmd: ConfigCommand) -> MockupResult<()> {
    let config = resolve_effect_config(&cmd.effects)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
