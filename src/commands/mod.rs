mod compose;
mod config;
mod inspect;
mod utils;

use crate::cli::{Cli, Commands, GlobalOptions};
use mockup::MockupResult;

/// The main function to run the command based on CLI input.
pub fn run(cli: Cli) -> MockupResult<()> {
    let Cli { global, command } = cli;
    dispatch(&global, command)
}

/// Dispatch the command to the appropriate handler.
fn dispatch(global: &GlobalOptions, command: Commands) -> MockupResult<()> {
    match command {
        Commands::Compose(cmd) => compose::run(global, cmd),
        Commands::Inspect(cmd) => inspect::run(cmd),
        Commands::Config(cmd) => config::run(cmd),
    }
}
