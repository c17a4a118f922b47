use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{self, ConfigScope};
use crate::errors::Result;
use crate::git::get_current_repository;

/// Handle configuration commands
pub fn run(action: ConfigAction) -> Result<()> {
    let repo = get_current_repository()?;
    let git_dir = repo.git_dir();

    match action {
        ConfigAction::Set { key, value, global } => {
            let scope = if global {
                ConfigScope::Global
            } else {
                ConfigScope::Repository
            };
            config::set_value(scope, git_dir, &key, &value)?;
            Output::success(format!("Configuration updated: {key} = {value}"));
        }
        ConfigAction::Get { key } => {
            let settings = config::load_settings(git_dir)?;
            let value = settings.get_value(&key)?;
            println!("{key} = {}", display_value(&value));
        }
        ConfigAction::List => {
            let settings = config::load_settings(git_dir)?;
            Output::section("Patch stack configuration");
            for (key, value) in settings.list()? {
                println!("  {key} = {}", display_value(&value));
            }
        }
    }
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
