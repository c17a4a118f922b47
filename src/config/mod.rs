pub mod settings;

pub use settings::{AuthorSettings, Settings, StackSettings};

use crate::errors::{Result, StackError};
use std::path::{Path, PathBuf};

/// Name of the per-repository state directory inside the git dir
pub const REPO_DIR_NAME: &str = "patch-stack";

const CONFIG_FILE_NAME: &str = "config.json";

/// Which config file a write goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
    Repository,
}

/// Get the global configuration directory (~/.patch-stack/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| StackError::config("Could not find home directory"))?;
    Ok(home_dir.join(".patch-stack"))
}

/// Per-repository state directory, `<gitdir>/patch-stack`
pub fn get_repo_config_dir(git_dir: &Path) -> PathBuf {
    git_dir.join(REPO_DIR_NAME)
}

/// Config file for a scope
pub fn config_path(scope: ConfigScope, git_dir: &Path) -> Result<PathBuf> {
    Ok(match scope {
        ConfigScope::Global => get_config_dir()?.join(CONFIG_FILE_NAME),
        ConfigScope::Repository => get_repo_config_dir(git_dir).join(CONFIG_FILE_NAME),
    })
}

/// Global settings overridden by the repository's
pub fn load_settings(git_dir: &Path) -> Result<Settings> {
    let mut files = Vec::with_capacity(2);
    if let Ok(global) = config_path(ConfigScope::Global, git_dir) {
        files.push(global);
    }
    files.push(config_path(ConfigScope::Repository, git_dir)?);
    let settings = Settings::load_layered(&files)?;
    tracing::debug!("Loaded settings from {:?}", files);
    Ok(settings)
}

/// Change one key in the file of `scope`, leaving other keys untouched
pub fn set_value(scope: ConfigScope, git_dir: &Path, key: &str, value: &str) -> Result<()> {
    let path = config_path(scope, git_dir)?;
    let mut settings = Settings::load_from_file(&path)?;
    settings.set_value(key, value)?;
    settings.save_to_file(&path)?;
    tracing::info!("Set {} in {}", key, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_repo_scope_round_trip() {
        let tmp = TempDir::new().unwrap();
        set_value(ConfigScope::Repository, tmp.path(), "editor", "nano").unwrap();
        set_value(ConfigScope::Repository, tmp.path(), "stack.name_length", "8").unwrap();

        let path = config_path(ConfigScope::Repository, tmp.path()).unwrap();
        assert_eq!(path, tmp.path().join("patch-stack/config.json"));

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.editor.as_deref(), Some("nano"));
        assert_eq!(settings.stack.name_length(), 8);
    }

    #[test]
    fn test_unknown_key_leaves_file_alone() {
        let tmp = TempDir::new().unwrap();
        assert!(set_value(ConfigScope::Repository, tmp.path(), "bogus", "1").is_err());
        assert!(!config_path(ConfigScope::Repository, tmp.path())
            .unwrap()
            .exists());
    }
}
