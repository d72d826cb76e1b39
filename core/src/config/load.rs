use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::error::ConfigError;

/// Get the default stagerun data directory: ~/.stagerun
pub fn get_stagerun_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".stagerun"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.stagerun/config.toml (highest)
    let user_config = get_stagerun_data_dir()?.join("config.toml");

    // Priority 2: ./stagerun.toml (current directory)
    let local_config = Path::new("stagerun.toml");

    let cfg = if user_config.exists() {
        read_config(&user_config)?
    } else if local_config.exists() {
        read_config(local_config)?
    } else {
        AppConfig::default()
    };

    Ok(finalize(cfg)?)
}

/// Loads an explicitly named config file; the default search is skipped.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let cfg = read_config(path.as_ref())?;
    finalize(cfg)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn finalize(mut cfg: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_env_overrides(&mut cfg)?;
    expand_paths(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(cfg: &mut AppConfig) -> Result<(), ConfigError> {
    if let Some(v) = non_empty_env("STAGERUN_BACKEND") {
        cfg.run.backend = v.parse()?;
    }
    if let Some(v) = non_empty_env("STAGERUN_JOBS") {
        let jobs = v
            .parse::<usize>()
            .map_err(|e| ConfigError::Invalid(format!("STAGERUN_JOBS={v}: {e}")))?;
        cfg.run.jobs = Some(jobs);
    }
    if let Some(v) = non_empty_env("STAGERUN_DRY_RUN") {
        cfg.run.dry_run = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = non_empty_env("STAGERUN_LOG") {
        cfg.logging.level = v;
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn expand_paths(cfg: &mut AppConfig) {
    cfg.script.path = expand(&cfg.script.path);
    cfg.script.fragment_dir = cfg.script.fragment_dir.as_deref().map(expand);
    cfg.logging.directory = cfg.logging.directory.as_deref().map(expand);
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_path_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagerun.toml");
        std::fs::write(&path, "[script]\npath = \"~/pipeline.sh\"\nwidth = 3\n").unwrap();

        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.script.width, Some(3));
        assert!(!cfg.script.path.starts_with('~'));

        std::fs::write(&path, "[run]\njobs = 0\n").unwrap();
        assert!(matches!(load_from_path(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "[run\n").unwrap();
        assert!(matches!(load_from_path(&path), Err(ConfigError::Parse { .. })));
    }
}
