use crate::ink::settings::InkSettings;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub const INK_SETTINGS_FILE_NAME: &str = "ink_settings.json";

pub fn settings_path_from_exe_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(INK_SETTINGS_FILE_NAME))
}

pub fn resolve_settings_path() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    settings_path_from_exe_path(&exe_path)
}

pub fn load() -> Result<InkSettings> {
    load_from_path(&resolve_settings_path()?)
}

pub fn save(settings: &InkSettings) -> Result<PathBuf> {
    let path = resolve_settings_path()?;
    save_to_path(&path, settings)?;
    Ok(path)
}

/// Missing or blank files yield defaults; malformed JSON is an error.
pub fn load_from_path(path: &Path) -> Result<InkSettings> {
    if !path.exists() {
        return Ok(InkSettings::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read ink settings file {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(InkSettings::default());
    }

    let mut loaded: InkSettings = serde_json::from_str(&content)
        .with_context(|| format!("deserialize ink settings file {}", path.display()))?;
    loaded.sanitize();
    Ok(loaded)
}

pub fn save_to_path(path: &Path, settings: &InkSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create ink settings parent folder {}", parent.display()))?;
    }

    let mut sanitized = settings.clone();
    sanitized.sanitize();
    let json = serde_json::to_string_pretty(&sanitized).context("serialize ink settings")?;
    std::fs::write(path, json)
        .with_context(|| format!("write ink settings file {}", path.display()))
}
