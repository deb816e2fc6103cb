// src/settings/mod.rs

pub mod io;

use crate::sheets::error::{SheetError, SheetResult};
use crate::sheets::router::{RouterConfig, DEFAULT_FOLDER_NAME, DEFAULT_SHEET_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_ROOT: &str = "SHEETSHARD_ROOT";
pub const ENV_INDEX: &str = "SHEETSHARD_INDEX";
pub const ENV_SHEET_LIMIT: &str = "SHEETSHARD_SHEET_LIMIT";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory the SQLite store keeps its document files under.
    pub store_root: PathBuf,
    /// Index document id; set by `init`.
    pub index_document: Option<String>,
    pub sheet_limit: usize,
    pub base_folder: Option<String>,
    pub folder_name: String,
    pub cache: bool,
}

impl Settings {
    pub fn default_store_root() -> PathBuf {
        let documents = directories_next::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        documents.join("SheetShard")
    }

    /// Apply `SHEETSHARD_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> SheetResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> SheetResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ROOT) {
            self.store_root = PathBuf::from(root);
        }
        if let Some(index) = lookup(ENV_INDEX) {
            self.index_document = Some(index);
        }
        if let Some(limit) = lookup(ENV_SHEET_LIMIT) {
            self.sheet_limit = limit.trim().parse().map_err(|_| {
                SheetError::Config(format!("{} must be a positive integer, got '{}'", ENV_SHEET_LIMIT, limit))
            })?;
        }
        Ok(())
    }

    pub fn router_config(&self) -> SheetResult<RouterConfig> {
        let index = self.index_document.clone().ok_or_else(|| {
            SheetError::Config("no index document configured; run `sheetshard init` first".to_string())
        })?;
        let config = RouterConfig::new(index)
            .with_sheet_limit(self.sheet_limit)
            .with_folder(self.folder_name.clone(), self.base_folder.clone())
            .with_cache(self.cache);
        config.validate()?;
        Ok(config)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_root: Self::default_store_root(),
            index_document: None,
            sheet_limit: DEFAULT_SHEET_LIMIT,
            base_folder: None,
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_replace_file_values() {
        let mut settings = Settings::default();
        let env: HashMap<&str, &str> = [(ENV_INDEX, "abc"), (ENV_SHEET_LIMIT, " 5 ")].into();
        settings
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.index_document.as_deref(), Some("abc"));
        assert_eq!(settings.sheet_limit, 5);
        assert_eq!(settings.router_config().unwrap().sheet_limit, 5);
    }

    #[test]
    fn test_bad_sheet_limit_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(|name| {
            (name == ENV_SHEET_LIMIT).then(|| "many".to_string())
        });
        assert!(matches!(result, Err(SheetError::Config(_))));
    }

    #[test]
    fn test_router_config_needs_index() {
        assert!(matches!(
            Settings::default().router_config(),
            Err(SheetError::Config(_))
        ));
    }

    #[test]
    fn test_settings_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");

        let missing: Settings = io::load_settings_from_path(&path).unwrap();
        assert_eq!(missing, Settings::default());

        let mut settings = Settings::default();
        settings.index_document = Some("doc-1".to_string());
        settings.cache = true;
        io::save_settings_to_path(&settings, &path).unwrap();
        let loaded: Settings = io::load_settings_from_path(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{ "sheet_limit": 3 }"#).unwrap();
        let loaded: Settings = io::load_settings_from_path(&path).unwrap();
        assert_eq!(loaded.sheet_limit, 3);
        assert_eq!(loaded.folder_name, DEFAULT_FOLDER_NAME);
    }
}
