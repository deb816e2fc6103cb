// src/settings/io.rs

use directories_next::ProjectDirs;
use std::fs;
use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "sheetshard";
const APPLICATION: &str = "sheetshard";
const CONFIG_FILE: &str = "settings.json";

pub fn get_config_path() -> io::Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION) {
        let config_dir = proj_dirs.config_dir();
        fs::create_dir_all(config_dir)?;
        Ok(config_dir.join(CONFIG_FILE))
    } else {
        Err(io::Error::new(
            ErrorKind::NotFound,
            "Could not determine project directories for settings.",
        ))
    }
}

/// Load settings from `path`, falling back to `T::default()` when the file
/// does not exist yet.
pub fn load_settings_from_path<T>(path: &Path) -> io::Result<T>
where
    T: for<'de> serde::de::Deserialize<'de> + Default,
{
    debug!("Settings: attempting to load from {:?}", path);
    match fs::File::open(path) {
        Ok(file) => {
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).map_err(|e| {
                error!("Settings: failed to parse {:?}: {}", path, e);
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("Failed to parse settings file: {}", e),
                )
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Settings: no file at {:?}, using defaults.", path);
            Ok(Default::default())
        }
        Err(e) => {
            error!("Settings: failed to open {:?}: {}", path, e);
            Err(e)
        }
    }
}

pub fn save_settings_to_path<T: serde::Serialize>(settings: &T, path: &Path) -> io::Result<()> {
    info!("Settings: saving to {:?}", path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, settings).map_err(|e| {
        error!("Settings: failed to serialize to {:?}: {}", path, e);
        io::Error::new(ErrorKind::Other, e)
    })
}

pub fn load_settings_from_file<T>() -> io::Result<T>
where
    T: for<'de> serde::de::Deserialize<'de> + Default,
{
    load_settings_from_path(&get_config_path()?)
}

pub fn save_settings_to_file<T: serde::Serialize>(settings: &T) -> io::Result<()> {
    save_settings_to_path(settings, &get_config_path()?)
}
