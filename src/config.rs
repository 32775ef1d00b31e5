//! Persisted navball skin configuration.
//!
//! The document is plain JSON.  Every key is optional; missing keys fall back
//! to [`NavballConfig::default`], so an old or hand-trimmed file still loads.

use std::{fs, path::Path};

use bevy::{color::LinearRgba, log::info};

use crate::error::SkinError;

/// Default file name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "settings.json";

/// Which texture slots to override and with which assets.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NavballConfig {
    /// Override for the main texture.  Empty keeps the stock texture.
    pub texture_url: String,
    /// Override for the cabin emissive texture.  Empty means no override.
    pub emissive_url: String,
    /// Linear RGBA tint written to every cabin emissive slot.
    pub emissive_color: [f32; 4],
    pub flight_enabled: bool,
    pub iva_enabled: bool,
}

impl Default for NavballConfig {
    fn default() -> Self {
        Self {
            texture_url: String::new(),
            emissive_url: String::new(),
            emissive_color: [0.376, 0.376, 0.376, 1.0],
            flight_enabled: true,
            iva_enabled: true,
        }
    }
}

impl NavballConfig {
    /// Read and parse the document at `path`.
    pub fn load(path: &Path) -> Result<Self, SkinError> {
        let text = fs::read_to_string(path).map_err(|e| SkinError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| SkinError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the document to `path`, creating missing parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SkinError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SkinError::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| SkinError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|e| SkinError::io(path, e))
    }

    /// Load `path`, writing a default document first if none exists.
    ///
    /// The returned value is always what was read back from disk.
    pub fn load_or_create(path: &Path) -> Result<Self, SkinError> {
        if !path.exists() {
            info!(
                "[NavballSkin] Config file not found at {}, creating default",
                path.display()
            );
            Self::default().save(path)?;
        }
        Self::load(path)
    }

    pub fn emissive_tint(&self) -> LinearRgba {
        let [r, g, b, a] = self.emissive_color;
        LinearRgba::new(r, g, b, a)
    }
}
