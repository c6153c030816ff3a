//! Persistent renderer settings

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::light::{Light, LightFrustum};
use crate::shadow::{ShadowMode, ShadowParams};
use crate::util::{Error, Result};

/// Smallest and largest accepted shadow-map edge.
pub const MIN_MAP_SIZE: u32 = 64;
pub const MAX_MAP_SIZE: u32 = 8192;

/// Settings that persist between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Output
    pub width: u32,
    pub height: u32,
    pub clear_color: [f32; 3],

    // Shadows
    pub mode: ShadowMode,
    pub shadow: ShadowParams,
    pub light_frustum: LightFrustum,

    // Light
    pub light: Light,
    pub light_target: Vec3,

    // Overlays
    pub show_debug_overlay: bool,
    pub show_light_marker: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 1200,
            clear_color: [0.1, 0.1, 0.1],
            mode: ShadowMode::default(),
            shadow: ShadowParams::default(),
            light_frustum: LightFrustum::default(),
            light: Light::default(),
            light_target: Vec3::ZERO,
            show_debug_overlay: true,
            show_light_marker: true,
        }
    }
}

impl Settings {
    /// Default settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("vssm");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the default location.
    ///
    /// A missing, unreadable or invalid file falls back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load and validate an explicit settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| Error::SettingsParse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| Error::Settings("no config directory".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.shadow.map_size;
        if !size.is_power_of_two() || !(MIN_MAP_SIZE..=MAX_MAP_SIZE).contains(&size) {
            return Err(Error::Settings(format!(
                "shadow map size {} must be a power of two in {}..={}",
                size, MIN_MAP_SIZE, MAX_MAP_SIZE
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Settings(format!(
                "output size {}x{} is empty",
                self.width, self.height
            )));
        }

        let f = &self.light_frustum;
        if !(f.near > 0.0 && f.near < f.far) {
            return Err(Error::Settings(format!(
                "light near/far must satisfy 0 < near < far (got {} / {})",
                f.near, f.far
            )));
        }
        if !(f.fov_y_degrees > 0.0 && f.fov_y_degrees < 180.0) {
            return Err(Error::Settings(format!("light fov {} out of range", f.fov_y_degrees)));
        }
        if !(self.light.width.is_finite() && self.light.width > 0.0) {
            return Err(Error::Settings(format!("light width {} must be positive", self.light.width)));
        }
        if !(self.shadow.bias >= 0.0) || !(self.shadow.min_variance >= 0.0) {
            return Err(Error::Settings("bias and min_variance must be non-negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!((s.width, s.height), (1600, 1200));
        assert_eq!(s.mode, ShadowMode::Basic);
        assert_eq!(s.shadow.map_size, 1024);
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut s = Settings::default();
        s.mode = ShadowMode::Vssm;
        s.light.width = 12.0;
        s.shadow.map_size = 512;
        s.save_to(&path).unwrap();

        let loaded = Settings::from_file(&path).unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "mode": "pcss", "shadow": { "map_size": 256 } }"#).unwrap();

        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.mode, ShadowMode::Pcss);
        assert_eq!(s.shadow.map_size, 256);
        assert_eq!(s.shadow.pcf_radius, 3);
        assert_eq!(s.width, 1600);
    }

    #[test]
    fn test_validation_rejects() {
        let mut s = Settings::default();
        s.shadow.map_size = 1000;
        assert!(matches!(s.validate(), Err(Error::Settings(_))));

        let mut s = Settings::default();
        s.light_frustum.near = 200.0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.light.width = 0.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_bad_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::SettingsParse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "mode": "raytraced" }"#).unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
