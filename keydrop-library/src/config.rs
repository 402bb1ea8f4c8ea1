//! Simple configuration persistence for Keydrop
//!
//! Stores engine preferences and the last directory tracks were loaded from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Preferred engine and decoder sample rate
    pub sample_rate: u32,
    /// Master volume (0.0 - 2.0)
    pub master_volume: f32,
    /// Crossfader curve name: constant_power, linear or cut
    pub crossfader_curve: String,
    /// Directory relative load paths are resolved against
    pub last_track_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            master_volume: 0.9,
            crossfader_curve: "constant_power".to_string(),
            last_track_dir: None,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keydrop")
            .join("config.txt")
    }

    /// Resolve a user-supplied track path against `last_track_dir`
    pub fn resolve_track_path(&self, path: &Path) -> PathBuf {
        match &self.last_track_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Remember the directory of a requested track
    pub fn remember_track(&mut self, path: &Path) {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.last_track_dir = Some(dir.to_path_buf());
        }
    }

    /// Parse config from simple key=value format
    ///
    /// Values that fail to parse keep their defaults.
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "sample_rate" => {
                    if let Ok(sr) = value.parse::<u32>() {
                        if sr > 0 {
                            config.sample_rate = sr;
                        }
                    }
                }
                "master_volume" => {
                    if let Some(v) = value.parse::<f32>().ok().filter(|v| v.is_finite()) {
                        config.master_volume = v.clamp(0.0, 2.0);
                    }
                }
                "crossfader_curve" => {
                    if !value.is_empty() {
                        config.crossfader_curve = value.to_string();
                    }
                }
                "last_track_dir" => {
                    if !value.is_empty() {
                        config.last_track_dir = Some(PathBuf::from(value));
                    }
                }
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec![
            "# Keydrop Configuration".to_string(),
            format!("sample_rate={}", self.sample_rate),
            format!("master_volume={}", self.master_volume),
            format!("crossfader_curve={}", self.crossfader_curve),
        ];

        if let Some(ref dir) = self.last_track_dir {
            lines.push(format!("last_track_dir={}", dir.display()));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_parse_values_and_comments() {
        let content = "# Comment\nsample_rate=44100\nmaster_volume = 1.5\ncrossfader_curve=cut\nlast_track_dir=/music\nunknown=1";
        let config = Config::parse(content);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.master_volume, 1.5);
        assert_eq!(config.crossfader_curve, "cut");
        assert_eq!(config.last_track_dir, Some(PathBuf::from("/music")));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = Config::parse("sample_rate=fast\nsample_rate=0\nmaster_volume=loud\nno equals sign");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_master_volume_clamped() {
        assert_eq!(Config::parse("master_volume=9").master_volume, 2.0);
    }

    #[test]
    fn test_non_finite_master_volume_ignored() {
        assert_eq!(Config::parse("master_volume=NaN").master_volume, 0.9);
        assert_eq!(Config::parse("master_volume=inf").master_volume, 0.9);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            sample_rate: 44100,
            master_volume: 0.75,
            crossfader_curve: "linear".to_string(),
            last_track_dir: Some(PathBuf::from("/test/path")),
        };
        assert_eq!(Config::parse(&config.serialize()), config);
    }

    #[test]
    fn test_resolve_track_path() {
        let mut config = Config::default();
        assert_eq!(config.resolve_track_path(Path::new("a.mp3")), PathBuf::from("a.mp3"));

        config.remember_track(Path::new("/music/set/one.flac"));
        assert_eq!(
            config.resolve_track_path(Path::new("two.flac")),
            PathBuf::from("/music/set/two.flac")
        );
        assert_eq!(
            config.resolve_track_path(Path::new("/abs/three.flac")),
            PathBuf::from("/abs/three.flac")
        );
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("keydrop-config-{}", std::process::id()))
            .join("config.txt");
        let config = Config {
            master_volume: 1.25,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
        assert_eq!(loaded, config);
    }
}
