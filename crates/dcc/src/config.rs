//! Persisted DCC settings.
//!
//! Stored as pretty-printed JSON under the platform config directory
//! (`~/.config/sidewire/config.json` on Linux). Unknown or missing fields
//! fall back to defaults; an unparseable file is reported and replaced by
//! defaults rather than failing startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sidewire_transfer::{DEFAULT_CHUNK_SIZE, EngineSettings};

/// User-tunable DCC settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DccConfig {
    /// File-transfer chunk size in bytes.
    pub chunk_size: usize,

    /// Seconds a listening session waits for the peer to connect.
    pub accept_timeout_secs: u64,

    /// Seconds a connecting session waits for the peer to answer.
    pub connect_timeout_secs: u64,

    /// Seconds the sender waits for a per-chunk acknowledgment before
    /// giving up on acknowledgments entirely.
    pub ack_timeout_secs: u64,

    /// Fail transfers on a mismatched acknowledgment instead of logging
    /// and carrying on.
    pub strict_acks: bool,

    /// IPv4 address to advertise in outbound offers; autodetected when
    /// unset.
    pub advertise_ip: Option<String>,
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            accept_timeout_secs: 120,
            connect_timeout_secs: 30,
            ack_timeout_secs: 10,
            strict_acks: false,
            advertise_ip: None,
        }
    }
}

impl DccConfig {
    /// Loads the configuration from the default path.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Loads the configuration from `path`.
    ///
    /// A missing file yields defaults; an unparseable one is reported and
    /// yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Saves the configuration to the default path.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Saves the configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        set_permissions_0600(path);
        Ok(())
    }

    /// Engine tunables derived from the persisted values.
    ///
    /// A zero chunk size falls back to [`DEFAULT_CHUNK_SIZE`].
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chunk_size: if self.chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                self.chunk_size
            },
            accept_timeout: Duration::from_secs(self.accept_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
            strict_acks: self.strict_acks,
            advertise_ip: self.advertise_ip.clone().unwrap_or_else(|| "127.0.0.1".into()),
        }
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        config_base_dir().join("sidewire").join("config.json")
    }
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        PathBuf::from(
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into()),
        )
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = DccConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert!(!config.strict_acks);
        assert!(config.advertise_ip.is_none());

        let settings = config.engine_settings();
        assert_eq!(settings.chunk_size, 512);
        assert_eq!(settings.accept_timeout, Duration::from_secs(120));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/config.json");

        let config = DccConfig {
            chunk_size: 1024,
            strict_acks: true,
            advertise_ip: Some("192.168.1.10".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(DccConfig::load_from(&path), config);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DccConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, DccConfig::default());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        assert_eq!(DccConfig::load_from(&path), DccConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "chunk_size": 2048 }"#).unwrap();

        let config = DccConfig::load_from(&path);
        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.ack_timeout_secs, 10);
    }

    #[test]
    fn zero_chunk_size_falls_back_to_default() {
        let config = DccConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(config.engine_settings().chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
