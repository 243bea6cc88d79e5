//! Configuration file loading for tirc.
//!
//! The configuration lives at `~/.tirc/config.toml` and lists the
//! networks to connect to:
//!
//! ```toml
//! [[networks]]
//! name = "libera"
//! server = "irc.libera.chat"
//! port = 6667
//! nick = "somenick"
//! username = "somenick"
//! realname = "Some Nick"
//! channels = ["#rust", "#irc"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Networks to connect to at startup
    pub networks: Vec<NetworkConfig>,
}

/// One IRC network
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Display name used in the buffer list
    pub name: String,
    /// Server host
    pub server: String,
    pub port: u16,
    pub nick: String,
    pub username: String,
    pub realname: String,
    /// Channels joined automatically after registration
    pub channels: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            server: String::new(),
            port: 6667,
            nick: String::new(),
            username: String::new(),
            realname: String::new(),
            channels: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, falling back to an
    /// empty config when the file is missing or malformed.
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("warning: {}: {}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Get config file path, creating `~/.tirc` if needed
    pub fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let tirc_dir = home.join(".tirc");
            if !tirc_dir.exists() {
                let _ = fs::create_dir_all(&tirc_dir);
            }
            return Some(tirc_dir.join("config.toml"));
        }
        None
    }
}

// Get home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_network_list() {
        let toml = r##"
            [[networks]]
            name = "libera"
            server = "irc.libera.chat"
            nick = "somenick"
            channels = ["#rust"]
        "##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.networks.len(), 1);
        let net = &config.networks[0];
        assert_eq!(net.server, "irc.libera.chat");
        assert_eq!(net.port, 6667); // defaulted
        assert_eq!(net.channels, vec!["#rust"]);
    }

    #[test]
    fn empty_config_has_no_networks() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.networks.is_empty());
    }
}
