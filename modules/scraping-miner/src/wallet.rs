use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// The miner's identity: a bittensor wallet hotkey read from disk.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub name: String,
    pub hotkey_name: String,
    pub path: PathBuf,
    pub hotkey: String,
}

#[derive(Deserialize)]
struct KeyFile {
    #[serde(rename = "ss58Address")]
    ss58_address: String,
}

impl Wallet {
    /// Reads `{path}/{name}/hotkeys/{hotkey}`.
    pub fn load(path: &str, name: &str, hotkey_name: &str) -> Result<Self> {
        let path = expand_tilde(path);
        let file = path.join(name).join("hotkeys").join(hotkey_name);
        let raw = std::fs::read_to_string(&file).with_context(|| {
            format!(
                "hotkey file {} not found; create it with `btcli wallet new_hotkey`",
                file.display()
            )
        })?;
        let key: KeyFile = serde_json::from_str(&raw)
            .with_context(|| format!("hotkey file {} is not a valid keyfile", file.display()))?;

        Ok(Self {
            name: name.to_string(),
            hotkey_name: hotkey_name.to_string(),
            path,
            hotkey: key.ss58_address,
        })
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wallet (Name: '{}', Hotkey: '{}', Path: '{}')",
            self.name,
            self.hotkey_name,
            self.path.display()
        )
    }
}

/// Expand a leading `~` using `$HOME`.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => Path::new(&home).join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
