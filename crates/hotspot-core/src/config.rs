//! Persisted user configuration, stored as `key=value` lines.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

pub const DEFAULT_SSID: &str = "LinuxHotspot";
pub const DEFAULT_PASSWORD: &str = "password123";
pub const DEFAULT_MAX_CLIENTS: u32 = 10;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 63;
pub const MAX_SSID_BYTES: usize = 32;
pub const MAX_CHANNEL: u32 = 196;
pub const MAX_CLIENTS_LIMIT: u32 = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotConfig {
    pub ssid: String,
    pub password: String,
    /// 0 = auto: inherit the client connection's channel at generation time
    pub channel: u32,
    pub max_clients: u32,
    pub hidden: bool,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_SSID.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            channel: 0,
            max_clients: DEFAULT_MAX_CLIENTS,
            hidden: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Ssid,
    Password,
    Channel,
    MaxClients,
    Hidden,
}

impl ConfigField {
    pub const ALL: [ConfigField; 5] = [
        ConfigField::Ssid,
        ConfigField::Password,
        ConfigField::Channel,
        ConfigField::MaxClients,
        ConfigField::Hidden,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ConfigField::Ssid => "ssid",
            ConfigField::Password => "password",
            ConfigField::Channel => "channel",
            ConfigField::MaxClients => "max_clients",
            ConfigField::Hidden => "hidden",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ConfigField {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        ConfigField::ALL
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

impl HotspotConfig {
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Lenient parse: unknown keys and bad values are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut cfg = Self::default();
        for line in contents.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!("Ignoring malformed config line: {line}");
                continue;
            };
            let field = match key.parse::<ConfigField>() {
                Ok(field) => field,
                Err(_) => {
                    debug!("Ignoring unknown config key: {}", key.trim());
                    continue;
                }
            };
            if let Err(err) = cfg.assign(field, value) {
                warn!("Ignoring config value for {field}: {err}");
            }
        }
        cfg
    }

    pub fn render(&self) -> String {
        format!(
            "ssid={}\npassword={}\nchannel={}\nmax_clients={}\nhidden={}\n",
            self.ssid,
            self.password,
            self.channel,
            self.max_clients,
            if self.hidden { 1 } else { 0 }
        )
    }

    /// Writes via temp file + rename with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config dir {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            #[cfg(unix)]
            use std::os::unix::fs::OpenOptionsExt;

            #[cfg(unix)]
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp_path)
                .with_context(|| format!("opening {}", tmp_path.display()))?;

            #[cfg(not(unix))]
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .with_context(|| format!("opening {}", tmp_path.display()))?;

            file.write_all(self.render().as_bytes())
                .with_context(|| format!("writing {}", tmp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("syncing {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
        debug!("Saved hotspot config to {}", path.display());
        Ok(())
    }

    /// Validates `value` and applies it; on error the config is unchanged.
    pub fn set_field(&mut self, field: ConfigField, value: &str) -> Result<(), ConfigError> {
        self.assign(field, value)
    }

    pub fn get_field(&self, field: ConfigField) -> String {
        match field {
            ConfigField::Ssid => self.ssid.clone(),
            ConfigField::Password => self.password.clone(),
            ConfigField::Channel => self.channel.to_string(),
            ConfigField::MaxClients => self.max_clients.to_string(),
            ConfigField::Hidden => self.hidden.to_string(),
        }
    }

    fn assign(&mut self, field: ConfigField, value: &str) -> Result<(), ConfigError> {
        match field {
            ConfigField::Ssid => self.ssid = validate_ssid(value)?,
            ConfigField::Password => self.password = validate_password(value)?,
            ConfigField::Channel => self.channel = validate_channel(value)?,
            ConfigField::MaxClients => self.max_clients = validate_max_clients(value)?,
            ConfigField::Hidden => self.hidden = parse_bool(value)?,
        }
        Ok(())
    }
}

fn validate_ssid(value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::EmptySsid);
    }
    if value.len() > MAX_SSID_BYTES || value.chars().any(char::is_control) {
        return Err(ConfigError::InvalidSsid);
    }
    Ok(value.to_string())
}

fn validate_password(value: &str) -> Result<String, ConfigError> {
    let len = value.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooShort);
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong);
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::InvalidPassword);
    }
    Ok(value.to_string())
}

fn validate_channel(value: &str) -> Result<u32, ConfigError> {
    let channel = parse_int(value, "channel")?;
    if !(0..=i64::from(MAX_CHANNEL)).contains(&channel) {
        return Err(ConfigError::ChannelOutOfRange(channel));
    }
    Ok(channel as u32)
}

fn validate_max_clients(value: &str) -> Result<u32, ConfigError> {
    let count = parse_int(value, "max_clients")?;
    if !(1..=i64::from(MAX_CLIENTS_LIMIT)).contains(&count) {
        return Err(ConfigError::MaxClientsOutOfRange(count));
    }
    Ok(count as u32)
}

fn parse_int(value: &str, field: &'static str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: "hidden",
            value: value.to_string(),
        }),
    }
}

/// The config file plus its in-memory copy; every accepted edit is saved.
pub struct ConfigStore {
    path: PathBuf,
    config: HotspotConfig,
}

impl ConfigStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = HotspotConfig::load(&path)?;
        Ok(Self { path, config })
    }

    pub fn config(&self) -> &HotspotConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rejected values leave both memory and disk untouched.
    pub fn save_field(&mut self, field: ConfigField, value: &str) -> Result<()> {
        let mut candidate = self.config.clone();
        if let Err(err) = candidate.set_field(field, value) {
            warn!("Rejected {field} update: {err}");
            return Err(err.into());
        }
        candidate.save(&self.path)?;
        self.config = candidate;
        match field {
            ConfigField::Password => info!("Password updated (saved)."),
            _ => info!("{} set to {} (saved)", field, self.config.get_field(field)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = HotspotConfig::load(&tmp.path().join("absent.conf")).unwrap();
        assert_eq!(cfg, HotspotConfig::default());
        assert_eq!(cfg.channel, 0);
    }

    #[test]
    fn save_then_load_round_trips_every_field() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("etc").join("hotspot.conf");
        let cfg = HotspotConfig {
            ssid: "Cafe = Corner".to_string(),
            password: " spaced pass ".to_string(),
            channel: 149,
            max_clients: 25,
            hidden: true,
        };
        cfg.save(&path).unwrap();
        let loaded = HotspotConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hotspot.conf");
        HotspotConfig::default().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = HotspotConfig::parse("ssid=Home\nband=5ghz\nchannel=11\nnot a pair\n");
        assert_eq!(cfg.ssid, "Home");
        assert_eq!(cfg.channel, 11);
        assert_eq!(cfg.password, DEFAULT_PASSWORD);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let cfg = HotspotConfig::parse("password=short\nmax_clients=900\nhidden=maybe\n");
        assert_eq!(cfg.password, DEFAULT_PASSWORD);
        assert_eq!(cfg.max_clients, DEFAULT_MAX_CLIENTS);
        assert!(!cfg.hidden);
    }

    #[test]
    fn password_length_boundary() {
        let mut cfg = HotspotConfig::default();
        assert_eq!(
            cfg.set_field(ConfigField::Password, "1234567"),
            Err(ConfigError::PasswordTooShort)
        );
        assert_eq!(cfg.password, DEFAULT_PASSWORD);
        cfg.set_field(ConfigField::Password, "12345678").unwrap();
        assert_eq!(cfg.password, "12345678");
        assert_eq!(
            cfg.set_field(ConfigField::Password, &"x".repeat(64)),
            Err(ConfigError::PasswordTooLong)
        );
    }

    #[test]
    fn password_with_control_character_is_rejected() {
        let mut cfg = HotspotConfig::default();
        assert_eq!(
            cfg.set_field(ConfigField::Password, "pass\tword"),
            Err(ConfigError::InvalidPassword)
        );
        assert_eq!(cfg.password, DEFAULT_PASSWORD);
    }

    #[test]
    fn rejected_save_leaves_disk_and_memory_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hotspot.conf");
        let mut store = ConfigStore::open(path.clone()).unwrap();
        store.save_field(ConfigField::Ssid, "Office").unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(store.save_field(ConfigField::Password, "abc").is_err());
        assert_eq!(store.config().password, DEFAULT_PASSWORD);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn channel_and_max_clients_ranges() {
        let mut cfg = HotspotConfig::default();
        let err = cfg.set_field(ConfigField::Channel, "197").unwrap_err();
        assert_eq!(err.to_string(), "Invalid channel 197 (0=auto, otherwise 1-196)");
        cfg.set_field(ConfigField::Channel, "20").unwrap();
        assert!(cfg.set_field(ConfigField::Channel, "-1").is_err());
        cfg.set_field(ConfigField::Channel, "0").unwrap();
        cfg.set_field(ConfigField::Channel, "196").unwrap();
        assert!(cfg.set_field(ConfigField::MaxClients, "0").is_err());
        cfg.set_field(ConfigField::MaxClients, "255").unwrap();
        assert_eq!(cfg.max_clients, 255);
    }

    #[test]
    fn field_names_parse_like_keys() {
        assert_eq!("max-clients".parse::<ConfigField>(), Ok(ConfigField::MaxClients));
        assert_eq!("SSID".parse::<ConfigField>(), Ok(ConfigField::Ssid));
        assert!("band".parse::<ConfigField>().is_err());
    }

    #[test]
    fn ssid_with_newline_is_rejected() {
        let mut cfg = HotspotConfig::default();
        assert_eq!(
            cfg.set_field(ConfigField::Ssid, "two\nlines"),
            Err(ConfigError::InvalidSsid)
        );
        assert_eq!(cfg.set_field(ConfigField::Ssid, ""), Err(ConfigError::EmptySsid));
    }
}
