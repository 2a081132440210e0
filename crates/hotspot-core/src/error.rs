//! Error types for hotspot-core

use thiserror::Error;

/// Result type alias for hotspot operations
pub type Result<T> = std::result::Result<T, HotspotError>;

/// Failure classes surfaced by `start()`.
///
/// The `Display` text of each variant is the diagnostic stored in the
/// runtime state's error field, so it is written for an operator.
#[derive(Error, Debug)]
pub enum HotspotError {
    /// No usable radio, or the radio handle could not be resolved
    #[error("{0}")]
    Detection(String),

    /// Every AP interface name candidate failed to create
    #[error(
        "Failed to create virtual AP interface (tried {}). \
         Your WiFi driver may not support AP/STA concurrency.",
        .tried.join(", ")
    )]
    InterfaceExhausted { tried: Vec<String> },

    /// A daemon configuration file could not be written
    #[error("Failed to generate {daemon} configuration: {source}")]
    ConfigGeneration {
        daemon: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The AP daemon refused every startup phase
    #[error("{0}")]
    DaemonRejected(String),

    /// The DHCP/DNS daemon did not come up
    #[error("{0}")]
    DhcpStart(String),

    /// The requested transition is not valid from the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Shutdown was requested between phases
    #[error("Hotspot start cancelled.")]
    Cancelled,

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HotspotError {
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Rejected edits of the persisted hotspot configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SSID must not be empty")]
    EmptySsid,

    #[error("SSID must be at most 32 bytes without control characters")]
    InvalidSsid,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    #[error("Password must be at most 63 characters")]
    PasswordTooLong,

    #[error("Password must not contain control characters")]
    InvalidPassword,

    #[error("Invalid channel {0} (0=auto, otherwise 1-196)")]
    ChannelOutOfRange(i64),

    #[error("Invalid max clients {0} (1-255)")]
    MaxClientsOutOfRange(i64),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Unknown config field: {0}")]
    UnknownField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_names_candidates_and_driver_hint() {
        let err = HotspotError::InterfaceExhausted {
            tried: vec!["ap0".to_string(), "ap1".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("ap0, ap1"));
        assert!(msg.contains("AP/STA concurrency"));
    }

    #[test]
    fn detection_message_is_verbatim() {
        let err = HotspotError::detection("No WiFi interface detected.");
        assert_eq!(err.to_string(), "No WiFi interface detected.");
    }
}
