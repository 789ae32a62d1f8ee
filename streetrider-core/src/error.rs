use thiserror::Error;

/// Failures reported by the host camera/map sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host view unavailable: {0}")]
    Unavailable(String),
    #[error("host rejected pose update: {0}")]
    Rejected(String),
}

/// Rejections at the configuration boundary. The previous valid settings
/// stay in effect whenever one of these is returned.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("unknown vehicle id \"{0}\"")]
    UnknownVehicle(String),
    #[error("key {code} is bound to both {first} and {second}")]
    DuplicateBinding {
        code: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl SettingsError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("cannot start drive session: {0}")]
    HostUnavailable(#[from] HostError),
    #[error("host view not found after {attempts} attach attempts")]
    AttachTimedOut { attempts: u32 },
    #[error("host rejected pose updates for {frames} consecutive frames")]
    HostRejected { frames: u32 },
}
