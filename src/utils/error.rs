use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReserverError {
    #[error("Credential missing or undecodable: {reason}")]
    MissingCredential { reason: String },

    #[error("Credential expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("Credential refresh failed: {reason}")]
    RefreshFailed { reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Input contract violation: {message}")]
    InputContractViolation { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Probe task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Notification failed: {message}")]
    NotificationError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Input,
    Configuration,
    System,
    Cancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ReserverError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCredential { .. } | Self::Expired { .. } | Self::RefreshFailed { .. } => {
                ErrorCategory::Authentication
            }
            Self::Transport(_) | Self::UnexpectedStatus { .. } | Self::NotificationError { .. } => {
                ErrorCategory::Network
            }
            Self::InputContractViolation { .. } => ErrorCategory::Input,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::TomlError(_) => ErrorCategory::Configuration,
            Self::IoError(_) | Self::TaskJoin(_) => ErrorCategory::System,
            Self::Cancelled => ErrorCategory::Cancellation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled | Self::NotificationError { .. } => ErrorSeverity::Low,
            // 可重試：放棄本次嘗試，由呼叫端決定是否再來
            Self::Expired { .. }
            | Self::RefreshFailed { .. }
            | Self::Transport(_)
            | Self::UnexpectedStatus { .. } => ErrorSeverity::Medium,
            Self::InputContractViolation { .. } | Self::TaskJoin(_) => ErrorSeverity::High,
            Self::MissingCredential { .. }
            | Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::TomlError(_)
            | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// The credential can no longer be used in this process: missing, or
    /// expired beyond refresh. Loops must stop and report instead of retrying.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::MissingCredential { .. } | Self::Expired { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => {
                "Log in again and export a fresh JWT (auth.token or the JWT environment variable)"
            }
            Self::Expired { .. } => "The session token expired; obtain a new token and restart",
            Self::RefreshFailed { .. } => "Retry later; if it keeps failing, log in again",
            Self::Transport(_) | Self::UnexpectedStatus { .. } => {
                "Check network connectivity and the service status, then retry"
            }
            Self::InputContractViolation { .. } => {
                "The service returned data that cannot be used as-is; check the queue or try another strategy"
            }
            Self::Cancelled => "No action needed",
            Self::NotificationError { .. } => "Check the Telegram bot token and chat ids",
            Self::IoError(_) => "Check file paths and permissions",
            Self::TaskJoin(_) => {
                "A background probe crashed; rerun with --verbose and report the log"
            }
            Self::TomlError(_)
            | Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Fix the configuration file and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Authentication => format!("Authentication problem: {}", self),
            ErrorCategory::Network => {
                format!("Service unreachable or rejected the request: {}", self)
            }
            ErrorCategory::Input => format!("Unexpected data from the service: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
            ErrorCategory::Cancellation => "Stopped".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReserverError>;
