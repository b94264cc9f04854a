use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] urbanpulse_core::ValidationError),

    #[error(transparent)]
    Config(#[from] urbanpulse_core::ConfigError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Upstream(#[from] urbanpulse_core::SourceError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Upstream(error) => match error.kind() {
                urbanpulse_core::SourceErrorKind::Configuration => 2,
                _ => 3,
            },
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
