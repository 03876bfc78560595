use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("no {0} selected")]
    NoSelection(&'static str),

    #[error("unknown panel '{0}'")]
    UnknownPanel(String),

    #[error("panel '{0}' is already registered")]
    DuplicatePanel(String),

    #[error("key '{key}' is already bound on panel '{panel}'")]
    DuplicateBinding { panel: String, key: String },

    #[error("{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("action flow cannot move from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ConsoleError {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Invariant violations halt the console; everything else is shown to the operator.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownPanel(_)
                | Self::DuplicatePanel(_)
                | Self::DuplicateBinding { .. }
                | Self::Config(_)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The engine rejected the request; the message is shown verbatim.
    #[error("{0}")]
    Command(String),

    #[error("failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("unexpected backend output: {0}")]
    Decode(String),

    #[error("{path}: {reason}")]
    Io { path: String, reason: String },
}
