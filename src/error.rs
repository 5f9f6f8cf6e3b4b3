use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration `{field}`: {message}")]
    Config {
        field: &'static str,
        message: String,
    },
    #[error("allocation of {component} failed: {message}")]
    Allocation {
        component: &'static str,
        message: String,
    },
    #[error("no alignment result after {frames} frames (search space exhausted)")]
    NoResult { frames: usize },
    #[error("phrase spotting for \"{phrase}\" desynchronised: {message}")]
    PhraseMismatch { phrase: String, message: String },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl AlignmentError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn allocation(component: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Allocation {
            component,
            message: err.to_string(),
        }
    }

    pub(crate) fn phrase_mismatch(phrase: &str, message: impl Into<String>) -> Self {
        Self::PhraseMismatch {
            phrase: phrase.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
