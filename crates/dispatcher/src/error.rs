//! Dispatcher error types
//!
//! All of these surface while sinks are being opened; once the dispatcher
//! runs, sink failures are counted per frame instead.

use contracts::{ContractError, SinkType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A sink type requires a parameter the config does not set
    #[error("sink '{sink}': missing required parameter '{param}'")]
    MissingParam { sink: String, param: &'static str },

    /// A sink parameter is set but unusable
    #[error("sink '{sink}': invalid {param} '{value}': {reason}")]
    InvalidParam {
        sink: String,
        param: &'static str,
        value: String,
        reason: String,
    },

    /// Two sinks configured under one name
    #[error("duplicate sink name '{0}'")]
    DuplicateSink(String),

    /// Output directory or socket could not be opened
    #[error("failed to open {kind:?} sink '{sink}': {source}")]
    Open {
        sink: String,
        kind: SinkType,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DispatcherError {
    pub fn missing_param(sink: &str, param: &'static str) -> Self {
        Self::MissingParam {
            sink: sink.to_string(),
            param,
        }
    }

    pub fn invalid_param(
        sink: &str,
        param: &'static str,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidParam {
            sink: sink.to_string(),
            param,
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn open(sink: &str, kind: SinkType, source: std::io::Error) -> Self {
        Self::Open {
            sink: sink.to_string(),
            kind,
            source,
        }
    }

    /// Whether fixing the sink configuration would resolve this error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParam { .. } | Self::InvalidParam { .. } | Self::DuplicateSink(_)
        )
    }
}
