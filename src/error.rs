//! Failure taxonomy of the answer path.
//!
//! No failure ever reaches the caller as an error: each one is classified
//! and replaced by a plain-language fallback answer.
//!
//! | Variant | Class | Raised when |
//! |---------|-------|-------------|
//! | `Configuration` | `configuration` | credential missing or rejected, provider disabled |
//! | `Transport` | `network` | network failure, timeout, non-success status, malformed body |
//! | `EmptyResult` | `empty` | the model returned no usable text |
//! | `Snapshot` | `data` | the dataset snapshot could not be read |

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIGURATION_FALLBACK: &str = "I can't reach the AI service because it isn't configured. Please check the API key setting.";
pub const NETWORK_FALLBACK: &str =
    "I encountered an error processing your request. Please check your network or API key.";
pub const EMPTY_FALLBACK: &str = "I couldn't generate a response based on the data.";
pub const DATA_FALLBACK: &str =
    "I couldn't read the deal data right now. Please try again once the data sync has finished.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("completion service is not configured: {0}")]
    Configuration(String),

    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("completion returned no text")]
    EmptyResult,

    #[error("dataset snapshot unavailable: {0}")]
    Snapshot(String),
}

/// Coarse failure class reported alongside a fallback answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    Configuration,
    Network,
    Empty,
    Data,
}

impl AssistantError {
    pub fn class(&self) -> FailureClass {
        match self {
            AssistantError::Configuration(_) => FailureClass::Configuration,
            AssistantError::Transport(_) => FailureClass::Network,
            AssistantError::EmptyResult => FailureClass::Empty,
            AssistantError::Snapshot(_) => FailureClass::Data,
        }
    }

    pub fn fallback_text(&self) -> &'static str {
        self.class().fallback_text()
    }
}

impl FailureClass {
    pub fn fallback_text(self) -> &'static str {
        match self {
            FailureClass::Configuration => CONFIGURATION_FALLBACK,
            FailureClass::Network => NETWORK_FALLBACK,
            FailureClass::Empty => EMPTY_FALLBACK,
            FailureClass::Data => DATA_FALLBACK,
        }
    }
}
