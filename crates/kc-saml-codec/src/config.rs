//! Codec configuration.
//!
//! Inbound SAML messages arrive straight off the network, so the reader
//! bounds how much XML it is willing to look at before any parsing happens.

use serde::{Deserialize, Serialize};

/// Default upper bound on inbound document size, in bytes.
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 256 * 1024;

/// Default upper bound on element nesting depth.
pub const DEFAULT_MAX_ELEMENT_DEPTH: usize = 32;

/// Limits applied when parsing inbound documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum accepted document length in bytes.
    pub max_document_size: usize,
    /// Maximum accepted element nesting depth, counting the root as 1.
    pub max_element_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_element_depth: DEFAULT_MAX_ELEMENT_DEPTH,
        }
    }
}

impl CodecConfig {
    /// Loads configuration from environment variables.
    ///
    /// Reads `KC_SAML_MAX_DOCUMENT_SIZE` and `KC_SAML_MAX_ELEMENT_DEPTH`;
    /// missing or unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_document_size = std::env::var("KC_SAML_MAX_DOCUMENT_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_document_size);

        let max_element_depth = std::env::var("KC_SAML_MAX_ELEMENT_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_element_depth);

        Self {
            max_document_size,
            max_element_depth,
        }
    }

    /// Sets the maximum document size.
    #[must_use]
    pub const fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = bytes;
        self
    }

    /// Sets the maximum element depth.
    #[must_use]
    pub const fn with_max_element_depth(mut self, depth: usize) -> Self {
        self.max_element_depth = depth;
        self
    }
}
