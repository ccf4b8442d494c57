//! SAML codec error types.
//!
//! Every failure is terminal for the message being produced or consumed:
//! there is no partial result, and callers must treat the message as
//! untrusted (inbound) or unsendable (outbound).

use thiserror::Error;

use crate::types::{status_codes, sub_status_codes};

/// Result type for SAML codec operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML codec errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// A value being serialized violates a protocol rule.
    #[error("{0}")]
    PolicyViolation(String),

    /// The document declares a protocol version other than "2.0".
    #[error("Wrong or unsupported SAML2 version")]
    UnsupportedVersion {
        /// The `Version` attribute found, if any.
        found: Option<String>,
    },

    /// The document root is not the expected message element.
    #[error("Expected a SAML2 {expected} document")]
    UnexpectedMessageType {
        /// Human-readable name of the expected message.
        expected: &'static str,
        /// Local name of the root element that was found.
        found: String,
    },

    /// The input is not well-formed, breaks a parse limit, or lacks a
    /// required field.
    #[error("malformed SAML2 document: {0}")]
    MalformedDocument(String),

    /// Unknown or unsupported name ID format.
    #[error("unsupported name ID format: {0}")]
    UnsupportedNameIdFormat(String),

    /// Unknown or unsupported binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Writing the element tree to text failed.
    #[error("XML write error: {0}")]
    XmlWrite(String),
}

impl SamlError {
    /// Creates a [`SamlError::MalformedDocument`] from any message.
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument(message.into())
    }

    /// Returns the SAML status code for this error.
    ///
    /// This is the top-level code an identity provider places in the error
    /// response it returns for a rejected request.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion { .. } => status_codes::VERSION_MISMATCH,
            Self::UnexpectedMessageType { .. }
            | Self::MalformedDocument(_)
            | Self::UnsupportedNameIdFormat(_)
            | Self::UnsupportedBinding(_) => status_codes::REQUESTER,
            Self::PolicyViolation(_) | Self::XmlWrite(_) => status_codes::RESPONDER,
        }
    }

    /// Returns a sub-status code if applicable.
    #[must_use]
    pub fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedNameIdFormat(_) => Some(sub_status_codes::INVALID_NAMEID_POLICY),
            Self::UnsupportedBinding(_) => Some(sub_status_codes::UNSUPPORTED_BINDING),
            Self::UnexpectedMessageType { .. } => Some(sub_status_codes::REQUEST_UNSUPPORTED),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::MalformedDocument(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::MalformedDocument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let err = SamlError::UnsupportedVersion {
            found: Some("1.1".to_string()),
        };
        assert_eq!(err.status_code(), "urn:oasis:names:tc:SAML:2.0:status:VersionMismatch");
        assert_eq!(err.sub_status_code(), None);

        let err = SamlError::UnsupportedNameIdFormat("urn:example".to_string());
        assert_eq!(err.status_code(), "urn:oasis:names:tc:SAML:2.0:status:Requester");
        assert_eq!(
            err.sub_status_code(),
            Some("urn:oasis:names:tc:SAML:2.0:status:InvalidNameIDPolicy")
        );

        let err = SamlError::PolicyViolation("test".to_string());
        assert_eq!(err.status_code(), "urn:oasis:names:tc:SAML:2.0:status:Responder");
    }

    #[test]
    fn error_messages() {
        let err = SamlError::UnexpectedMessageType {
            expected: "authentication request",
            found: "NotAuthnRequest".to_string(),
        };
        assert_eq!(err.to_string(), "Expected a SAML2 authentication request document");

        let err = SamlError::UnsupportedVersion { found: None };
        assert_eq!(err.to_string(), "Wrong or unsupported SAML2 version");

        let err = SamlError::PolicyViolation("exact text".to_string());
        assert_eq!(err.to_string(), "exact text");
    }
}
