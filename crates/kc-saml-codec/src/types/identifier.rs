//! SAML protocol identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};

/// Maximum accepted length of an inbound identifier.
const MAX_ID_LENGTH: usize = 256;

/// A protocol message identifier, the value of an `ID` or `InResponseTo`
/// attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Saml2Id(String);

impl Saml2Id {
    /// Wraps a caller-supplied identifier without checking it.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("_id{}", uuid::Uuid::new_v4()))
    }

    /// Parses an identifier read from a document.
    ///
    /// The value must be an `xs:NCName` of at most 256 characters: a letter
    /// or underscore, followed by letters, digits, `.`, `-`, `_`, `·` or the
    /// combining characters NCName allows.
    pub fn parse(value: &str) -> SamlResult<Self> {
        if value.chars().count() > MAX_ID_LENGTH {
            return Err(SamlError::malformed(format!(
                "identifier exceeds maximum length of {MAX_ID_LENGTH} characters"
            )));
        }

        let mut chars = value.chars();
        let valid = chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char);
        if !valid {
            return Err(SamlError::malformed(format!("invalid identifier '{value}'")));
        }

        Ok(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_name_start_char(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || c.is_numeric()
        || matches!(c, '.' | '-' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

impl fmt::Display for Saml2Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Saml2Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Saml2Id {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Saml2Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = Saml2Id::generate();
        let b = Saml2Id::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("_id"));
        assert_eq!(Saml2Id::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn parse_accepts_ncname_shapes() {
        assert!(Saml2Id::parse("ide3c2f1c88255463ab4eb1b158fa6f616").is_ok());
        assert!(Saml2Id::parse("_123").is_ok());
        assert!(Saml2Id::parse("a-b.c").is_ok());
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        for bad in [
            "", "123abc", "has space", "ns:id", "-lead", "_a<b", "_a/b", "_a#b", "_a&b", "_a\"b",
        ] {
            assert!(
                matches!(Saml2Id::parse(bad), Err(SamlError::MalformedDocument(_))),
                "expected '{bad}' to be rejected"
            );
        }
        assert!(Saml2Id::parse(&format!("_{}", "a".repeat(MAX_ID_LENGTH))).is_err());
    }

    #[test]
    fn length_is_counted_in_characters() {
        let accented = format!("_{}", "é".repeat(MAX_ID_LENGTH - 1));
        assert_eq!(accented.chars().count(), MAX_ID_LENGTH);
        assert!(accented.len() > MAX_ID_LENGTH);
        assert!(Saml2Id::parse(&accented).is_ok());
        assert!(Saml2Id::parse("_a\u{B7}b").is_ok());
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(Saml2Id::from("abc"), Saml2Id::new(String::from("abc")));
        assert_eq!(Saml2Id::from("abc").to_string(), "abc");
    }
}
