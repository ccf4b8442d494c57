//! SAML Name ID policy.
//!
//! The policy tells the identity provider how the subject identifier in its
//! response should be formatted, and whether it may mint a new one.

use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

use super::{parse_bool, NameIdFormat, SAMLP_NS, SAMLP_PREFIX};

const TRANSIENT_ALLOW_CREATE: &str = "When NameIdPolicy/Format is set to Transient, it is not \
permitted to specify AllowCreate. Change Format or leave AllowCreate as null.";

/// Name ID policy for authentication requests.
///
/// Construction never fails; the Transient/AllowCreate rule is checked when
/// the policy is serialized, see [`NameIdPolicy::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// Whether the identity provider may create a new identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create: Option<bool>,

    /// The requested name ID format.
    #[serde(default)]
    pub format: NameIdFormat,
}

impl NameIdPolicy {
    /// Creates a policy from its two fields.
    #[must_use]
    pub const fn new(allow_create: Option<bool>, format: NameIdFormat) -> Self {
        Self {
            allow_create,
            format,
        }
    }

    /// Creates a policy requesting a specific format.
    #[must_use]
    pub const fn with_format(format: NameIdFormat) -> Self {
        Self::new(None, format)
    }

    /// Sets whether new identifiers can be created.
    #[must_use]
    pub const fn allow_create(mut self, allow: bool) -> Self {
        self.allow_create = Some(allow);
        self
    }

    /// Checks the cross-field rule: a transient format forbids `AllowCreate`.
    pub fn validate(&self) -> SamlResult<()> {
        if self.format == NameIdFormat::Transient && self.allow_create.is_some() {
            return Err(SamlError::PolicyViolation(TRANSIENT_ALLOW_CREATE.to_string()));
        }
        Ok(())
    }

    /// Builds the `samlp:NameIDPolicy` element, validating first.
    ///
    /// The element is emitted even when both fields are unset.
    pub fn to_xml_element(&self) -> SamlResult<XmlElement> {
        self.validate()?;

        let mut element = XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "NameIDPolicy");
        if let Some(allow_create) = self.allow_create {
            element.set_attribute("AllowCreate", allow_create.to_string());
        }
        if let Some(uri) = self.format.uri() {
            element.set_attribute("Format", uri);
        }
        Ok(element)
    }

    /// Reads a policy from a `samlp:NameIDPolicy` element.
    pub fn from_xml_element(element: &XmlElement) -> SamlResult<Self> {
        let allow_create = element
            .attribute("AllowCreate")
            .map(|value| parse_bool("AllowCreate", value))
            .transpose()?;

        let format = match element.attribute("Format") {
            Some(uri) => NameIdFormat::from_uri(uri)
                .ok_or_else(|| SamlError::UnsupportedNameIdFormat(uri.to_string()))?,
            None => NameIdFormat::NotConfigured,
        };

        Ok(Self {
            allow_create,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_forbids_allow_create() {
        for allow in [true, false] {
            let policy = NameIdPolicy::with_format(NameIdFormat::Transient).allow_create(allow);
            let err = policy.to_xml_element().unwrap_err();
            assert!(matches!(err, SamlError::PolicyViolation(_)));
            assert_eq!(
                err.to_string(),
                "When NameIdPolicy/Format is set to Transient, it is not permitted to specify \
                 AllowCreate. Change Format or leave AllowCreate as null."
            );
        }

        assert!(NameIdPolicy::with_format(NameIdFormat::Transient).validate().is_ok());
    }

    #[test]
    fn element_attributes_follow_fields() {
        let element = NameIdPolicy::new(Some(false), NameIdFormat::NotConfigured)
            .to_xml_element()
            .unwrap();
        assert_eq!(element.attribute("AllowCreate"), Some("false"));
        assert_eq!(element.attribute("Format"), None);

        let element = NameIdPolicy::with_format(NameIdFormat::EmailAddress)
            .to_xml_element()
            .unwrap();
        assert_eq!(element.attribute("AllowCreate"), None);
        assert_eq!(
            element.attribute("Format"),
            Some("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress")
        );

        let element = NameIdPolicy::default().to_xml_element().unwrap();
        assert!(element.is(SAMLP_NS, "NameIDPolicy"));
        assert_eq!(element.attributes().count(), 0);
    }

    #[test]
    fn reads_policy_attributes() {
        let element = XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "NameIDPolicy")
            .with_attribute("AllowCreate", "1")
            .with_attribute("Format", "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent");
        let policy = NameIdPolicy::from_xml_element(&element).unwrap();
        assert_eq!(policy, NameIdPolicy::new(Some(true), NameIdFormat::Persistent));

        let element = XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "NameIDPolicy");
        assert_eq!(
            NameIdPolicy::from_xml_element(&element).unwrap(),
            NameIdPolicy::default()
        );
    }

    #[test]
    fn rejects_unknown_values() {
        let element = XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "NameIDPolicy")
            .with_attribute("Format", "urn:example:custom");
        assert!(matches!(
            NameIdPolicy::from_xml_element(&element),
            Err(SamlError::UnsupportedNameIdFormat(_))
        ));

        let element = XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "NameIDPolicy")
            .with_attribute("AllowCreate", "yes");
        assert!(matches!(
            NameIdPolicy::from_xml_element(&element),
            Err(SamlError::MalformedDocument(_))
        ));
    }
}
