//! Conversion between typed protocol messages and XML.
//!
//! A message type supplies its element name and the code for its own
//! payload; [`Saml2Message`] provides the rest of the pipeline. Reading an
//! inbound document always goes through the same steps, in order:
//!
//! 1. absent input yields `Ok(None)`
//! 2. size limit, then a hardened parse into an [`XmlElement`]
//! 3. root element name and namespace
//! 4. `Version="2.0"`
//! 5. message fields, via [`Saml2Message::from_checked_element`]

use crate::config::CodecConfig;
use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

use super::{SAMLP_NS, SAMLP_PREFIX, SAML_NS, SAML_PREFIX, SAML_VERSION};

/// A SAML 2.0 protocol message with a lossless XML form.
pub trait Saml2Message: Sized {
    /// Local name of the root element, in the protocol namespace.
    const ELEMENT_NAME: &'static str;

    /// Human-readable message name, used in error messages.
    const DESCRIPTION: &'static str;

    /// Serializes the message into an element tree.
    fn to_xml_element(&self) -> SamlResult<XmlElement>;

    /// Reads the message from a root element whose name and version have
    /// already been checked.
    fn from_checked_element(root: &XmlElement, relay_state: Option<String>) -> SamlResult<Self>;

    /// Reads the message from a root element, checking its name and version.
    fn from_xml_element(root: &XmlElement, relay_state: Option<String>) -> SamlResult<Self> {
        check_root::<Self>(root)?;
        Self::from_checked_element(root, relay_state)
    }

    /// Serializes the message to XML text.
    fn to_xml(&self) -> SamlResult<String> {
        self.to_xml_element()?.to_xml_string()
    }

    /// Parses an inbound message with the default [`CodecConfig`].
    ///
    /// `None` input means no message was sent and yields `Ok(None)`. The
    /// relay state is attached to the result unchanged.
    fn read(xml: Option<&str>, relay_state: Option<&str>) -> SamlResult<Option<Self>> {
        Self::read_with_config(xml, relay_state, &CodecConfig::default())
    }

    /// Parses an inbound message under explicit parse limits.
    fn read_with_config(
        xml: Option<&str>,
        relay_state: Option<&str>,
        config: &CodecConfig,
    ) -> SamlResult<Option<Self>> {
        let Some(xml) = xml else {
            return Ok(None);
        };

        let result = XmlElement::parse(xml, config)
            .and_then(|root| Self::from_xml_element(&root, relay_state.map(String::from)));

        match result {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                tracing::warn!("Rejected inbound SAML2 {}: {}", Self::DESCRIPTION, e);
                Err(e)
            }
        }
    }
}

/// Creates a protocol message root element declaring both SAML namespaces.
pub(crate) fn protocol_root<M: Saml2Message>() -> XmlElement {
    XmlElement::new(SAMLP_NS, SAMLP_PREFIX, M::ELEMENT_NAME)
        .with_namespace_declaration(SAMLP_PREFIX, SAMLP_NS)
        .with_namespace_declaration(SAML_PREFIX, SAML_NS)
}

fn check_root<M: Saml2Message>(root: &XmlElement) -> SamlResult<()> {
    if !root.is(SAMLP_NS, M::ELEMENT_NAME) {
        return Err(SamlError::UnexpectedMessageType {
            expected: M::DESCRIPTION,
            found: root.local_name().to_string(),
        });
    }

    match root.attribute("Version") {
        Some(SAML_VERSION) => Ok(()),
        found => Err(SamlError::UnsupportedVersion {
            found: found.map(String::from),
        }),
    }
}

/// Parses an `xs:boolean` attribute value.
pub(crate) fn parse_bool(name: &str, value: &str) -> SamlResult<bool> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(SamlError::malformed(format!(
            "invalid boolean {name}=\"{other}\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::types::RequestEnvelope;

    /// A payload-free request, standing in for any other message type.
    #[derive(Debug, PartialEq)]
    struct PingRequest {
        envelope: RequestEnvelope,
    }

    impl Saml2Message for PingRequest {
        const ELEMENT_NAME: &'static str = "PingRequest";
        const DESCRIPTION: &'static str = "ping request";

        fn to_xml_element(&self) -> SamlResult<XmlElement> {
            let mut root = protocol_root::<Self>();
            self.envelope.write_attributes(&mut root);
            root.push_child(self.envelope.issuer_element()?);
            Ok(root)
        }

        fn from_checked_element(
            root: &XmlElement,
            relay_state: Option<String>,
        ) -> SamlResult<Self> {
            Ok(Self {
                envelope: RequestEnvelope::read(root, relay_state)?,
            })
        }
    }

    fn ping() -> PingRequest {
        PingRequest {
            envelope: RequestEnvelope::new(
                "https://sp.example.com",
                Url::parse("https://idp.example.com/ping").unwrap(),
            ),
        }
    }

    #[test]
    fn generic_pipeline_round_trips() {
        let original = ping();
        let xml = original.to_xml().unwrap();
        assert!(xml.starts_with("<samlp:PingRequest xmlns:samlp="));

        let read = PingRequest::read(Some(&xml), None).unwrap().unwrap();
        assert_eq!(read, original);
    }

    #[test]
    fn absent_input_is_not_an_error() {
        assert!(PingRequest::read(None, Some("state")).unwrap().is_none());
    }

    #[test]
    fn root_checks_use_message_description() {
        let mut root = ping().to_xml_element().unwrap();
        root.set_attribute("Version", "1.1");
        assert!(matches!(
            PingRequest::from_xml_element(&root, None),
            Err(SamlError::UnsupportedVersion { found: Some(v) }) if v == "1.1"
        ));

        let other = XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "Pong");
        let err = PingRequest::from_xml_element(&other, None).unwrap_err();
        assert_eq!(err.to_string(), "Expected a SAML2 ping request document");
    }

    #[test]
    fn wrong_namespace_is_wrong_message_type() {
        let root = XmlElement::new(SAML_NS, SAML_PREFIX, "PingRequest").with_attribute("Version", "2.0");
        assert!(matches!(
            PingRequest::from_xml_element(&root, None),
            Err(SamlError::UnexpectedMessageType { .. })
        ));
    }

    #[test]
    fn booleans() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", " false ").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "TRUE").is_err());
    }
}
