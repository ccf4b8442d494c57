//! Fields shared by every SAML protocol request.
//!
//! Each request message embeds a [`RequestEnvelope`] and delegates the
//! shared attributes and the `Issuer` element to it, so that reading and
//! writing those fields behaves identically across message types.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

use super::{Saml2Id, SAML_NS, SAML_PREFIX, SAML_VERSION};

/// The request envelope: identifier, timing, addressing and issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique identifier for this request.
    pub id: Saml2Id,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The URL this request is sent to.
    pub destination: Url,

    /// The identifier of the message this one answers, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<Saml2Id>,

    /// The entity ID of the sender.
    pub issuer: String,

    /// The RelayState travelling alongside the message.
    ///
    /// It is carried by the transport binding and never appears in the XML.
    #[serde(skip)]
    pub relay_state: Option<String>,
}

impl RequestEnvelope {
    /// Creates an envelope with a fresh identifier, issued now.
    #[must_use]
    pub fn new(issuer: impl Into<String>, destination: Url) -> Self {
        Self {
            id: Saml2Id::generate(),
            issue_instant: Utc::now(),
            destination,
            in_response_to: None,
            issuer: issuer.into(),
            relay_state: None,
        }
    }

    /// Writes `ID`, `Version`, `IssueInstant`, `Destination` and, when set,
    /// `InResponseTo` onto `element`.
    pub(crate) fn write_attributes(&self, element: &mut XmlElement) {
        element.set_attribute("ID", self.id.as_str());
        element.set_attribute("Version", SAML_VERSION);
        element.set_attribute("IssueInstant", format_instant(&self.issue_instant));
        element.set_attribute("Destination", self.destination.as_str());
        if let Some(in_response_to) = &self.in_response_to {
            element.set_attribute("InResponseTo", in_response_to.as_str());
        }
    }

    /// Builds the `saml:Issuer` element.
    ///
    /// A blank issuer would read back as a missing one, so it is refused.
    pub(crate) fn issuer_element(&self) -> SamlResult<XmlElement> {
        if self.issuer.trim().is_empty() {
            return Err(SamlError::PolicyViolation("Issuer must not be empty".to_string()));
        }
        Ok(XmlElement::new(SAML_NS, SAML_PREFIX, "Issuer").with_text(self.issuer.as_str()))
    }

    /// Reads the envelope fields from a message root element.
    ///
    /// The caller has already checked the element name and version.
    pub(crate) fn read(root: &XmlElement, relay_state: Option<String>) -> SamlResult<Self> {
        let id = Saml2Id::parse(required_attribute(root, "ID")?)?;

        let issue_instant = parse_instant(required_attribute(root, "IssueInstant")?)?;

        let destination = required_attribute(root, "Destination")?;
        let destination = Url::parse(destination).map_err(|e| {
            SamlError::malformed(format!("invalid Destination '{destination}': {e}"))
        })?;

        let in_response_to = root
            .attribute("InResponseTo")
            .map(Saml2Id::parse)
            .transpose()?;

        let issuer = root
            .child(SAML_NS, "Issuer")
            .map(XmlElement::text)
            .filter(|issuer| !issuer.trim().is_empty())
            .ok_or_else(|| SamlError::malformed("missing Issuer element"))?
            .to_string();

        Ok(Self {
            id,
            issue_instant,
            destination,
            in_response_to,
            issuer,
            relay_state,
        })
    }
}

fn required_attribute<'a>(element: &'a XmlElement, name: &str) -> SamlResult<&'a str> {
    element
        .attribute(name)
        .ok_or_else(|| SamlError::malformed(format!("missing {name} attribute")))
}

/// Formats a timestamp as an `xs:dateTime` in UTC.
///
/// Fractional seconds are written only when present, so parsing the output
/// yields the same instant. Years past 9999 are written unsigned, as
/// `xs:dateTime` requires.
pub(crate) fn format_instant(instant: &DateTime<Utc>) -> String {
    let text = instant.to_rfc3339_opts(SecondsFormat::AutoSi, true);
    match text.strip_prefix('+') {
        Some(unsigned) => unsigned.to_string(),
        None => text,
    }
}

fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    let year_digits = value.bytes().take_while(u8::is_ascii_digit).count();
    let parsed = if value.starts_with('-') {
        value.parse::<DateTime<FixedOffset>>()
    } else if year_digits > 4 && value.as_bytes().get(year_digits) == Some(&b'-') {
        // chrono expects an explicit sign on years outside 0000..=9999
        format!("+{value}").parse::<DateTime<FixedOffset>>()
    } else {
        DateTime::parse_from_rfc3339(value)
    };

    parsed
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::malformed(format!("invalid IssueInstant '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::SAMLP_NS;

    fn envelope() -> RequestEnvelope {
        RequestEnvelope {
            id: Saml2Id::new("_abc123"),
            issue_instant: Utc.with_ymd_and_hms(2004, 12, 5, 9, 21, 59).unwrap(),
            destination: Url::parse("https://idp.example.com/sso").unwrap(),
            in_response_to: None,
            issuer: "https://sp.example.com".to_string(),
            relay_state: None,
        }
    }

    fn root_with(envelope: &RequestEnvelope) -> XmlElement {
        let mut root = XmlElement::new(SAMLP_NS, "samlp", "Message");
        envelope.write_attributes(&mut root);
        root.push_child(envelope.issuer_element().unwrap());
        root
    }

    #[test]
    fn writes_envelope_attributes() {
        let root = root_with(&envelope());

        assert_eq!(root.attribute("ID"), Some("_abc123"));
        assert_eq!(root.attribute("Version"), Some("2.0"));
        assert_eq!(root.attribute("IssueInstant"), Some("2004-12-05T09:21:59Z"));
        assert_eq!(root.attribute("Destination"), Some("https://idp.example.com/sso"));
        assert_eq!(root.attribute("InResponseTo"), None);
        assert_eq!(
            root.child(SAML_NS, "Issuer").map(XmlElement::text),
            Some("https://sp.example.com")
        );
    }

    #[test]
    fn reads_back_written_envelope() {
        let mut original = envelope();
        original.in_response_to = Some(Saml2Id::new("_prev"));
        original.issue_instant = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();

        let read = RequestEnvelope::read(&root_with(&original), Some("state".to_string())).unwrap();

        assert_eq!(read.relay_state.as_deref(), Some("state"));
        assert_eq!(RequestEnvelope { relay_state: None, ..read }, original);
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        let full = root_with(&envelope());

        for missing in ["ID", "IssueInstant", "Destination"] {
            let mut root = XmlElement::new(SAMLP_NS, "samlp", "Message");
            for (key, value) in full.attributes().filter(|(key, _)| *key != missing) {
                root.set_attribute(key, value);
            }
            root.push_child(envelope().issuer_element().unwrap());

            let err = RequestEnvelope::read(&root, None).unwrap_err();
            assert!(
                err.to_string().contains(&format!("missing {missing}")),
                "unexpected error for {missing}: {err}"
            );
        }

        let mut no_issuer = XmlElement::new(SAMLP_NS, "samlp", "Message");
        envelope().write_attributes(&mut no_issuer);
        let err = RequestEnvelope::read(&no_issuer, None).unwrap_err();
        assert!(err.to_string().contains("missing Issuer"));
    }

    #[test]
    fn invalid_values_are_malformed() {
        let mut root = root_with(&envelope());
        root.set_attribute("IssueInstant", "yesterday");
        assert!(matches!(
            RequestEnvelope::read(&root, None),
            Err(SamlError::MalformedDocument(_))
        ));

        let mut root = root_with(&envelope());
        root.set_attribute("Destination", "not a url");
        assert!(matches!(
            RequestEnvelope::read(&root, None),
            Err(SamlError::MalformedDocument(_))
        ));
    }

    #[test]
    fn instants_round_trip_past_year_9999() {
        for (year, written) in [
            (9999, "9999-12-31T23:59:59Z"),
            (10000, "10000-12-31T23:59:59Z"),
            (0, "0000-12-31T23:59:59Z"),
            (-1, "-0001-12-31T23:59:59Z"),
        ] {
            let instant = Utc.with_ymd_and_hms(year, 12, 31, 23, 59, 59).unwrap();
            assert_eq!(format_instant(&instant), written);
            assert_eq!(parse_instant(written).unwrap(), instant);
        }

        let mut original = envelope();
        original.issue_instant = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let read = RequestEnvelope::read(&root_with(&original), None).unwrap();
        assert_eq!(read, original);

        for extremity in [DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC] {
            assert_eq!(parse_instant(&format_instant(&extremity)).unwrap(), extremity);
        }
    }

    #[test]
    fn long_years_still_need_a_date() {
        for bad in ["10000", "10000-01-01", "+10000-01-01T00:00:00Z", "10000T00:00:00Z"] {
            assert!(parse_instant(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }

    #[test]
    fn issuer_text_is_kept_verbatim() {
        let mut original = envelope();
        original.issuer = " https://sp.example.com ".to_string();
        let read = RequestEnvelope::read(&root_with(&original), None).unwrap();
        assert_eq!(read.issuer, " https://sp.example.com ");
    }

    #[test]
    fn blank_issuer_is_not_written() {
        for issuer in ["", "   "] {
            let mut blank = envelope();
            blank.issuer = issuer.to_string();
            assert!(matches!(blank.issuer_element(), Err(SamlError::PolicyViolation(_))));
        }
    }

    #[test]
    fn new_generates_id_and_timestamp() {
        let before = Utc::now();
        let envelope = RequestEnvelope::new(
            "https://sp.example.com",
            Url::parse("https://idp.example.com/sso").unwrap(),
        );
        assert!(envelope.id.as_str().starts_with("_id"));
        assert!(envelope.issue_instant >= before);
        assert_eq!(envelope.issuer, "https://sp.example.com");
    }
}
