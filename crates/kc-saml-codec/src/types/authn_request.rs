//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{SamlError, SamlResult};
use crate::xml::XmlElement;

use super::message::protocol_root;
use super::{
    parse_bool, AuthnContextClass, NameIdPolicy, RequestEnvelope, Saml2Id, Saml2Message,
    SamlBinding, SAMLP_NS, SAMLP_PREFIX, SAML_NS, SAML_PREFIX,
};

/// SAML Authentication Request.
///
/// An authentication request message sent from a service provider to an
/// identity provider requesting authentication of a principal.
///
/// Every optional field is omitted from the XML when `None`; nothing is
/// ever written as an empty or zero-valued placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Identifier, timing, destination and issuer.
    #[serde(flatten)]
    pub envelope: RequestEnvelope,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<Url>,

    /// Index into the SP's attribute consuming service list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_consuming_service_index: Option<u16>,

    /// Whether the IdP must authenticate the user directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_authn: Option<bool>,

    /// Whether the IdP must not interact with the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_passive: Option<bool>,

    /// Binding to use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<SamlBinding>,

    /// Name ID policy constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Requested authentication context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_authn_context: Option<RequestedAuthnContext>,
}

impl AuthnRequest {
    /// Creates a new authentication request with a fresh ID, issued now.
    #[must_use]
    pub fn new(issuer: impl Into<String>, destination: Url) -> Self {
        Self::from_envelope(RequestEnvelope::new(issuer, destination))
    }

    /// Creates a request around an existing envelope, with no optional fields.
    #[must_use]
    pub const fn from_envelope(envelope: RequestEnvelope) -> Self {
        Self {
            envelope,
            assertion_consumer_service_url: None,
            attribute_consuming_service_index: None,
            force_authn: None,
            is_passive: None,
            protocol_binding: None,
            name_id_policy: None,
            requested_authn_context: None,
        }
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<Saml2Id>) -> Self {
        self.envelope.id = id.into();
        self
    }

    /// Sets the issue instant.
    #[must_use]
    pub fn with_issue_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.envelope.issue_instant = instant;
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: Url) -> Self {
        self.assertion_consumer_service_url = Some(url);
        self
    }

    /// Sets the attribute consuming service index.
    #[must_use]
    pub const fn with_attribute_consuming_service_index(mut self, index: u16) -> Self {
        self.attribute_consuming_service_index = Some(index);
        self
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub const fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding);
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub const fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Sets the requested authentication context.
    #[must_use]
    pub fn with_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self
    }

    /// Sets force authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = Some(force);
        self
    }

    /// Sets passive authentication.
    #[must_use]
    pub const fn is_passive(mut self, passive: bool) -> Self {
        self.is_passive = Some(passive);
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, state: impl Into<String>) -> Self {
        self.envelope.relay_state = Some(state.into());
        self
    }

    /// The request ID.
    #[must_use]
    pub fn id(&self) -> &Saml2Id {
        &self.envelope.id
    }

    /// The relay state, if any.
    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        self.envelope.relay_state.as_deref()
    }
}

impl Saml2Message for AuthnRequest {
    const ELEMENT_NAME: &'static str = "AuthnRequest";
    const DESCRIPTION: &'static str = "authentication request";

    fn to_xml_element(&self) -> SamlResult<XmlElement> {
        let mut root = protocol_root::<Self>();
        self.envelope.write_attributes(&mut root);

        if let Some(force_authn) = self.force_authn {
            root.set_attribute("ForceAuthn", force_authn.to_string());
        }
        if let Some(is_passive) = self.is_passive {
            root.set_attribute("IsPassive", is_passive.to_string());
        }
        if let Some(binding) = self.protocol_binding {
            root.set_attribute("ProtocolBinding", binding.uri());
        }
        if let Some(url) = &self.assertion_consumer_service_url {
            root.set_attribute("AssertionConsumerServiceURL", url.as_str());
        }
        if let Some(index) = self.attribute_consuming_service_index {
            root.set_attribute("AttributeConsumingServiceIndex", index.to_string());
        }

        root.push_child(self.envelope.issuer_element()?);

        if let Some(policy) = &self.name_id_policy {
            root.push_child(policy.to_xml_element()?);
        }
        if let Some(context) = self
            .requested_authn_context
            .as_ref()
            .and_then(RequestedAuthnContext::to_xml_element)
        {
            root.push_child(context);
        }

        tracing::debug!("Serialized AuthnRequest {}", self.envelope.id);
        Ok(root)
    }

    fn from_checked_element(root: &XmlElement, relay_state: Option<String>) -> SamlResult<Self> {
        let envelope = RequestEnvelope::read(root, relay_state)?;

        let assertion_consumer_service_url = root
            .attribute("AssertionConsumerServiceURL")
            .map(|url| {
                Url::parse(url).map_err(|e| {
                    SamlError::malformed(format!("invalid AssertionConsumerServiceURL '{url}': {e}"))
                })
            })
            .transpose()?;

        let attribute_consuming_service_index = root
            .attribute("AttributeConsumingServiceIndex")
            .map(|index| {
                index.trim().parse::<u16>().map_err(|e| {
                    SamlError::malformed(format!(
                        "invalid AttributeConsumingServiceIndex '{index}': {e}"
                    ))
                })
            })
            .transpose()?;

        let force_authn = root
            .attribute("ForceAuthn")
            .map(|value| parse_bool("ForceAuthn", value))
            .transpose()?;

        let is_passive = root
            .attribute("IsPassive")
            .map(|value| parse_bool("IsPassive", value))
            .transpose()?;

        let protocol_binding = root
            .attribute("ProtocolBinding")
            .map(|uri| {
                SamlBinding::from_uri(uri).ok_or_else(|| SamlError::UnsupportedBinding(uri.to_string()))
            })
            .transpose()?;

        let name_id_policy = root
            .child(SAMLP_NS, "NameIDPolicy")
            .map(NameIdPolicy::from_xml_element)
            .transpose()?;

        let requested_authn_context = root
            .child(SAMLP_NS, "RequestedAuthnContext")
            .map(RequestedAuthnContext::from_xml_element)
            .transpose()?;

        tracing::debug!(
            "Parsed AuthnRequest {} from issuer '{}'",
            envelope.id,
            envelope.issuer
        );

        Ok(Self {
            envelope,
            assertion_consumer_service_url,
            attribute_consuming_service_index,
            force_authn,
            is_passive,
            protocol_binding,
            name_id_policy,
            requested_authn_context,
        })
    }
}

/// Requested authentication context.
///
/// Without a class reference there is nothing to compare against, so such a
/// context is left out of the serialized request entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAuthnContext {
    /// The acceptable authentication context class reference URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_ref: Option<String>,

    /// Comparison method for the authentication context.
    #[serde(default)]
    pub comparison: AuthnContextComparison,
}

impl RequestedAuthnContext {
    /// Creates a new requested authentication context.
    #[must_use]
    pub const fn new(class_ref: Option<String>, comparison: AuthnContextComparison) -> Self {
        Self {
            class_ref,
            comparison,
        }
    }

    /// Creates a context requiring exact match of a well-known class.
    #[must_use]
    pub fn exact(class: AuthnContextClass) -> Self {
        Self::new(Some(class.uri().to_string()), AuthnContextComparison::Exact)
    }

    /// Sets the class reference.
    #[must_use]
    pub fn with_class_ref(mut self, class_ref: impl Into<String>) -> Self {
        self.class_ref = Some(class_ref.into());
        self
    }

    /// Sets the comparison method.
    #[must_use]
    pub const fn with_comparison(mut self, comparison: AuthnContextComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Builds the `samlp:RequestedAuthnContext` element, or `None` when
    /// there is no class reference. An empty class reference counts as none.
    #[must_use]
    pub fn to_xml_element(&self) -> Option<XmlElement> {
        let class_ref = self.class_ref.as_deref().filter(|c| !c.is_empty())?;
        Some(
            XmlElement::new(SAMLP_NS, SAMLP_PREFIX, "RequestedAuthnContext")
                .with_attribute("Comparison", self.comparison.as_str())
                .with_child(
                    XmlElement::new(SAML_NS, SAML_PREFIX, "AuthnContextClassRef")
                        .with_text(class_ref),
                ),
        )
    }

    /// Reads a context from a `samlp:RequestedAuthnContext` element.
    ///
    /// A missing `Comparison` means `Exact`. Only the first class reference
    /// is kept, with its text unchanged; an empty one reads as `None`.
    pub fn from_xml_element(element: &XmlElement) -> SamlResult<Self> {
        let comparison = match element.attribute("Comparison") {
            Some(token) => AuthnContextComparison::from_token(token).ok_or_else(|| {
                SamlError::malformed(format!("invalid Comparison '{token}'"))
            })?,
            None => AuthnContextComparison::Exact,
        };

        let class_ref = element
            .child(SAML_NS, "AuthnContextClassRef")
            .map(XmlElement::text)
            .filter(|class_ref| !class_ref.is_empty())
            .map(str::to_string);

        Ok(Self {
            class_ref,
            comparison,
        })
    }
}

/// Authentication context comparison methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthnContextComparison {
    /// Exact match required.
    #[default]
    Exact,
    /// Match must be at least as strong.
    Minimum,
    /// Match must be at most as strong.
    Maximum,
    /// Match must be stronger.
    Better,
}

impl AuthnContextComparison {
    /// Every comparison, in declaration order.
    pub const ALL: [Self; 4] = [Self::Exact, Self::Minimum, Self::Maximum, Self::Better];

    /// Returns the token written to the `Comparison` attribute.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "Exact",
            Self::Minimum => "Minimum",
            Self::Maximum => "Maximum",
            Self::Better => "Better",
        }
    }

    const fn schema_token(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Better => "better",
        }
    }

    /// Parses a `Comparison` token, accepting both the written spelling and
    /// the lowercase schema spelling.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|comparison| token == comparison.as_str() || token == comparison.schema_token())
    }
}
