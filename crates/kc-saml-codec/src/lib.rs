//! SAML 2.0 protocol message codec for Keycloak Rust.
//!
//! This crate converts typed SAML 2.0 protocol messages to and from XML,
//! enforcing the protocol's structural and cross-field rules in both
//! directions:
//!
//! - **AuthnRequest serialization** - Build the XML a service provider sends to an identity provider
//! - **AuthnRequest parsing** - Read and validate inbound authentication requests
//! - **Hardened XML reading** - No DTDs, no entity expansion, bounded size and depth
//!
//! # Architecture
//!
//! - [`types`] - Protocol messages, the shared request envelope, and value types
//! - [`xml`] - The namespace-aware element tree messages are built from and read into
//! - [`config`] - Parse limits for inbound documents
//! - [`error`] - Error types for codec operations
//!
//! Transport bindings, XML signatures and metadata live with the callers:
//! they consume the element tree or XML text produced here.
//!
//! # Example
//!
//! ```rust,ignore
//! use kc_saml_codec::{AuthnRequest, NameIdFormat, NameIdPolicy, Saml2Message};
//!
//! let request = AuthnRequest::new("https://sp.example.com", idp_sso_url)
//!     .with_acs_url(acs_url)
//!     .with_name_id_policy(NameIdPolicy::with_format(NameIdFormat::Persistent));
//! let xml = request.to_xml()?;
//!
//! let inbound = AuthnRequest::read(Some(&xml), relay_state.as_deref())?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;
pub mod xml;

pub use config::CodecConfig;
pub use error::{SamlError, SamlResult};
pub use types::*;
pub use xml::XmlElement;
