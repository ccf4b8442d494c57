//! SAML 2.0 protocol message types.
//!
//! This module contains the typed protocol messages, the value types they
//! own, and the request envelope shared between message types.

mod authn_request;
mod constants;
mod envelope;
mod identifier;
mod message;
mod name_id;

pub use authn_request::*;
pub use constants::*;
pub use envelope::*;
pub use identifier::*;
pub use message::*;
pub use name_id::*;

pub(crate) use message::parse_bool;
