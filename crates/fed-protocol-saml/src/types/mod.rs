//! SAML 2.0 message types.
//!
//! Messages are plain data; serializing them to XML and applying a
//! binding's wire encoding is left to the transport.

mod constants;
mod identifier;
mod logout;
mod manage_name_id;
mod message;
mod response;
mod status;

pub use constants::*;
pub use identifier::Identifier;
pub(crate) use identifier::decrypt_value;
pub use logout::LogoutRequest;
pub use manage_name_id::{ManageNameIdRequest, NameIdAction};
pub use message::{SamlMessage, SignedMessage};
pub use response::{LogoutResponse, ManageNameIdResponse, StatusResponse};
pub use status::{Status, StatusCode};
