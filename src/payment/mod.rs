//! VNPay integration: checksum codec, payment links and callback parsing.
pub mod callback;
pub mod checksum;
pub mod link;
pub mod responses;

pub use callback::GatewayCallback;
pub use checksum::{canonicalize, Checksum, SIGNATURE_FIELD, SIGNATURE_TYPE_FIELD};
pub use link::{LinkRequest, PaymentLink, PaymentLinkBuilder};
