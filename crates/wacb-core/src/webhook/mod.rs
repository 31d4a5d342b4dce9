//! Inbound webhook handling: envelope shape, dispatch, and subscription handshake.

pub mod dispatcher;
pub mod envelope;
pub mod verify;

pub use dispatcher::{DispatchOutcome, WebhookAck, WebhookEventDispatcher};
pub use envelope::WebhookEnvelope;
pub use verify::{verify_subscription, VerifyParams};
