use serde::Deserialize;
use tracing::{info, warn};

use crate::{errors::Error, Result};

/// Query parameters of the subscription handshake (`GET` on the webhook URL).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: String,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: String,
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
}

/// Returns the challenge to echo back when the handshake is valid.
pub fn verify_subscription(params: &VerifyParams, expected_token: &str) -> Result<String> {
    if params.mode != "subscribe" {
        warn!(mode = %params.mode, "webhook verification with unexpected mode");
        return Err(Error::VerificationFailed(format!(
            "unexpected hub.mode {:?}",
            params.mode
        )));
    }
    if expected_token.is_empty() || params.verify_token != expected_token {
        warn!("webhook verification token mismatch");
        return Err(Error::VerificationFailed("verify token mismatch".to_string()));
    }

    info!("webhook subscription verified");
    Ok(params.challenge.clone())
}
