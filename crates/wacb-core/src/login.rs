//! Registration of a cloud business account against a bridge identity.
//!
//! `Requested -> Validated -> Registered -> Active`, or `Rejected` with a reason.

use std::{fmt, sync::Arc};

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    domain::LoginSession,
    errors::Error,
    ports::{LoginBinder, SessionStore},
    Result,
};

/// Registration body as posted by the provisioning API.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationRequest {
    pub app_name: String,
    pub waba_id: String,
    pub app_phone_id: String,
    pub access_token: String,
    pub notice_room: Option<String>,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("app_name", &self.app_name)
            .field("waba_id", &self.waba_id)
            .field("app_phone_id", &self.app_phone_id)
            .field("access_token", &crate::domain::mask_token(&self.access_token))
            .field("notice_room", &self.notice_room)
            .finish()
    }
}

#[derive(Debug)]
pub enum RegistrationState {
    Requested,
    Validated,
    Registered,
    Active,
    Rejected(Error),
}

impl RegistrationState {
    fn name(&self) -> &'static str {
        match self {
            RegistrationState::Requested => "requested",
            RegistrationState::Validated => "validated",
            RegistrationState::Registered => "registered",
            RegistrationState::Active => "active",
            RegistrationState::Rejected(_) => "rejected",
        }
    }
}

/// One registration attempt and where it ended up.
#[derive(Debug)]
pub struct Registration {
    bridge_identity: String,
    state: RegistrationState,
    session: Option<LoginSession>,
}

impl Registration {
    fn new(bridge_identity: &str) -> Self {
        Self {
            bridge_identity: bridge_identity.to_string(),
            state: RegistrationState::Requested,
            session: None,
        }
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn session(&self) -> Option<&LoginSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RegistrationState::Active)
    }

    pub fn rejection(&self) -> Option<&Error> {
        match &self.state {
            RegistrationState::Rejected(e) => Some(e),
            _ => None,
        }
    }

    /// The active session, or the rejection reason.
    pub fn into_result(self) -> Result<LoginSession> {
        match self.state {
            RegistrationState::Rejected(e) => Err(e),
            RegistrationState::Active => self
                .session
                .ok_or_else(|| Error::External("active registration without session".to_string())),
            other => Err(Error::External(format!(
                "registration stopped in state {}",
                other.name()
            ))),
        }
    }

    fn advance(&mut self, next: RegistrationState) {
        match &next {
            RegistrationState::Rejected(e) => warn!(
                bridge_identity = %self.bridge_identity,
                from = self.state.name(),
                reason = %e,
                "registration rejected"
            ),
            _ => info!(
                bridge_identity = %self.bridge_identity,
                from = self.state.name(),
                to = next.name(),
                "registration state changed"
            ),
        }
        self.state = next;
    }

    fn reject(mut self, err: Error) -> Self {
        self.advance(RegistrationState::Rejected(err));
        self
    }
}

pub struct LoginSessionNegotiator {
    store: Arc<dyn SessionStore>,
    binder: Arc<dyn LoginBinder>,
}

impl LoginSessionNegotiator {
    pub fn new(store: Arc<dyn SessionStore>, binder: Arc<dyn LoginBinder>) -> Self {
        Self { store, binder }
    }

    /// Parse a JSON registration body and register it.
    pub async fn register_json(&self, bridge_identity: &str, body: &[u8]) -> Registration {
        match serde_json::from_slice::<RegistrationRequest>(body) {
            Ok(req) => self.register(bridge_identity, req).await,
            Err(e) => {
                Registration::new(bridge_identity).reject(Error::MalformedPayload(e.to_string()))
            }
        }
    }

    pub async fn register(&self, bridge_identity: &str, req: RegistrationRequest) -> Registration {
        let mut reg = Registration::new(bridge_identity);

        if let Err(e) = validate(bridge_identity, &req) {
            return reg.reject(e);
        }
        reg.advance(RegistrationState::Validated);

        if let Err(e) = self.check_duplicates(bridge_identity, &req).await {
            return reg.reject(e);
        }

        let session = LoginSession {
            business_id: req.waba_id.trim().to_string(),
            phone_id: req.app_phone_id.trim().to_string(),
            access_token: req.access_token,
            app_name: req.app_name.trim().to_string(),
            bridge_identity: bridge_identity.to_string(),
            notice_room: req.notice_room.filter(|r| !r.trim().is_empty()),
        };

        let session = match self.store.insert(session).await {
            Ok(session) => session,
            Err(Error::UniqueViolation(what)) => {
                return reg.reject(Error::AlreadyRegistered(what));
            }
            Err(e) => return reg.reject(e),
        };
        reg.advance(RegistrationState::Registered);

        if let Err(e) = self.binder.bind(&session).await {
            // An unbound session must not stay stored.
            if let Err(cleanup) = self.store.remove(&session.business_id).await {
                error!(
                    business_id = %session.business_id,
                    error = %cleanup,
                    "failed to remove unbound session"
                );
            }
            return reg.reject(e);
        }
        reg.session = Some(session);
        reg.advance(RegistrationState::Active);
        reg
    }

    async fn check_duplicates(
        &self,
        bridge_identity: &str,
        req: &RegistrationRequest,
    ) -> Result<()> {
        if let Some(existing) = self.store.find_by_bridge_identity(bridge_identity).await? {
            return Err(Error::AlreadyRegistered(format!(
                "bridge identity {bridge_identity} is bound to business account {}",
                existing.business_id
            )));
        }
        if self.store.find_by_business_id(req.waba_id.trim()).await?.is_some() {
            return Err(Error::AlreadyRegistered(format!(
                "business account {}",
                req.waba_id.trim()
            )));
        }
        if self.store.find_by_phone_id(req.app_phone_id.trim()).await?.is_some() {
            return Err(Error::AlreadyRegistered(format!(
                "phone id {}",
                req.app_phone_id.trim()
            )));
        }
        Ok(())
    }
}

fn validate(bridge_identity: &str, req: &RegistrationRequest) -> Result<()> {
    let required = [
        ("bridge_identity", bridge_identity),
        ("app_name", req.app_name.as_str()),
        ("waba_id", req.waba_id.as_str()),
        ("app_phone_id", req.app_phone_id.as_str()),
        ("access_token", req.access_token.as_str()),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(Error::MissingField(*field));
    }
    if req.waba_id.trim() == req.app_phone_id.trim() {
        return Err(Error::IdentityCollision);
    }
    Ok(())
}
