//! In-process session store.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{domain::LoginSession, errors::Error, ports::SessionStore, Result};

/// `SessionStore` backed by a vector under one lock.
///
/// Uniqueness of business id, phone id and bridge identity is checked under the
/// same lock as the insert, so concurrent registrations cannot both succeed.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<LoginSession>>,
}

impl MemorySessionStore {
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn find_by(
        &self,
        key: &str,
        field: &'static str,
        pick: impl Fn(&LoginSession) -> &str,
    ) -> Result<Option<LoginSession>> {
        if key.trim().is_empty() {
            return Err(Error::MissingField(field));
        }
        let sessions = self.sessions.lock().await;
        Ok(sessions.iter().find(|s| pick(s) == key).cloned())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_by_business_id(&self, business_id: &str) -> Result<Option<LoginSession>> {
        self.find_by(business_id, "business_id", |s| s.business_id.as_str())
            .await
    }

    async fn find_by_phone_id(&self, phone_id: &str) -> Result<Option<LoginSession>> {
        self.find_by(phone_id, "phone_id", |s| s.phone_id.as_str()).await
    }

    async fn find_by_bridge_identity(&self, identity: &str) -> Result<Option<LoginSession>> {
        self.find_by(identity, "bridge_identity", |s| s.bridge_identity.as_str())
            .await
    }

    async fn insert(&self, session: LoginSession) -> Result<LoginSession> {
        let mut sessions = self.sessions.lock().await;
        for existing in sessions.iter() {
            if existing.business_id == session.business_id {
                return Err(Error::UniqueViolation(format!(
                    "business_id {}",
                    session.business_id
                )));
            }
            if existing.phone_id == session.phone_id {
                return Err(Error::UniqueViolation(format!(
                    "phone_id {}",
                    session.phone_id
                )));
            }
            if existing.bridge_identity == session.bridge_identity {
                return Err(Error::UniqueViolation(format!(
                    "bridge_identity {}",
                    session.bridge_identity
                )));
            }
        }
        sessions.push(session.clone());
        Ok(session)
    }

    async fn remove(&self, business_id: &str) -> Result<()> {
        if business_id.trim().is_empty() {
            return Err(Error::MissingField("business_id"));
        }
        self.sessions
            .lock()
            .await
            .retain(|s| s.business_id != business_id);
        Ok(())
    }
}
