//! Local session identity.
//!
//! Authentication proper is delegated to the host environment; this
//! adapter keeps exactly one signed-in session in memory so the rest of
//! the stack sees the same auth surface it would get from a real host.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::capability::{AuthCapability, UserIdentity};

pub struct SessionAuth {
    identity: UserIdentity,
    session: RwLock<Option<UserIdentity>>,
}

impl SessionAuth {
    pub fn new(id: &str, username: &str) -> Self {
        Self {
            identity: UserIdentity {
                id: id.to_string(),
                username: username.to_string(),
            },
            session: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AuthCapability for SessionAuth {
    async fn is_signed_in(&self) -> Result<bool> {
        Ok(self.session.read().map(|s| s.is_some()).unwrap_or(false))
    }

    async fn get_user(&self) -> Result<UserIdentity> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.clone())
            .ok_or_else(|| anyhow!("not signed in"))
    }

    async fn sign_in(&self) -> Result<()> {
        if let Ok(mut session) = self.session.write() {
            *session = Some(self.identity.clone());
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        if let Ok(mut session) = self.session.write() {
            *session = None;
        }
        Ok(())
    }
}
