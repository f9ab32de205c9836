use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::model::Viewer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
}

impl Token {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("sign in required")]
    SignedOut,
    #[error("no access token available")]
    TokenUnavailable,
}

/// Source of the signed-in viewer and their short-lived access tokens.
///
/// `token` is called once per mutating request and its result is never
/// cached by the feed.
pub trait IdentityProvider: Send + Sync {
    fn token(&self) -> Result<Token, AuthError>;
    fn current_viewer(&self) -> Option<Viewer>;
}

/// Identity read from configuration. The viewer can be swapped at runtime
/// to model sign-in and sign-out.
#[derive(Default)]
pub struct StaticIdentity {
    viewer: RwLock<Option<Viewer>>,
    token: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn new(viewer: Option<Viewer>, token: Option<String>) -> Self {
        Self {
            viewer: RwLock::new(viewer),
            token: RwLock::new(token.filter(|token| !token.trim().is_empty())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<dyn IdentityProvider> {
        Arc::new(self)
    }

    pub fn sign_in(&self, viewer: Viewer, token: impl Into<String>) {
        *self.viewer.write() = Some(viewer);
        *self.token.write() = Some(token.into());
    }

    pub fn sign_out(&self) {
        *self.viewer.write() = None;
        *self.token.write() = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn token(&self) -> Result<Token, AuthError> {
        if self.viewer.read().is_none() {
            return Err(AuthError::SignedOut);
        }
        self.token
            .read()
            .clone()
            .map(|access_token| Token { access_token })
            .ok_or(AuthError::TokenUnavailable)
    }

    fn current_viewer(&self) -> Option<Viewer> {
        self.viewer.read().clone()
    }
}
