use chrono::Utc;
use std::sync::Arc;

use super::session_store::{Session, SessionStore, StoreError};
use super::token::{TokenError, TokenSigner};
use super::AuthUser;
use crate::models::User;

/// Why a presented token did not resolve to a user.
///
/// Kept for diagnostics only; callers outside this module only ever see
/// "no user".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Missing,
    Malformed,
    BadSignature,
    Revoked,
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Valid(AuthUser),
    Invalid(InvalidReason),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues, verifies and revokes bearer session tokens.
///
/// A token is valid only while its signature checks out *and* its session
/// record is still present in the store.
pub struct AuthSessionManager {
    signer: TokenSigner,
    store: Arc<dyn SessionStore>,
}

impl AuthSessionManager {
    pub fn new(secret: &str, store: Arc<dyn SessionStore>) -> Self {
        Self {
            signer: TokenSigner::new(secret),
            store,
        }
    }

    /// Sign a token for `user` and persist its session record
    pub async fn issue(&self, user: &User) -> Result<String, AuthError> {
        let token = self.signer.sign(user)?;

        self.store
            .insert(&Session {
                token: token.clone(),
                user_id: user.id,
                issued_at: Utc::now(),
            })
            .await?;

        tracing::debug!(user_id = user.id, "Session issued");
        Ok(token)
    }

    /// Signature check followed by the live revocation check
    pub async fn verify(&self, raw_token: Option<&str>) -> Verification {
        let Some(token) = raw_token.filter(|t| !t.is_empty()) else {
            return Verification::Invalid(InvalidReason::Missing);
        };

        let claims = match self.signer.verify(token) {
            Ok(claims) => claims,
            Err(TokenError::BadSignature) => {
                return Verification::Invalid(InvalidReason::BadSignature)
            }
            Err(_) => return Verification::Invalid(InvalidReason::Malformed),
        };

        match self.store.contains(token).await {
            Ok(true) => Verification::Valid(AuthUser::from(claims)),
            Ok(false) => Verification::Invalid(InvalidReason::Revoked),
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed");
                Verification::Invalid(InvalidReason::StoreUnavailable)
            }
        }
    }

    /// Resolve a raw token to a user; every failure collapses to `None`
    pub async fn authenticate(&self, raw_token: Option<&str>) -> Option<AuthUser> {
        match self.verify(raw_token).await {
            Verification::Valid(user) => Some(user),
            Verification::Invalid(InvalidReason::Missing) => None,
            Verification::Invalid(reason) => {
                tracing::debug!(?reason, "Rejected session token");
                None
            }
        }
    }

    /// Delete the session record for `raw_token`. Unknown tokens are a no-op.
    pub async fn revoke(&self, raw_token: &str) -> Result<(), StoreError> {
        let removed = self.store.remove(raw_token).await?;
        if !removed {
            tracing::debug!("Revoke for unknown or already revoked token");
        }
        Ok(())
    }

    pub async fn active_sessions(&self, user_id: u64) -> Result<usize, StoreError> {
        self.store.count_for_user(user_id).await
    }
}
