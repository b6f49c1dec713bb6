use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use tracing::warn;

use super::{TokenGenerator, parse_token};
use crate::error::{Error, Result};
use crate::server::{ApiError, AppState};
use crate::store::SqliteStore;
use crate::types::{Id, Token};

/// Extractor that requires a valid bearer token and yields its user.
pub struct RequireUser {
    pub user_id: Id,
    pub token: Token,
}

/// Resolves an `Authorization` header value to the token it carries.
///
/// A missing header, another scheme, an unknown or wrong token, and an
/// expired token all fail with an unauthenticated error. A successful use
/// stamps `last_used_at`.
pub fn authenticate(
    store: &SqliteStore,
    tokens: &TokenGenerator,
    header: Option<&str>,
) -> Result<Token> {
    let raw_token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(Error::Unauthenticated)?;
    let (lookup, _secret) = parse_token(raw_token).map_err(|_| Error::Unauthenticated)?;

    let token = store
        .read(|q| q.workspaces().get_token_by_lookup(&lookup))?
        .ok_or(Error::Unauthenticated)?;
    if !tokens.verify(raw_token, &token.token_hash)? {
        return Err(Error::Unauthenticated);
    }

    if token.expires_at.is_some_and(|expires_at| expires_at < Utc::now()) {
        return Err(Error::TokenExpired);
    }

    if let Err(e) = store.transact(|q| q.workspaces().update_token_last_used(token.id)) {
        warn!(error = %e, "failed to update token last_used_at");
    }

    Ok(token)
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = authenticate(state.service.store(), &state.tokens, header)?;
        Ok(RequireUser {
            user_id: token.user_id,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::test_support::test_store;

    #[test]
    fn test_authenticate() {
        let t = test_store();
        let tokens = TokenGenerator::new().unwrap();
        let (token, raw) = tokens.issue(t.user_id).unwrap();
        t.store
            .transact(|q| q.workspaces().create_token(&token))
            .unwrap();

        let header = format!("Bearer {raw}");
        let found = authenticate(&t.store, &tokens, Some(&header)).unwrap();
        assert_eq!(found.user_id, t.user_id);

        let stored = t
            .store
            .read(|q| q.workspaces().get_token_by_lookup(&token.token_lookup))
            .unwrap()
            .unwrap();
        assert!(stored.last_used_at.is_some());
    }

    #[test]
    fn test_rejects_missing_and_wrong_tokens() {
        let t = test_store();
        let tokens = TokenGenerator::new().unwrap();
        let (token, raw) = tokens.issue(t.user_id).unwrap();
        t.store
            .transact(|q| q.workspaces().create_token(&token))
            .unwrap();

        assert!(matches!(
            authenticate(&t.store, &tokens, None),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            authenticate(&t.store, &tokens, Some(&format!("Basic {raw}"))),
            Err(Error::Unauthenticated)
        ));

        let mut forged = raw.clone();
        forged.replace_range(forged.len() - 4.., "0000");
        if forged != raw {
            assert!(matches!(
                authenticate(&t.store, &tokens, Some(&format!("Bearer {forged}"))),
                Err(Error::Unauthenticated)
            ));
        }
    }

    #[test]
    fn test_rejects_expired_token() {
        let t = test_store();
        let tokens = TokenGenerator::new().unwrap();
        let (mut token, raw) = tokens.issue(t.user_id).unwrap();
        token.expires_at = Some(Utc::now() - Duration::hours(1));
        t.store
            .transact(|q| q.workspaces().create_token(&token))
            .unwrap();

        let result = authenticate(&t.store, &tokens, Some(&format!("Bearer {raw}")));
        assert!(matches!(result, Err(Error::TokenExpired)));
    }
}
