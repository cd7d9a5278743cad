//! Token authentication for the distribution protocol
//!
//! Registries answer unauthenticated requests with a `WWW-Authenticate`
//! challenge; Bearer challenges point at a token endpoint that exchanges
//! basic credentials for a short-lived access token.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// A parsed WWW-Authenticate challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Token endpoint challenge with realm and optional service/scope
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
    /// Plain basic authentication
    Basic,
}

/// Parse a WWW-Authenticate header value into a challenge
pub fn parse_challenge(header: &str) -> Result<Challenge> {
    let header = header.trim();
    let (scheme, rest) = match header.split_once(' ') {
        Some((scheme, rest)) => (scheme, rest),
        None => (header, ""),
    };

    match scheme.to_ascii_lowercase().as_str() {
        "basic" => Ok(Challenge::Basic),
        "bearer" => {
            let params = parse_params(rest)?;
            let realm = params
                .get("realm")
                .context("Bearer challenge has no realm")?
                .clone();
            Ok(Challenge::Bearer {
                realm,
                service: params.get("service").cloned(),
                scope: params.get("scope").cloned(),
            })
        }
        other => bail!("Unsupported authentication scheme: {}", other),
    }
}

/// Parse `key="value"` pairs, allowing commas inside quoted values
fn parse_params(input: &str) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        // Skip separators
        while matches!(chars.peek(), Some(&',') | Some(&' ') | Some(&'\t')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        for c in chars.by_ref() {
            if c == '=' {
                break;
            }
            key.push(c);
        }
        let key = key.trim().to_string();
        if key.is_empty() {
            bail!("Malformed challenge parameter in: {}", input);
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                value.push(c);
            }
            if !closed {
                bail!("Unterminated quoted value in: {}", input);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.insert(key, value);
    }

    Ok(params)
}

/// Response body of a token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// The usable token, whichever field the endpoint filled
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .or(self.access_token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Default token lifetime when the endpoint does not state one
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 60;

/// Renew tokens this long before they actually expire
const EXPIRY_SLACK_SECS: i64 = 10;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// In-process cache of bearer tokens keyed by registry and scope
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: HashMap<String, CachedToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let cached = self.tokens.get(key)?;
        if cached.expires_at - Duration::seconds(EXPIRY_SLACK_SECS) <= Utc::now() {
            return None;
        }
        Some(cached.token.clone())
    }

    pub fn put(&mut self, key: String, token: String, expires_in: Option<i64>) {
        let lifetime = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS).max(1);
        self.tokens.insert(
            key,
            CachedToken {
                token,
                expires_at: Utc::now() + Duration::seconds(lifetime),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_challenge() {
        let challenge = parse_challenge(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:team/app:pull,push""#,
        )
        .unwrap();

        assert_eq!(
            challenge,
            Challenge::Bearer {
                realm: "https://auth.example.com/token".to_string(),
                service: Some("registry.example.com".to_string()),
                scope: Some("repository:team/app:pull,push".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_bearer_minimal() {
        let challenge = parse_challenge(r#"Bearer realm="https://ghcr.io/token""#).unwrap();
        match challenge {
            Challenge::Bearer {
                realm,
                service,
                scope,
            } => {
                assert_eq!(realm, "https://ghcr.io/token");
                assert!(service.is_none());
                assert!(scope.is_none());
            }
            Challenge::Basic => panic!("expected bearer"),
        }
    }

    #[test]
    fn test_parse_basic_challenge() {
        assert_eq!(
            parse_challenge(r#"Basic realm="Registry Realm""#).unwrap(),
            Challenge::Basic
        );
        assert_eq!(parse_challenge("Basic").unwrap(), Challenge::Basic);
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(parse_challenge("Digest realm=\"x\"").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_realm() {
        assert!(parse_challenge(r#"Bearer service="registry""#).is_err());
    }

    #[test]
    fn test_token_response_field_preference() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"token":"abc","access_token":"def"}"#).unwrap();
        assert_eq!(response.token(), Some("abc"));

        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"def","expires_in":300}"#).unwrap();
        assert_eq!(response.token(), Some("def"));
        assert_eq!(response.expires_in, Some(300));

        let response: TokenResponse = serde_json::from_str(r#"{"token":""}"#).unwrap();
        assert_eq!(response.token(), None);
    }

    #[test]
    fn test_token_cache_round_trip() {
        let mut cache = TokenCache::new();
        assert!(cache.get("key").is_none());

        cache.put("key".to_string(), "tok".to_string(), Some(300));
        assert_eq!(cache.get("key").as_deref(), Some("tok"));
    }

    #[test]
    fn test_token_cache_expires() {
        let mut cache = TokenCache::new();
        // Lifetime shorter than the renewal slack reads back as expired
        cache.put("key".to_string(), "tok".to_string(), Some(5));
        assert!(cache.get("key").is_none());
    }
}
