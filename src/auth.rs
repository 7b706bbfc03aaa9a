use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::collections::HashMap;

use crate::collaborators::{AuthProvider, User};
use crate::error::{Error, Result};

/// Resolves `Authorization: Bearer <token>` against a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct TokenAuth {
    tokens: HashMap<String, String>,
}

impl TokenAuth {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Parse `token=user_id` pairs separated by commas.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut tokens = HashMap::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (token, user_id) = pair
                .split_once('=')
                .map(|(t, u)| (t.trim(), u.trim()))
                .filter(|(t, u)| !t.is_empty() && !u.is_empty())
                .ok_or_else(|| Error::Config(format!("malformed auth token entry: {:?}", pair)))?;
            tokens.insert(token.to_string(), user_id.to_string());
        }
        Ok(Self { tokens })
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.tokens.values().map(String::as_str)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl AuthProvider for TokenAuth {
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>> {
        Ok(bearer_token(headers)
            .and_then(|token| self.tokens.get(token))
            .map(|id| User { id: id.clone() }))
    }
}
