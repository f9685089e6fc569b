//! Per-channel authorization.
//!
//! The HTTP channel is protected by an optional shared secret compared
//! against the `x-api-key` header. The chat channel is protected by an
//! optional allow-list of chat ids. An unset policy means open access.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{GatewayError, Result};

/// Request source, each with its own authorization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Http,
    Chat,
}

/// The identity presented on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// Value of the API key header, if the request carried one.
    ApiKey(Option<&'a str>),
    /// Chat id the command came from.
    ChatId(i64),
}

impl Credential<'_> {
    pub fn channel(&self) -> Channel {
        match self {
            Self::ApiKey(_) => Channel::Http,
            Self::ChatId(_) => Channel::Chat,
        }
    }
}

/// Static access configuration for both channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Shared secret for HTTP requests. `None` leaves HTTP open.
    pub api_key: Option<String>,
    /// Permitted chat ids. `None` leaves chat open; an empty set denies all.
    pub allowed_chats: Option<HashSet<i64>>,
}

impl AccessPolicy {
    /// Builds a policy from the raw setting values.
    pub fn from_settings(api_key: Option<&str>, allowed_chats: Option<&str>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(String::from),
            allowed_chats: allowed_chats.and_then(parse_allow_list),
        }
    }
}

/// Parses a comma-separated list of chat ids.
///
/// Returns `None` when the value is blank (no restriction). Entries that do
/// not parse as integers are skipped with a warning; if none survive, the
/// result is an empty set, which denies every chat.
pub fn parse_allow_list(raw: &str) -> Option<HashSet<i64>> {
    if raw.trim().is_empty() {
        return None;
    }

    let mut ids = HashSet::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<i64>() {
            Ok(id) => {
                ids.insert(id);
            }
            Err(_) => warn!(entry, "Ignoring invalid chat id in allow-list"),
        }
    }

    if ids.is_empty() {
        warn!("Chat allow-list contains no valid ids; all chats will be denied");
    }
    Some(ids)
}

/// Authorizes requests against an [`AccessPolicy`].
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    policy: AccessPolicy,
}

impl AccessGate {
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Allows or denies a request.
    ///
    /// Denial on HTTP is [`GatewayError::Unauthorized`]; on chat it is
    /// [`GatewayError::AccessDenied`].
    pub fn authorize(&self, credential: Credential<'_>) -> Result<()> {
        match credential {
            Credential::ApiKey(presented) => match &self.policy.api_key {
                Some(secret) if presented != Some(secret.as_str()) => {
                    Err(GatewayError::Unauthorized)
                }
                _ => Ok(()),
            },
            Credential::ChatId(id) => match &self.policy.allowed_chats {
                Some(allowed) if !allowed.contains(&id) => Err(GatewayError::AccessDenied),
                _ => Ok(()),
            },
        }
    }
}
