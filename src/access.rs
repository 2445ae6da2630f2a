//! Access policy for privileged commands.
//!
//! A request is authorized when any of these holds:
//! - it arrived through the trusted relay (token matches exactly)
//! - the caller identity is allow-listed
//! - the caller holds at least one allow-listed role

use crate::config::AccessConfig;

/// Who is asking. Evaluated once per inbound request and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessClaim {
    pub caller: String,
    pub roles: Vec<String>,
    pub relay_token: Option<String>,
}

impl AccessClaim {
    pub fn user(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            ..Self::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn relayed(mut self, token: impl Into<String>) -> Self {
        self.relay_token = Some(token.into());
        self
    }
}

pub trait AccessPolicy: Send + Sync {
    /// Pure decision; must not touch any resource.
    fn is_authorized(&self, claim: &AccessClaim) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct AllowListPolicy {
    users: Vec<String>,
    roles: Vec<String>,
    relay_token: Option<String>,
}

impl AllowListPolicy {
    pub fn new(users: Vec<String>, roles: Vec<String>, relay_token: Option<String>) -> Self {
        Self {
            users,
            roles,
            relay_token: relay_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(
            config.allowed_users.clone(),
            config.allowed_roles.clone(),
            config.relay_token.clone(),
        )
    }

    /// True when nothing at all is allowed.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty() && self.relay_token.is_none()
    }
}

impl AccessPolicy for AllowListPolicy {
    fn is_authorized(&self, claim: &AccessClaim) -> bool {
        if let (Some(expected), Some(given)) = (&self.relay_token, &claim.relay_token) {
            if expected == given {
                return true;
            }
        }
        if self.users.iter().any(|u| *u == claim.caller) {
            return true;
        }
        claim.roles.iter().any(|r| self.roles.contains(r))
    }
}
