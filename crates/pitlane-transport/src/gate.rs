//! Role-based access gate for protected channels

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use subtle::ConstantTimeEq;
use thiserror::Error;

/// Staff roles holding a shared secret
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Receptionist,
    Observer,
    Safety,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Receptionist => "receptionist",
            Role::Observer => "observer",
            Role::Safety => "safety",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receptionist" => Ok(Role::Receptionist),
            "observer" => Ok(Role::Observer),
            "safety" => Ok(Role::Safety),
            other => Err(GateError::InvalidRole(other.to_string())),
        }
    }
}

/// Gate errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid access key")]
    InvalidKey,

    #[error("Role {role} may not open {channel}")]
    Forbidden { role: Role, channel: &'static str },
}

/// One shared secret per role
#[derive(Clone, PartialEq, Eq)]
pub struct RoleKeys {
    pub receptionist: String,
    pub observer: String,
    pub safety: String,
}

impl RoleKeys {
    pub fn key_for(&self, role: Role) -> &str {
        match role {
            Role::Receptionist => &self.receptionist,
            Role::Observer => &self.observer,
            Role::Safety => &self.safety,
        }
    }

    /// Compare `key` with the role's secret in constant time
    pub fn matches(&self, role: Role, key: &str) -> bool {
        key.as_bytes().ct_eq(self.key_for(role).as_bytes()).into()
    }
}

// Secrets stay out of logs
impl fmt::Debug for RoleKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleKeys").finish_non_exhaustive()
    }
}

/// Checks role credentials, slowing down wrong guesses
#[derive(Clone, Debug)]
pub struct AccessGate {
    keys: RoleKeys,
    failure_delay: Duration,
}

impl AccessGate {
    pub fn new(keys: RoleKeys, failure_delay: Duration) -> Self {
        AccessGate {
            keys,
            failure_delay,
        }
    }

    /// Verify a role and its key.
    ///
    /// A wrong key is reported only after `failure_delay`.
    pub async fn verify(&self, role: Option<&str>, key: Option<&str>) -> Result<Role, GateError> {
        let (Some(role), Some(key)) = (role, key) else {
            return Err(GateError::MissingCredentials);
        };
        if role.is_empty() || key.is_empty() {
            return Err(GateError::MissingCredentials);
        }
        let role: Role = role.parse()?;

        if self.keys.matches(role, key) {
            tracing::debug!(role = %role, "credentials accepted");
            Ok(role)
        } else {
            tokio::time::sleep(self.failure_delay).await;
            tracing::warn!(role = %role, "authentication failed");
            Err(GateError::InvalidKey)
        }
    }

    /// Admit a connection to a channel that needs `required` (if anything).
    /// Returns the verified role, or `None` for public channels.
    pub async fn admit(
        &self,
        channel: &'static str,
        required: Option<Role>,
        role: Option<&str>,
        key: Option<&str>,
    ) -> Result<Option<Role>, GateError> {
        let Some(required) = required else {
            return Ok(None);
        };
        let role = self.verify(role, key).await?;
        if role != required {
            tracing::warn!(role = %role, channel, "role not allowed on channel");
            return Err(GateError::Forbidden { role, channel });
        }
        Ok(Some(role))
    }
}
