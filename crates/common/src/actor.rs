//! Resolved caller identity handed down by the auth layer.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role assigned to an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An authenticated caller: user identity plus role.
///
/// Produced by the upstream auth middleware; the services never look at
/// credentials, only at this resolved pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    /// Creates a customer actor.
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    /// Creates an administrator actor.
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Returns true if the actor holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_roundtrip() {
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn admin_check() {
        let user = UserId::new();
        assert!(Actor::admin(user).is_admin());
        assert!(!Actor::customer(user).is_admin());
    }
}
