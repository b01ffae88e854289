//! Authorization capability checks, applied uniformly by the services.

use common::{Actor, Role, UserId};

use crate::{CheckoutError, Result};

/// Requires the actor to hold `role`. Admins satisfy every role.
pub fn require_role(actor: Actor, role: Role) -> Result<()> {
    if actor.role == role || actor.is_admin() {
        Ok(())
    } else {
        Err(CheckoutError::Forbidden(format!(
            "operation requires {role} role"
        )))
    }
}

/// Requires the actor to be the owning customer or an administrator.
pub fn require_owner_or_admin(actor: Actor, owner: UserId) -> Result<()> {
    if actor.is_admin() || actor.user_id == owner {
        Ok(())
    } else {
        Err(CheckoutError::Forbidden(
            "order belongs to another customer".to_string(),
        ))
    }
}
