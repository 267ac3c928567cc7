//! Role policy.
//!
//! Pure decisions over (actor, resource ownership). Nothing here touches the
//! database; callers load the resource first and ask whether the actor may act on it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{auth::AuthUser, models::User};

/// Role
///
/// Declaration order is privilege order, so the derived `Ord` gives
/// `User < Admin < Superadmin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Admins and superadmins: the roles allowed to moderate and to act on
    /// resources they do not own.
    pub fn is_moderator(&self) -> bool {
        *self >= Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

// Used by `#[sqlx(try_from = "String")]` when decoding rows.
impl TryFrom<String> for Role {
    type Error = ParseRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// PolicyError
///
/// Why an actor was denied. Rendered as 403 by the HTTP layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("admin or superadmin role required")]
    ModeratorRequired,

    #[error("only the owner or an admin may modify this resource")]
    NotOwner,

    #[error("only a superadmin may change user roles")]
    SuperadminRequired,

    #[error("you cannot change your own role")]
    SelfRoleChange,

    #[error("admin cannot delete a superadmin")]
    SuperadminProtected,

    #[error("user does not have permission to perform this action")]
    Denied,
}

pub fn ensure_moderator(actor: &AuthUser) -> Result<(), PolicyError> {
    if actor.role.is_moderator() {
        Ok(())
    } else {
        Err(PolicyError::ModeratorRequired)
    }
}

/// ensure_can_modify
///
/// The owner-or-moderator rule shared by posts, categories, reviews and orders.
/// `owner_id` is `None` for resources whose creator no longer exists.
pub fn ensure_can_modify(actor: &AuthUser, owner_id: Option<i64>) -> Result<(), PolicyError> {
    if actor.role.is_moderator() || owner_id == Some(actor.id) {
        Ok(())
    } else {
        Err(PolicyError::NotOwner)
    }
}

pub fn ensure_can_view_user(actor: &AuthUser, target_id: i64) -> Result<(), PolicyError> {
    if actor.id == target_id || actor.role.is_moderator() {
        Ok(())
    } else {
        Err(PolicyError::Denied)
    }
}

/// ensure_can_change_role
///
/// Every promotion and demotion is superadmin-only. Nobody changes their own role.
pub fn ensure_can_change_role(actor: &AuthUser, target: &User) -> Result<(), PolicyError> {
    if actor.role != Role::Superadmin {
        return Err(PolicyError::SuperadminRequired);
    }
    if actor.id == target.id {
        return Err(PolicyError::SelfRoleChange);
    }
    Ok(())
}

/// ensure_can_delete_user
///
/// Anyone may close their own account. Superadmins may delete anyone; admins may
/// delete anyone except a superadmin.
pub fn ensure_can_delete_user(actor: &AuthUser, target: &User) -> Result<(), PolicyError> {
    if actor.id == target.id {
        return Ok(());
    }
    match actor.role {
        Role::Superadmin => Ok(()),
        Role::Admin if target.role == Role::Superadmin => Err(PolicyError::SuperadminProtected),
        Role::Admin => Ok(()),
        Role::User => Err(PolicyError::Denied),
    }
}
