//! Who may do what with book records.
//!
//! Reading is open to every authenticated user, verified or not. Writes need
//! the administrator role.

use crate::domain::error::DomainError;
use crate::domain::user::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAction {
    List,
    View,
    Create,
    Edit,
    Delete,
}

impl BookAction {
    pub fn requires_admin(self) -> bool {
        matches!(self, BookAction::Create | BookAction::Edit | BookAction::Delete)
    }
}

impl fmt::Display for BookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookAction::List => "list",
            BookAction::View => "view",
            BookAction::Create => "create",
            BookAction::Edit => "edit",
            BookAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub fn decide(roles: &[Role], action: BookAction) -> Decision {
    if !action.requires_admin() || roles.contains(&Role::Admin) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

pub fn authorize(roles: &[Role], action: BookAction) -> Result<(), DomainError> {
    match decide(roles, action) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(DomainError::Forbidden(format!(
            "Administrator role required to {} books",
            action
        ))),
    }
}

/// Write actions a client may offer to this user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
}

impl Capabilities {
    pub fn for_roles(roles: &[Role]) -> Self {
        Self {
            create: decide(roles, BookAction::Create) == Decision::Allow,
            edit: decide(roles, BookAction::Edit) == Decision::Allow,
            delete: decide(roles, BookAction::Delete) == Decision::Allow,
        }
    }
}
