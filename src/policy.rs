use serde::Serialize;
use uuid::Uuid;

/// The authenticated actor behind a request: a projection of a User record,
/// derived from a validated token. Never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub is_superuser: bool,
    pub is_active: bool,
}

/// Everything a handler may ask to do, with just enough of the target to
/// decide. Item operations carry the owner so the decision stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListUsers,
    CreateUser,
    ReadUser { target: Uuid },
    UpdateProfile { target: Uuid },
    ChangePassword { target: Uuid },
    AdminUpdateUser { target: Uuid },
    DeleteUser { target: Uuid },
    ListAllItems,
    ListOwnItems,
    CreateItem,
    ReadItem { owner_id: Uuid },
    UpdateItem { owner_id: Uuid },
    DeleteItem { owner_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    InactiveUser,
    InsufficientPrivilege,
    NotOwner,
    SelfDeleteForbidden,
}

impl DenyReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::InactiveUser => "inactive user",
            DenyReason::InsufficientPrivilege => "the user doesn't have enough privileges",
            DenyReason::NotOwner => "not enough permissions",
            DenyReason::SelfDeleteForbidden => "super users are not allowed to delete themselves",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Single decision table for every role/ownership branch in the service.
///
/// - No IO
/// - No panics
///
/// Registration and login carry no principal and are the only entry points
/// that do not pass through here; every other user/item entry point must.
pub fn decide(principal: &Principal, op: &Operation) -> Decision {
    use Operation::*;

    if !principal.is_active {
        return Decision::Deny(DenyReason::InactiveUser);
    }

    if principal.is_superuser {
        return match op {
            DeleteUser { target } if *target == principal.id => {
                Decision::Deny(DenyReason::SelfDeleteForbidden)
            }
            _ => Decision::Allow,
        };
    }

    match op {
        ListUsers | CreateUser | AdminUpdateUser { .. } | ListAllItems => {
            Decision::Deny(DenyReason::InsufficientPrivilege)
        }
        ReadUser { target }
        | UpdateProfile { target }
        | ChangePassword { target }
        | DeleteUser { target } => {
            if *target == principal.id {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::InsufficientPrivilege)
            }
        }
        ListOwnItems | CreateItem => Decision::Allow,
        ReadItem { owner_id } | UpdateItem { owner_id } | DeleteItem { owner_id } => {
            if *owner_id == principal.id {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        }
    }
}

/// Convenience for call sites that gate with `?`.
pub fn authorize(principal: &Principal, op: &Operation) -> Result<(), DenyReason> {
    match decide(principal, op) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => Err(reason),
    }
}
