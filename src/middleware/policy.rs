//! Capability table: every (resource, action) pair maps to the access level
//! a caller needs. Handlers evaluate it once, before touching the database
//! for mutations or right after loading the owning record for reads.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Category,
    Cart,
    Order,
    Payment,
    Feedback,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    ListAll,
    Retrieve,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Owner,
    OwnerOrStaff,
    Staff,
}

const CAPABILITIES: &[(Resource, Action, Access)] = &[
    (Resource::Category, Action::List, Access::Public),
    (Resource::Category, Action::Retrieve, Access::Public),
    (Resource::Category, Action::Create, Access::Staff),
    (Resource::Category, Action::Update, Access::Staff),
    (Resource::Category, Action::Delete, Access::Staff),
    (Resource::Cart, Action::List, Access::Authenticated),
    (Resource::Cart, Action::Create, Access::Authenticated),
    (Resource::Cart, Action::Update, Access::Owner),
    (Resource::Cart, Action::Delete, Access::Owner),
    (Resource::Order, Action::List, Access::Authenticated),
    (Resource::Order, Action::ListAll, Access::Staff),
    (Resource::Order, Action::Retrieve, Access::OwnerOrStaff),
    (Resource::Order, Action::Create, Access::Authenticated),
    (Resource::Order, Action::Update, Access::Staff),
    (Resource::Order, Action::Delete, Access::Staff),
    (Resource::Payment, Action::List, Access::Staff),
    (Resource::Payment, Action::Retrieve, Access::Staff),
    (Resource::Payment, Action::Create, Access::Owner),
    (Resource::Payment, Action::Update, Access::Staff),
    (Resource::Payment, Action::Delete, Access::Staff),
    (Resource::Feedback, Action::List, Access::Public),
    (Resource::Feedback, Action::ListAll, Access::Staff),
    (Resource::Feedback, Action::Retrieve, Access::OwnerOrStaff),
    (Resource::Feedback, Action::Create, Access::Owner),
    (Resource::Feedback, Action::Update, Access::Owner),
    (Resource::Profile, Action::Retrieve, Access::Authenticated),
    (Resource::Profile, Action::Update, Access::Authenticated),
];

/// Pairs missing from the table are staff-only.
pub fn required_access(resource: Resource, action: Action) -> Access {
    CAPABILITIES
        .iter()
        .find(|(r, a, _)| *r == resource && *a == action)
        .map(|(_, _, access)| *access)
        .unwrap_or(Access::Staff)
}

/// `owner` is the user owning the targeted record, when there is one.
pub fn authorize(
    user: Option<&AuthUser>,
    resource: Resource,
    action: Action,
    owner: Option<Uuid>,
) -> AppResult<()> {
    let access = required_access(resource, action);
    if access == Access::Public {
        return Ok(());
    }

    let user = user.ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".into())
    })?;
    let is_owner = owner.is_some_and(|id| id == user.user_id);

    let allowed = match access {
        Access::Public | Access::Authenticated => true,
        Access::Owner => is_owner,
        Access::OwnerOrStaff => is_owner || user.is_staff(),
        Access::Staff => user.is_staff(),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}
