//! Request-scoped caller identity

use serde::Serialize;

use crate::domain::aggregates::order::Order;

const STAFF_ROLES: [&str; 2] = ["admin", "employee"];

/// The authenticated caller, resolved per request and passed explicitly into
/// every service call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub roles: Vec<String>,
}

impl CurrentUser {
    pub fn new(id: i64, email: impl Into<String>) -> Self { Self { id, email: email.into(), roles: vec![] } }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_staff(&self) -> bool { self.roles.iter().any(|r| STAFF_ROLES.contains(&r.as_str())) }

    pub fn can_access(&self, order: &Order) -> bool { self.is_staff() || order.user_id() == self.id }
}
