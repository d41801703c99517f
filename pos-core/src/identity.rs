//! Operator identity
//!
//! Every mutating operation runs on behalf of an actor: a clocked-in
//! employee or the admin override. Both answer the same questions so
//! call sites never branch on which one they got.

use shared::models::Employee;

pub const ADMIN_DISPLAY_NAME: &str = "Administrator";

#[derive(Debug, Clone)]
pub enum Actor {
    Employee(Employee),
    Admin,
}

impl Actor {
    pub fn display_name(&self) -> &str {
        match self {
            Actor::Employee(e) => &e.name,
            Actor::Admin => ADMIN_DISPLAY_NAME,
        }
    }

    /// Admin holds every permission implicitly.
    pub fn can(&self, permission: &str) -> bool {
        match self {
            Actor::Employee(e) => e.permissions.iter().any(|p| p == permission),
            Actor::Admin => true,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(permissions: &[&str]) -> Employee {
        Employee {
            id: "e1".into(),
            name: "Marta".into(),
            code: "1234".into(),
            role: "server".into(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn employee_permissions_are_explicit() {
        let actor = Actor::Employee(employee(&["orders.discount"]));
        assert_eq!(actor.display_name(), "Marta");
        assert!(actor.can("orders.discount"));
        assert!(!actor.can("sessions.close"));
        assert!(!actor.is_admin());
    }

    #[test]
    fn admin_can_do_everything() {
        let actor = Actor::Admin;
        assert_eq!(actor.display_name(), ADMIN_DISPLAY_NAME);
        assert!(actor.can("anything.at.all"));
        assert!(actor.is_admin());
    }
}
