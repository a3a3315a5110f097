// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roles and symbolic operation names.
//!
//! Permission lookups are keyed on [`Operation`] names rather than URL paths,
//! so the main process and the auth process agree on them without sharing a
//! route table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Built-in roles.
///
/// Credential stores may hand out other role strings; those are evaluated
/// against the permission table as plain names and are denied unless listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Bank staff, access to every operation and every customer
    Admin,
    /// Customer, limited to their own records
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Parse role from string (case-insensitive, surrounding whitespace ignored).
    pub fn from_str(s: &str) -> Option<Role> {
        match normalize_role(s).as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of a role name: trimmed and lowercased.
pub fn normalize_role(role: &str) -> String {
    role.trim().to_lowercase()
}

/// Whether `role` names the admin role, in any casing.
pub fn is_admin(role: &str) -> bool {
    Role::from_str(role) == Some(Role::Admin)
}

/// Stable symbolic name of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Operation {
    AuthLogin,
    GetAllCustomers,
    GetCustomer,
    NewAccount,
    NewTransaction,
    GetRolePermissions,
}

/// Operations reachable without a bearer token.
pub const PUBLIC_OPERATIONS: &[Operation] = &[Operation::AuthLogin];

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::AuthLogin,
        Operation::GetAllCustomers,
        Operation::GetCustomer,
        Operation::NewAccount,
        Operation::NewTransaction,
        Operation::GetRolePermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AuthLogin => "AuthLogin",
            Operation::GetAllCustomers => "GetAllCustomers",
            Operation::GetCustomer => "GetCustomer",
            Operation::NewAccount => "NewAccount",
            Operation::NewTransaction => "NewTransaction",
            Operation::GetRolePermissions => "GetRolePermissions",
        }
    }

    /// Exact (case-sensitive) lookup by name.
    pub fn from_name(name: &str) -> Option<Operation> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    pub fn is_public(&self) -> bool {
        PUBLIC_OPERATIONS.contains(self)
    }

    /// Operations addressed to a single customer's records. The caller must
    /// own the `customer_id` path parameter unless they are an admin.
    pub fn is_customer_scoped(&self) -> bool {
        matches!(
            self,
            Operation::GetCustomer | Operation::NewAccount | Operation::NewTransaction
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_parses_correctly() {
        assert_eq!(Role::from_str("admin"), Some(Role::Admin));
        assert_eq!(Role::from_str(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::from_str("User"), Some(Role::User));
        assert_eq!(Role::from_str("auditor"), None);
    }

    #[test]
    fn is_admin_ignores_case() {
        assert!(is_admin("Admin"));
        assert!(!is_admin("administrator"));
        assert!(!is_admin(""));
    }

    #[test]
    fn operation_names_are_stable() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.as_str()), Some(op));
        }
        assert_eq!(Operation::from_name("getcustomer"), None);
    }

    #[test]
    fn only_login_is_public() {
        let public: Vec<_> = Operation::ALL.into_iter().filter(Operation::is_public).collect();
        assert_eq!(public, vec![Operation::AuthLogin]);
    }

    #[test]
    fn customer_scoped_operations() {
        assert!(Operation::GetCustomer.is_customer_scoped());
        assert!(Operation::NewAccount.is_customer_scoped());
        assert!(Operation::NewTransaction.is_customer_scoped());
        assert!(!Operation::GetAllCustomers.is_customer_scoped());
        assert!(!Operation::GetRolePermissions.is_customer_scoped());
    }
}
