// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role to operation permission policy.
//!
//! The table is built once at startup and shared read-only between requests.
//! Role keys are normalized (trimmed, lowercased); operation names are matched
//! exactly.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use super::roles::{is_admin, normalize_role, Operation, Role};

/// role -> allowed operation names
pub type PermissionTable = HashMap<String, HashSet<String>>;

/// Default admin permissions: every protected operation.
pub const DEFAULT_ADMIN_OPERATIONS: &[Operation] = &[
    Operation::GetAllCustomers,
    Operation::GetCustomer,
    Operation::NewAccount,
    Operation::NewTransaction,
    Operation::GetRolePermissions,
];

/// Default customer permissions.
pub const DEFAULT_USER_OPERATIONS: &[Operation] =
    &[Operation::GetCustomer, Operation::NewTransaction];

pub fn default_table() -> PermissionTable {
    let mut table = PermissionTable::new();
    for (role, ops) in [
        (Role::Admin, DEFAULT_ADMIN_OPERATIONS),
        (Role::User, DEFAULT_USER_OPERATIONS),
    ] {
        table.insert(
            role.as_str().to_string(),
            ops.iter().map(|op| op.as_str().to_string()).collect(),
        );
    }
    table
}

fn fallback_table() -> &'static PermissionTable {
    static FALLBACK: OnceLock<PermissionTable> = OnceLock::new();
    FALLBACK.get_or_init(|| {
        tracing::warn!("permission table is empty, falling back to default policy");
        default_table()
    })
}

/// Immutable permission policy handed to the auth service and the middleware.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    table: Arc<PermissionTable>,
    admin_bypass: bool,
}

impl PermissionPolicy {
    /// Build a policy from an explicit table.
    ///
    /// With `admin_bypass` set, the admin role is authorized for any
    /// operation even when the table does not list it.
    pub fn new(table: PermissionTable, admin_bypass: bool) -> Self {
        let table = table
            .into_iter()
            .map(|(role, ops)| (normalize_role(&role), ops))
            .collect();
        Self {
            table: Arc::new(table),
            admin_bypass,
        }
    }

    pub fn with_defaults(admin_bypass: bool) -> Self {
        Self::new(default_table(), admin_bypass)
    }

    pub fn admin_bypass(&self) -> bool {
        self.admin_bypass
    }

    fn table(&self) -> &PermissionTable {
        if self.table.is_empty() {
            fallback_table()
        } else {
            &self.table
        }
    }

    /// Whether `role` may perform the operation named `route_name`.
    pub fn is_authorized_for(&self, role: &str, route_name: &str) -> bool {
        let role = normalize_role(role);
        let listed = self
            .table()
            .get(&role)
            .is_some_and(|ops| ops.contains(route_name));

        listed || (self.admin_bypass && is_admin(&role))
    }

    /// Union of all operations across roles, sorted and de-duplicated.
    pub fn all_permissions(&self) -> BTreeSet<String> {
        self.table().values().flatten().cloned().collect()
    }

    /// Whether `route_name` is customer-scoped and therefore subject to the
    /// ownership check.
    pub fn requires_ownership(&self, route_name: &str) -> bool {
        Operation::from_name(route_name).is_some_and(|op| op.is_customer_scoped())
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::with_defaults(true)
    }
}
