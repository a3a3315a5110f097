// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Customer-scope enforcement.
//!
//! Customer-scoped operations succeed only for admins or for a caller whose
//! own customer id equals the `customer_id` route parameter. A missing value
//! on either side is a denial.

use thiserror::Error;

use super::claims::{AccessClaims, UserIdentity};
use super::error::AuthError;
use super::roles::is_admin;

/// Name of the route parameter that addresses a customer record.
pub const CUSTOMER_ID_PARAM: &str = "customer_id";

/// Something that acts on behalf of (at most) one customer.
pub trait CustomerPrincipal {
    fn role(&self) -> &str;
    fn customer_id(&self) -> Option<&str>;
}

impl CustomerPrincipal for UserIdentity {
    fn role(&self) -> &str {
        &self.role
    }

    fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }
}

impl CustomerPrincipal for AccessClaims {
    fn role(&self) -> &str {
        &self.role
    }

    fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("caller is not bound to a customer")]
    NoClaimedCustomer,

    #[error("request does not name a customer")]
    NoRequestedCustomer,

    #[error("customer {requested} does not belong to caller")]
    Mismatch { requested: String },
}

impl From<OwnershipError> for AuthError {
    fn from(_: OwnershipError) -> Self {
        AuthError::Forbidden("Access denied to this customer".to_string())
    }
}

/// Check that `caller` may act on `requested_customer_id`.
pub fn verify_customer_access<P: CustomerPrincipal + ?Sized>(
    caller: &P,
    requested_customer_id: Option<&str>,
) -> Result<(), OwnershipError> {
    if is_admin(caller.role()) {
        return Ok(());
    }

    let claimed = caller
        .customer_id()
        .filter(|id| !id.is_empty())
        .ok_or(OwnershipError::NoClaimedCustomer)?;
    let requested = requested_customer_id
        .filter(|id| !id.is_empty())
        .ok_or(OwnershipError::NoRequestedCustomer)?;

    if claimed == requested {
        Ok(())
    } else {
        Err(OwnershipError::Mismatch {
            requested: requested.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(customer_id: Option<&str>) -> UserIdentity {
        UserIdentity::new("alice", "user", customer_id.map(str::to_string))
    }

    #[test]
    fn owner_passes() {
        assert!(verify_customer_access(&user(Some("42")), Some("42")).is_ok());
    }

    #[test]
    fn other_customer_is_denied() {
        assert_eq!(
            verify_customer_access(&user(Some("42")), Some("43")),
            Err(OwnershipError::Mismatch {
                requested: "43".to_string()
            })
        );
    }

    #[test]
    fn admin_is_exempt() {
        let admin = UserIdentity::new("root", "Admin", None);
        assert!(verify_customer_access(&admin, Some("42")).is_ok());
        assert!(verify_customer_access(&admin, Some("43")).is_ok());
        assert!(verify_customer_access(&admin, None).is_ok());
    }

    #[test]
    fn missing_values_fail_closed() {
        assert_eq!(
            verify_customer_access(&user(None), Some("42")),
            Err(OwnershipError::NoClaimedCustomer)
        );
        assert_eq!(
            verify_customer_access(&user(Some("")), Some("")),
            Err(OwnershipError::NoClaimedCustomer)
        );
        assert_eq!(
            verify_customer_access(&user(Some("42")), None),
            Err(OwnershipError::NoRequestedCustomer)
        );
    }

    #[test]
    fn denial_maps_to_forbidden() {
        let err: AuthError = OwnershipError::NoClaimedCustomer.into();
        assert_eq!(err.status_code().as_u16(), 403);
    }
}
