// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures of the customer/account API. All types
//! derive `Serialize`, `Deserialize`, and `ToSchema` for JSON handling and
//! OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Customers**: read-only customer records with an active/inactive status
//! - **Accounts**: saving/checking accounts opened with an initial deposit
//! - **Transactions**: deposits and withdrawals against an account

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Smallest opening deposit accepted for a new account.
pub const MIN_OPENING_DEPOSIT: f64 = 5000.0;

// =============================================================================
// Customer Models
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
}

impl CustomerStatus {
    /// Parse a status filter value. Anything else means "no filter".
    pub fn from_filter(value: &str) -> Option<Self> {
        match value {
            "active" => Some(CustomerStatus::Active),
            "inactive" => Some(CustomerStatus::Inactive),
            _ => None,
        }
    }
}

/// A bank customer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub city: String,
    pub zipcode: String,
    /// ISO date (`YYYY-MM-DD`)
    pub date_of_birth: String,
    pub status: CustomerStatus,
}

/// Query parameters of `GET /customers`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CustomerQuery {
    /// `active` or `inactive`; other values list everyone.
    pub status: Option<String>,
}

// =============================================================================
// Account Models
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Saving,
    Checking,
}

impl AccountType {
    /// Case-insensitive parse.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "saving" => Some(AccountType::Saving),
            "checking" => Some(AccountType::Checking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Account {
    pub account_id: String,
    pub customer_id: String,
    /// Opening timestamp, RFC 3339
    pub opening_date: String,
    pub account_type: AccountType,
    pub amount: f64,
}

impl Account {
    pub fn can_withdraw(&self, amount: f64) -> bool {
        self.amount >= amount
    }
}

/// Body of `POST /customers/{customer_id}/account`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewAccountRequest {
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NewAccountResponse {
    pub account_id: String,
}

// =============================================================================
// Transaction Models
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }
}

/// Body of `POST /customers/{customer_id}/account/{account_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub account_id: String,
    pub new_balance: f64,
    pub transaction_type: TransactionType,
    /// RFC 3339
    pub transaction_date: String,
}

// =============================================================================
// Permission Models
// =============================================================================

/// Response of `GET /permissions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PermissionsResponse {
    /// Every operation granted to at least one role, sorted.
    pub permissions: Vec<String>,
}
