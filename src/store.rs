// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory customer/account store backing the main API.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Account, AccountType, Customer, CustomerStatus, NewAccountRequest, NewAccountResponse,
    TransactionRequest, TransactionResponse, TransactionType, MIN_OPENING_DEPOSIT,
};

#[derive(Default)]
pub struct InMemoryStore {
    customers: BTreeMap<String, Customer>,
    accounts: HashMap<String, Account>,
    transactions: HashMap<String, TransactionResponse>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a few demo customers.
    pub fn with_demo_data() -> Self {
        let mut store = Self::new();
        for (id, name, city, zipcode, dob, status) in [
            ("42", "Alice Martins", "Lisbon", "1000-001", "1990-04-12", CustomerStatus::Active),
            ("43", "Bruno Costa", "Porto", "4000-007", "1985-11-02", CustomerStatus::Active),
            ("44", "Carla Sousa", "Braga", "4700-100", "1979-06-30", CustomerStatus::Inactive),
        ] {
            store.insert_customer(Customer {
                customer_id: id.to_string(),
                name: name.to_string(),
                city: city.to_string(),
                zipcode: zipcode.to_string(),
                date_of_birth: dob.to_string(),
                status,
            });
        }
        store
    }

    pub fn insert_customer(&mut self, customer: Customer) {
        self.customers.insert(customer.customer_id.clone(), customer);
    }

    pub fn list_customers(&self, status: Option<CustomerStatus>) -> Vec<Customer> {
        self.customers
            .values()
            .filter(|customer| status.is_none_or(|s| customer.status == s))
            .cloned()
            .collect()
    }

    pub fn customer(&self, customer_id: &str) -> Result<Customer, ApiError> {
        self.customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Customer not found"))
    }

    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn open_account(
        &mut self,
        customer_id: &str,
        request: NewAccountRequest,
    ) -> Result<NewAccountResponse, ApiError> {
        if request.amount < MIN_OPENING_DEPOSIT {
            return Err(ApiError::unprocessable(
                "Initial deposit must be at least 5000.00",
            ));
        }
        let account_type = AccountType::parse(&request.account_type).ok_or_else(|| {
            ApiError::unprocessable("Account type must be 'saving' or 'checking'")
        })?;
        self.customer(customer_id)?;

        let account = Account {
            account_id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            opening_date: Utc::now().to_rfc3339(),
            account_type,
            amount: request.amount,
        };
        let response = NewAccountResponse {
            account_id: account.account_id.clone(),
        };
        self.accounts.insert(account.account_id.clone(), account);
        Ok(response)
    }

    /// Apply a deposit or withdrawal to an account owned by `customer_id`.
    pub fn make_transaction(
        &mut self,
        customer_id: &str,
        account_id: &str,
        request: TransactionRequest,
    ) -> Result<TransactionResponse, ApiError> {
        if request.amount <= 0.0 || !request.amount.is_finite() {
            return Err(ApiError::unprocessable("Amount must be greater than zero"));
        }
        let transaction_type = TransactionType::parse(&request.transaction_type).ok_or_else(|| {
            ApiError::unprocessable("Transaction type must be 'deposit' or 'withdrawal'")
        })?;

        let account = self
            .accounts
            .get_mut(account_id)
            .filter(|account| account.customer_id == customer_id)
            .ok_or_else(|| ApiError::not_found("Account not found"))?;

        match transaction_type {
            TransactionType::Withdrawal => {
                if !account.can_withdraw(request.amount) {
                    return Err(ApiError::unprocessable("Insufficient balance for withdrawal"));
                }
                account.amount -= request.amount;
            }
            TransactionType::Deposit => account.amount += request.amount,
        }
        let new_balance = account.amount;

        let response = TransactionResponse {
            transaction_id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            new_balance,
            transaction_type,
            transaction_date: Utc::now().to_rfc3339(),
        };
        tracing::debug!(%account_id, amount = request.amount, ?transaction_type, "transaction recorded");
        self.transactions
            .insert(response.transaction_id.clone(), response.clone());
        Ok(response)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Recorded transactions of one account, oldest first.
    pub fn account_transactions(&self, account_id: &str) -> Vec<&TransactionResponse> {
        let mut history: Vec<_> = self
            .transactions
            .values()
            .filter(|tx| tx.account_id == account_id)
            .collect();
        history.sort_by(|a, b| a.transaction_date.cmp(&b.transaction_date));
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn open(store: &mut InMemoryStore, customer_id: &str, amount: f64) -> String {
        store
            .open_account(
                customer_id,
                NewAccountRequest {
                    account_type: "saving".into(),
                    amount,
                },
            )
            .unwrap()
            .account_id
    }

    fn tx(kind: &str, amount: f64) -> TransactionRequest {
        TransactionRequest {
            transaction_type: kind.into(),
            amount,
        }
    }

    #[test]
    fn lists_customers_by_status() {
        let store = InMemoryStore::with_demo_data();
        assert_eq!(store.list_customers(None).len(), 3);
        assert_eq!(store.list_customers(Some(CustomerStatus::Active)).len(), 2);
        let inactive = store.list_customers(Some(CustomerStatus::Inactive));
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].customer_id, "44");
    }

    #[test]
    fn unknown_customer_is_404() {
        let store = InMemoryStore::with_demo_data();
        assert_eq!(store.customer("999").unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn account_opening_rules() {
        let mut store = InMemoryStore::with_demo_data();
        let low = store.open_account(
            "42",
            NewAccountRequest {
                account_type: "saving".into(),
                amount: 4999.99,
            },
        );
        assert_eq!(low.unwrap_err().status, StatusCode::UNPROCESSABLE_ENTITY);

        let bad_type = store.open_account(
            "42",
            NewAccountRequest {
                account_type: "crypto".into(),
                amount: 6000.0,
            },
        );
        assert_eq!(bad_type.unwrap_err().status, StatusCode::UNPROCESSABLE_ENTITY);

        let missing = store.open_account(
            "999",
            NewAccountRequest {
                account_type: "Checking".into(),
                amount: 6000.0,
            },
        );
        assert_eq!(missing.unwrap_err().status, StatusCode::NOT_FOUND);

        let id = open(&mut store, "42", 5000.0);
        assert_eq!(store.account(&id).unwrap().amount, 5000.0);
    }

    #[test]
    fn deposits_and_withdrawals_update_balance() {
        let mut store = InMemoryStore::with_demo_data();
        let id = open(&mut store, "42", 5000.0);

        let resp = store.make_transaction("42", &id, tx("deposit", 250.0)).unwrap();
        assert_eq!(resp.new_balance, 5250.0);

        let resp = store.make_transaction("42", &id, tx("withdrawal", 5250.0)).unwrap();
        assert_eq!(resp.new_balance, 0.0);

        let err = store.make_transaction("42", &id, tx("withdrawal", 1.0)).unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.transaction_count(), 2);

        let mut kinds: Vec<_> = store
            .account_transactions(&id)
            .iter()
            .map(|tx| tx.transaction_type)
            .collect();
        kinds.sort_by_key(|kind| *kind == TransactionType::Withdrawal);
        assert_eq!(kinds, [TransactionType::Deposit, TransactionType::Withdrawal]);
        assert!(store.account_transactions("unknown").is_empty());
    }

    #[test]
    fn transaction_validation() {
        let mut store = InMemoryStore::with_demo_data();
        let id = open(&mut store, "42", 5000.0);

        for req in [tx("deposit", 0.0), tx("deposit", -5.0), tx("transfer", 10.0)] {
            let err = store.make_transaction("42", &id, req).unwrap_err();
            assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn account_must_belong_to_path_customer() {
        let mut store = InMemoryStore::with_demo_data();
        let id = open(&mut store, "42", 5000.0);
        let err = store.make_transaction("43", &id, tx("deposit", 1.0)).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
