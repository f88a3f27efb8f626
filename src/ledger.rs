// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Append-only wallet ledger.
//!
//! The ledger is the sole source of truth for wallet balances. There is no
//! stored balance field anywhere: a balance is always the sum of the signed
//! amounts of the owner's `Completed` transactions. Transactions are never
//! updated or deleted once settled.
//!
//! # Thread Safety
//!
//! Wallets live in a [`DashMap`] so different owners settle fully in
//! parallel. Each wallet's log sits behind a [`parking_lot::Mutex`]; for
//! debits, the balance check and the append of the settled transaction happen
//! inside one critical section, so two concurrent debits against the same
//! under-funded wallet can never both succeed.

use crate::base::{OwnerId, TxId};
use crate::error::RentalError;
use crate::money::Amount;
use crate::transaction::{Transaction, TxFilter, TxKind, TxRef, TxStatus};
use chrono::Utc;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-owner transaction log.
#[derive(Debug, Default)]
struct Wallet {
    log: Mutex<Vec<Arc<Transaction>>>,
}

impl Wallet {
    /// Derived balance: sum of completed signed amounts.
    fn balance(&self) -> Amount {
        self.log
            .lock()
            .iter()
            .filter(|tx| tx.status == TxStatus::Completed)
            .map(|tx| tx.amount)
            .sum()
    }
}

/// Append-only transaction store backing every wallet balance.
#[derive(Debug)]
pub struct Ledger {
    wallets: DashMap<OwnerId, Arc<Wallet>>,
    /// All transactions by id, for audit lookups.
    by_id: DashMap<TxId, Arc<Transaction>>,
    /// Global append order, preserved for audit export.
    order: SegQueue<TxId>,
    next_id: AtomicU64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            by_id: DashMap::new(),
            order: SegQueue::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends one transaction and settles it in the same call.
    ///
    /// The sign of `amount` must match `kind`: deposits and refunds are
    /// strictly positive, rental and fine payments strictly negative.
    ///
    /// For debits the owner's balance is computed and checked inside the same
    /// critical section as the append. An under-funded debit is recorded as a
    /// `Failed` transaction (the attempt stays auditable, the balance is
    /// untouched) and the call returns [`RentalError::InsufficientFunds`].
    ///
    /// # Errors
    ///
    /// - [`RentalError::InvalidAmount`] - amount sign does not match the kind.
    /// - [`RentalError::InsufficientFunds`] - debit would take the balance
    ///   below zero.
    pub fn append_and_settle(
        &self,
        owner: OwnerId,
        kind: TxKind,
        amount: Amount,
        reference: TxRef,
    ) -> Result<Arc<Transaction>, RentalError> {
        let sign_ok = if kind.is_debit() {
            amount.is_negative()
        } else {
            amount.is_positive()
        };
        if !sign_ok {
            return Err(RentalError::InvalidAmount);
        }
        debug_assert!(
            matches!(reference, TxRef::None) == matches!(kind, TxKind::Deposit),
            "only deposits may omit a source reference"
        );

        let wallet = Arc::clone(
            self.wallets
                .entry(owner)
                .or_insert_with(|| Arc::new(Wallet::default()))
                .value(),
        );

        // Balance check and append are one critical section per owner.
        let mut log = wallet.log.lock();
        let balance: Amount = log
            .iter()
            .filter(|tx| tx.status == TxStatus::Completed)
            .map(|tx| tx.amount)
            .sum();

        let status = if kind.is_debit() && (balance + amount).is_negative() {
            TxStatus::Failed
        } else {
            TxStatus::Completed
        };

        let tx = Arc::new(Transaction {
            id: TxId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            owner,
            kind,
            amount,
            status,
            created_at: Utc::now(),
            reference,
        });
        log.push(Arc::clone(&tx));
        drop(log);

        self.by_id.insert(tx.id, Arc::clone(&tx));
        self.order.push(tx.id);

        match status {
            TxStatus::Failed => Err(RentalError::InsufficientFunds),
            _ => Ok(tx),
        }
    }

    /// Derived balance for an owner; zero for a wallet with no history.
    pub fn balance(&self, owner: OwnerId) -> Amount {
        self.wallets
            .get(&owner)
            .map(|w| w.balance())
            .unwrap_or(Amount::ZERO)
    }

    /// Lists an owner's transactions in append order, newest last.
    pub fn transactions(&self, owner: OwnerId, filter: &TxFilter) -> Vec<Arc<Transaction>> {
        match self.wallets.get(&owner) {
            Some(wallet) => wallet
                .log
                .lock()
                .iter()
                .filter(|tx| filter.matches(tx))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Looks up a single transaction by id.
    pub fn get(&self, id: TxId) -> Option<Arc<Transaction>> {
        self.by_id.get(&id).map(|tx| Arc::clone(&tx))
    }

    /// Total number of appended transactions, settled and failed.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Snapshot of every transaction in id (append) order, for reporting.
    pub fn snapshot(&self) -> Vec<Arc<Transaction>> {
        let mut all: Vec<_> = self.by_id.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by_key(|tx| tx.id.0);
        all
    }

    /// Drains the global append-order journal, e.g. for a batch audit export.
    ///
    /// Consuming: a second call returns only transactions appended since the
    /// first. The per-owner logs and id lookups are unaffected.
    pub fn drain_audit(&self) -> Vec<Arc<Transaction>> {
        let mut out = Vec::new();
        while let Some(id) = self.order.pop() {
            if let Some(tx) = self.by_id.get(&id) {
                out.push(Arc::clone(&tx));
            }
        }
        out
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
