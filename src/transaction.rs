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

//! Ledger transaction records.
//!
//! A [`Transaction`] is immutable once settled. The ledger settles each one
//! to `Completed` or `Failed` inside the same operation that mutates its
//! source entity; no transaction is ever observable as `Pending` from
//! outside, and none is ever updated or deleted afterwards.

use crate::base::{FineId, OwnerId, RefundId, RentalId, TxId};
use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Balance-affecting event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    /// Debit charged when a rental is approved.
    RentalPayment,
    /// Credit from an approved refund or a cancelled rental.
    Refund,
    /// Debit charged when a fine is paid.
    FinePayment,
    /// Top-up credit into a wallet.
    Deposit,
}

impl TxKind {
    /// Whether amounts of this kind must be negative (debits) or positive.
    pub fn is_debit(self) -> bool {
        matches!(self, TxKind::RentalPayment | TxKind::FinePayment)
    }
}

/// Settlement status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

/// Reference to the entity a transaction originated from.
///
/// Every transaction references exactly one source entity, except deposits
/// which reference none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxRef {
    Rental(RentalId),
    Refund(RefundId),
    Fine(FineId),
    None,
}

/// One immutable entry in the wallet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub owner: OwnerId,
    pub kind: TxKind,
    /// Signed amount; negative is a debit.
    pub amount: Amount,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
    pub reference: TxRef,
}

/// Filter for [`transactions`](crate::Engine::transactions) listings.
///
/// All fields are optional; an empty filter matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxFilter {
    pub kind: Option<TxKind>,
    pub status: Option<TxStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TxFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.kind.is_some_and(|k| k != tx.kind) {
            return false;
        }
        if self.status.is_some_and(|s| s != tx.status) {
            return false;
        }
        if self.since.is_some_and(|t| tx.created_at < t) {
            return false;
        }
        if self.until.is_some_and(|t| tx.created_at > t) {
            return false;
        }
        true
    }
}
