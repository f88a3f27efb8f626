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

//! Damage fines.
//!
//! A fine is assessed exactly once, at return or refund-inspection time, from
//! the kit's component catalog values. It is never recomputed; a fresh
//! assessment would be a new fine. Overdue is derived at read time by
//! [`effective_status`] from the stored due date, consistent with the rest of
//! the engine avoiding background timers.

use crate::base::{FineId, OwnerId, RentalId, TxId};
use crate::inventory::DamageLine;
use crate::money::Amount;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored fine status. `Overdue` exists only as a derived view, see
/// [`effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FineStatus {
    Pending,
    Paid,
}

/// Fine status as observed by readers, with overdueness applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveFineStatus {
    Pending,
    Overdue,
    Paid,
}

/// A damage fine assessed against a rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fine {
    pub id: FineId,
    pub rental: RentalId,
    pub payer: OwnerId,
    /// Damage lines fixed at assessment time, catalog values included.
    pub assessment: Vec<DamageLine>,
    /// Sum of `count × unit_value` over the assessment.
    pub total: Amount,
    pub due: NaiveDate,
    pub status: FineStatus,
    /// The fine-payment transaction, once paid.
    pub payment_tx: Option<TxId>,
}

/// Derives the observable status: a pending fine past its due date is
/// overdue. Pure function of `(fine, today)`; nothing is mutated or scheduled.
pub fn effective_status(fine: &Fine, today: NaiveDate) -> EffectiveFineStatus {
    match fine.status {
        FineStatus::Paid => EffectiveFineStatus::Paid,
        FineStatus::Pending if today > fine.due => EffectiveFineStatus::Overdue,
        FineStatus::Pending => EffectiveFineStatus::Pending,
    }
}
