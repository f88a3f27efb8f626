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

//! Rental requests and their state machine.
//!
//! Status transitions:
//!
//! ```text
//! PendingApproval ──approve──► Approved ──activate──► Active ──return──► Returned
//!        │                        │
//!        └──reject──► Rejected    └──cancel──► Cancelled
//! ```
//!
//! Overdue is not a stored state: an `Active` rental whose period has elapsed
//! is overdue as computed by [`is_overdue`] at read time. Terminal requests
//! are retained for audit and never deleted.

use crate::base::{KitId, OwnerId, RentalId, TxId};
use crate::money::Amount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Half-open calendar date range `[start, end)` of a rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RentalPeriod {
    /// Number of rental days; positive iff the period is valid.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Whether two periods share at least one day.
    pub fn overlaps(&self, other: &RentalPeriod) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Status of a rental request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalStatus {
    /// Requested and awaiting staff review.
    PendingApproval,
    /// Approved and charged; kit not yet handed over.
    Approved,
    /// Kit physically handed over.
    Active,
    /// Kit returned; terminal.
    Returned,
    /// Rejected at review, or auto-rejected on a failed charge; terminal.
    Rejected,
    /// Cancelled before activation; terminal.
    Cancelled,
}

impl RentalStatus {
    /// Static label for diagnostics and state-transition errors.
    pub fn label(self) -> &'static str {
        match self {
            RentalStatus::PendingApproval => "PendingApproval",
            RentalStatus::Approved => "Approved",
            RentalStatus::Active => "Active",
            RentalStatus::Returned => "Returned",
            RentalStatus::Rejected => "Rejected",
            RentalStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RentalStatus::Returned | RentalStatus::Rejected | RentalStatus::Cancelled
        )
    }
}

/// One kit rental from request through return.
///
/// Mutated only through the engine's state-transition operations; no field is
/// written from outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRequest {
    pub id: RentalId,
    pub requester: OwnerId,
    pub kit: KitId,
    pub period: RentalPeriod,
    /// Daily price times rental days, fixed at creation.
    pub total_cost: Amount,
    pub purpose: String,
    pub status: RentalStatus,
    pub approver: Option<OwnerId>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Reason recorded on rejection.
    pub rejection_reason: Option<String>,
    /// The rental-payment transaction, once charged.
    pub payment_tx: Option<TxId>,
}

/// An `Active` rental is overdue once `today` passes its period end.
///
/// Pure predicate; any read path may compute and surface it. There is no
/// scheduler and no stored overdue flag.
pub fn is_overdue(request: &RentalRequest, today: NaiveDate) -> bool {
    request.status == RentalStatus::Active && today > request.period.end
}
