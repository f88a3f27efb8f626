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

//! Refund requests.
//!
//! A refund can only be raised against a rental that is `Active` or
//! `Returned`, at most one per rental. Inspection is the single transition out
//! of `Pending`: approval credits the ledger in the same operation and lands
//! on `Processed`, so a distinct approved-but-uncredited state is never
//! observable; rejection records a reason and touches no balance.

use crate::base::{RefundId, RentalId, TxId};
use crate::money::Amount;
use serde::{Deserialize, Serialize};

/// Status of a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStatus {
    /// Awaiting inspection.
    Pending,
    /// Approved and credited; terminal.
    Processed,
    /// Rejected at inspection; terminal.
    Rejected,
}

impl RefundStatus {
    pub fn label(self) -> &'static str {
        match self {
            RefundStatus::Pending => "Pending",
            RefundStatus::Processed => "Processed",
            RefundStatus::Rejected => "Rejected",
        }
    }
}

/// Decision taken at inspection time.
///
/// Approval carries the inspector-determined final amount; rejection must
/// carry a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundDecision {
    Approve { final_amount: Amount },
    Reject { reason: String },
}

/// A request to refund part or all of a rental payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: RefundId,
    pub rental: RentalId,
    /// Reason given by the requester.
    pub reason: String,
    pub status: RefundStatus,
    /// Inspector-determined amount; set on approval, never exceeds the
    /// original payment minus any linked fine.
    pub final_amount: Option<Amount>,
    /// Reason recorded on rejection.
    pub rejection_reason: Option<String>,
    /// The credit transaction, once processed.
    pub credit_tx: Option<TxId>,
}
