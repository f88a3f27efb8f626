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

//! Error types for rental, refund, fine, and ledger operations.
//!
//! Every variant is recoverable by the caller: a failing operation leaves all
//! entities (kit quantity, ledger balance, request status) exactly as they
//! were before the call. The engine never formats user-facing text; the
//! display strings here are for logs and diagnostics.

use thiserror::Error;

/// Errors returned by the engine's public operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RentalError {
    /// A debit would take the owner's derived balance below zero
    #[error("insufficient wallet funds")]
    InsufficientFunds,

    /// The kit has no available quantity left to reserve
    #[error("kit has no available quantity")]
    KitUnavailable,

    /// Rental period end is not strictly after its start
    #[error("rental period end must be after start")]
    InvalidDateRange,

    /// The entity is not in a state that permits the attempted transition.
    ///
    /// The loser of two racing transitions on the same entity observes this:
    /// by the time it reads the state, the state is already stale.
    #[error("illegal state transition from {from}")]
    InvalidStateTransition {
        /// Status the entity was actually in, as a static label.
        from: &'static str,
    },

    /// A refund or fine was requested against an ineligible rental
    #[error("source rental is not eligible")]
    InvalidSourceState,

    /// Approved refund amount exceeds original payment minus linked fines
    #[error("refund amount exceeds refundable cap")]
    RefundExceedsCap,

    /// Amount sign or magnitude does not match the transaction kind
    #[error("invalid amount for transaction kind")]
    InvalidAmount,

    /// Referenced entity does not exist
    #[error("entity not found")]
    NotFound,
}
