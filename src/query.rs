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

//! Read-only reporting over the engine's stores.
//!
//! Pure projections for dashboards and exports: listing with filters, overdue
//! views, and balance/revenue aggregation. Nothing here mutates state, which
//! keeps the write-side invariants verifiable on their own.

use crate::base::{KitId, OwnerId, RentalId};
use crate::engine::Engine;
use crate::fine::{EffectiveFineStatus, Fine, effective_status};
use crate::money::Amount;
use crate::refund::{RefundRequest, RefundStatus};
use crate::rental::{RentalPeriod, RentalRequest, RentalStatus, is_overdue};
use crate::transaction::{TxKind, TxStatus};
use chrono::NaiveDate;
use serde::Serialize;

/// Filter for rental listings. Empty matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct RentalFilter {
    pub requester: Option<OwnerId>,
    pub kit: Option<KitId>,
    pub status: Option<RentalStatus>,
    /// Only rentals whose period shares at least one day with this range.
    pub overlaps: Option<RentalPeriod>,
}

impl RentalFilter {
    fn matches(&self, request: &RentalRequest) -> bool {
        if self.requester.is_some_and(|r| r != request.requester) {
            return false;
        }
        if self.kit.is_some_and(|k| k != request.kit) {
            return false;
        }
        if self.status.is_some_and(|s| s != request.status) {
            return false;
        }
        if let Some(range) = &self.overlaps {
            if !request.period.overlaps(range) {
                return false;
            }
        }
        true
    }
}

/// Filter for refund listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefundFilter {
    pub rental: Option<RentalId>,
    pub status: Option<RefundStatus>,
}

/// Filter for fine listings. Status is matched against the derived
/// (overdue-aware) view.
#[derive(Debug, Clone, Copy, Default)]
pub struct FineFilter {
    pub payer: Option<OwnerId>,
    pub status: Option<EffectiveFineStatus>,
}

/// Aggregated money movement, all values as positive magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    /// Completed wallet top-ups.
    pub deposits_received: Amount,
    /// Completed rental payments.
    pub rental_income: Amount,
    /// Completed refund credits (inspections and cancellations).
    pub refunds_paid: Amount,
    /// Completed fine payments.
    pub fines_collected: Amount,
    /// Totals of fines not yet paid.
    pub fines_outstanding: Amount,
}

impl Engine {
    /// Lists rental requests matching the filter, oldest first.
    pub fn list_rental_requests(&self, filter: &RentalFilter) -> Vec<RentalRequest> {
        let mut out: Vec<RentalRequest> = self
            .rentals
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|request| filter.matches(request))
            .collect();
        out.sort_by_key(|request| request.id.0);
        out
    }

    /// Lists `Active` rentals whose period has elapsed as of `today`.
    pub fn overdue_rentals(&self, today: NaiveDate) -> Vec<RentalRequest> {
        let mut out: Vec<RentalRequest> = self
            .rentals
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|request| is_overdue(request, today))
            .collect();
        out.sort_by_key(|request| request.id.0);
        out
    }

    /// Lists refund requests matching the filter, oldest first.
    pub fn list_refund_requests(&self, filter: &RefundFilter) -> Vec<RefundRequest> {
        let mut out: Vec<RefundRequest> = self
            .refunds
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|refund| {
                !filter.rental.is_some_and(|r| r != refund.rental)
                    && !filter.status.is_some_and(|s| s != refund.status)
            })
            .collect();
        out.sort_by_key(|refund| refund.id.0);
        out
    }

    /// Lists fines matching the filter, with status derived as of `today`.
    pub fn list_fines(&self, filter: &FineFilter, today: NaiveDate) -> Vec<Fine> {
        let mut out: Vec<Fine> = self
            .fines
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|fine| {
                !filter.payer.is_some_and(|p| p != fine.payer)
                    && !filter
                        .status
                        .is_some_and(|s| s != effective_status(fine, today))
            })
            .collect();
        out.sort_by_key(|fine| fine.id.0);
        out
    }

    /// Money-movement summary over the whole ledger, plus unpaid fine totals.
    pub fn summary(&self, today: NaiveDate) -> LedgerSummary {
        let mut deposits_received = Amount::ZERO;
        let mut rental_income = Amount::ZERO;
        let mut refunds_paid = Amount::ZERO;
        let mut fines_collected = Amount::ZERO;

        for tx in self.ledger.snapshot() {
            if tx.status != TxStatus::Completed {
                continue;
            }
            match tx.kind {
                TxKind::Deposit => deposits_received += tx.amount,
                TxKind::RentalPayment => rental_income += tx.amount.abs(),
                TxKind::Refund => refunds_paid += tx.amount,
                TxKind::FinePayment => fines_collected += tx.amount.abs(),
            }
        }

        let fines_outstanding = self
            .list_fines(&FineFilter::default(), today)
            .iter()
            .filter(|fine| fine.payment_tx.is_none())
            .map(|fine| fine.total)
            .sum();

        LedgerSummary {
            deposits_received,
            rental_income,
            refunds_paid,
            fines_collected,
            fines_outstanding,
        }
    }

    /// Owners that appear anywhere in the ledger, for balance exports.
    pub fn owners(&self) -> Vec<OwnerId> {
        let mut out: Vec<OwnerId> = self
            .ledger
            .snapshot()
            .iter()
            .map(|tx| tx.owner)
            .collect();
        out.sort_by_key(|owner| owner.0);
        out.dedup();
        out
    }
}
