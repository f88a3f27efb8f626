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

//! Rental processing engine.
//!
//! The [`Engine`] composes the wallet [`Ledger`], the kit [`Inventory`], and
//! the rental/refund/fine stores, and exposes the full operation surface:
//! deposits, the rental lifecycle, refund inspection, and fine payment.
//!
//! # Settlement
//!
//! Every operation either fully commits (state transition plus its ledger
//! entry together) or fully rolls back (reservation released, no request
//! created). Callers never observe a partial commit.
//!
//! # Thread Safety
//!
//! Rentals, refunds, and fines live in [`DashMap`]s with a
//! [`parking_lot::Mutex`] per record, so operations on different ids run in
//! parallel while operations on the same id serialize. The loser of two
//! racing transitions observes a stale status and fails with
//! [`RentalError::InvalidStateTransition`].
//!
//! Lock ordering is refund → rental → (inventory | fine | ledger); no
//! operation acquires locks against that order, so the lock graph is acyclic.

use crate::base::{FineId, KitId, OwnerId, RefundId, RentalId};
use crate::error::RentalError;
use crate::fine::{Fine, FineStatus};
use crate::inventory::{ConditionReport, DamageLine, Inventory, Kit, KitSpec};
use crate::ledger::Ledger;
use crate::money::Amount;
use crate::refund::{RefundDecision, RefundRequest, RefundStatus};
use crate::rental::{RentalPeriod, RentalRequest, RentalStatus};
use crate::transaction::{Transaction, TxFilter, TxKind, TxRef};
use chrono::{Days, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// When false, a rental request is charged and approved on creation
    /// without a staff-review step.
    pub require_approval: bool,
    /// Days between fine assessment and its due date.
    pub fine_due_days: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            require_approval: true,
            fine_due_days: 14,
        }
    }
}

/// Central engine owning all lifecycle state.
pub struct Engine {
    config: EngineConfig,
    pub(crate) ledger: Ledger,
    pub(crate) inventory: Inventory,
    pub(crate) rentals: DashMap<RentalId, Arc<Mutex<RentalRequest>>>,
    pub(crate) refunds: DashMap<RefundId, Arc<Mutex<RefundRequest>>>,
    pub(crate) fines: DashMap<FineId, Arc<Mutex<Fine>>>,
    /// At most one refund per rental; claimed atomically at creation.
    refund_by_rental: DashMap<RentalId, RefundId>,
    /// At most one fine per rental.
    fine_by_rental: DashMap<RentalId, FineId>,
    next_rental: AtomicU64,
    next_refund: AtomicU64,
    next_fine: AtomicU64,
}

impl Engine {
    /// Creates an engine with the default configuration (approval required,
    /// 14-day fine due dates).
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            config,
            ledger: Ledger::new(),
            inventory: Inventory::new(),
            rentals: DashMap::new(),
            refunds: DashMap::new(),
            fines: DashMap::new(),
            refund_by_rental: DashMap::new(),
            fine_by_rental: DashMap::new(),
            next_rental: AtomicU64::new(1),
            next_refund: AtomicU64::new(1),
            next_fine: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Catalog ===

    /// Registers a kit with the inventory.
    pub fn add_kit(&self, spec: KitSpec) {
        self.inventory.add_kit(spec);
    }

    /// Snapshot of a kit's catalog entry and availability.
    pub fn kit(&self, id: KitId) -> Option<Kit> {
        self.inventory.get(id)
    }

    // === Wallet ===

    /// Credits a wallet top-up. The amount must be strictly positive.
    pub fn deposit_to_wallet(
        &self,
        owner: OwnerId,
        amount: Amount,
    ) -> Result<Arc<Transaction>, RentalError> {
        let result = self
            .ledger
            .append_and_settle(owner, TxKind::Deposit, amount, TxRef::None);
        match &result {
            Ok(tx) => info!(%owner, %amount, tx = %tx.id, "deposit settled"),
            Err(e) => warn!(%owner, %amount, error = %e, "deposit rejected"),
        }
        result
    }

    /// Derived wallet balance: sum of the owner's completed transactions.
    pub fn get_balance(&self, owner: OwnerId) -> Amount {
        self.ledger.balance(owner)
    }

    /// Lists an owner's ledger transactions.
    pub fn transactions(&self, owner: OwnerId, filter: &TxFilter) -> Vec<Arc<Transaction>> {
        self.ledger.transactions(owner, filter)
    }

    /// Drains the global append-order journal for a batch audit export.
    /// Consuming, see [`Ledger::drain_audit`].
    pub fn audit_journal(&self) -> Vec<Arc<Transaction>> {
        self.ledger.drain_audit()
    }

    // === Rental lifecycle ===

    /// Creates a rental request, reserving kit quantity.
    ///
    /// With approval disabled the request is charged immediately and returned
    /// as `Approved`; a failed charge rolls the reservation back and creates
    /// nothing. With approval enabled the request parks in `PendingApproval`
    /// holding its reservation until review.
    ///
    /// # Errors
    ///
    /// - [`RentalError::InvalidDateRange`] - period end not after start.
    /// - [`RentalError::NotFound`] - unknown kit.
    /// - [`RentalError::KitUnavailable`] - no free quantity.
    /// - [`RentalError::InsufficientFunds`] - immediate charge failed.
    pub fn create_rental_request(
        &self,
        requester: OwnerId,
        kit: KitId,
        period: RentalPeriod,
        purpose: impl Into<String>,
    ) -> Result<RentalRequest, RentalError> {
        if !period.is_valid() {
            return Err(RentalError::InvalidDateRange);
        }
        let daily_price = self.inventory.daily_price(kit)?;
        let total_cost = daily_price.times(period.days());

        self.inventory.reserve(kit)?;

        let id = RentalId(self.next_rental.fetch_add(1, Ordering::Relaxed));
        let mut request = RentalRequest {
            id,
            requester,
            kit,
            period,
            total_cost,
            purpose: purpose.into(),
            status: RentalStatus::PendingApproval,
            approver: None,
            approved_at: None,
            rejection_reason: None,
            payment_tx: None,
        };

        if !self.config.require_approval {
            match self.charge_rental(&mut request, None) {
                Ok(()) => {}
                Err(e) => {
                    // Roll the reservation back; the request is never stored.
                    let _ = self.inventory.release(kit);
                    warn!(rental = %id, %requester, error = %e, "rental creation rolled back");
                    return Err(e);
                }
            }
        }

        let snapshot = request.clone();
        self.rentals.insert(id, Arc::new(Mutex::new(request)));
        info!(rental = %id, %requester, %kit, cost = %total_cost,
              status = snapshot.status.label(), "rental request created");
        Ok(snapshot)
    }

    /// Approves a pending request and charges the requester's wallet.
    ///
    /// Legal only from `PendingApproval`. A failed charge releases the
    /// reservation and auto-rejects the request with a system reason; the
    /// error is still returned to the caller.
    pub fn approve_rental_request(
        &self,
        id: RentalId,
        approver: OwnerId,
    ) -> Result<RentalRequest, RentalError> {
        let slot = self.rental_slot(id)?;
        let mut request = slot.lock();
        if request.status != RentalStatus::PendingApproval {
            return Err(RentalError::InvalidStateTransition {
                from: request.status.label(),
            });
        }

        match self.charge_rental(&mut request, Some(approver)) {
            Ok(()) => {
                info!(rental = %id, %approver, "rental approved and charged");
                Ok(request.clone())
            }
            Err(e) => {
                let _ = self.inventory.release(request.kit);
                request.status = RentalStatus::Rejected;
                request.approver = Some(approver);
                request.rejection_reason = Some("payment failed at approval".into());
                warn!(rental = %id, %approver, error = %e, "rental auto-rejected");
                Err(e)
            }
        }
    }

    /// Rejects a pending request and releases its reservation.
    pub fn reject_rental_request(
        &self,
        id: RentalId,
        approver: OwnerId,
        reason: impl Into<String>,
    ) -> Result<RentalRequest, RentalError> {
        let slot = self.rental_slot(id)?;
        let mut request = slot.lock();
        if request.status != RentalStatus::PendingApproval {
            return Err(RentalError::InvalidStateTransition {
                from: request.status.label(),
            });
        }
        self.inventory.release(request.kit)?;
        request.status = RentalStatus::Rejected;
        request.approver = Some(approver);
        request.rejection_reason = Some(reason.into());
        info!(rental = %id, %approver, "rental rejected");
        Ok(request.clone())
    }

    /// Marks the kit as physically handed over.
    ///
    /// Legal only from `Approved`; a no-op on an already `Active` request.
    pub fn activate_rental_request(&self, id: RentalId) -> Result<RentalRequest, RentalError> {
        let slot = self.rental_slot(id)?;
        let mut request = slot.lock();
        match request.status {
            RentalStatus::Active => Ok(request.clone()),
            RentalStatus::Approved => {
                request.status = RentalStatus::Active;
                info!(rental = %id, "rental activated");
                Ok(request.clone())
            }
            other => Err(RentalError::InvalidStateTransition {
                from: other.label(),
            }),
        }
    }

    /// Cancels an approved rental before activation.
    ///
    /// Releases the reservation and credits the full payment back. The ledger
    /// stays append-only: the original charge is untouched and the credit is
    /// a new `Refund` transaction referencing the rental.
    pub fn cancel_rental_request(&self, id: RentalId) -> Result<RentalRequest, RentalError> {
        let slot = self.rental_slot(id)?;
        let mut request = slot.lock();
        if request.status != RentalStatus::Approved {
            return Err(RentalError::InvalidStateTransition {
                from: request.status.label(),
            });
        }
        self.inventory.release(request.kit)?;
        let credit = self.ledger.append_and_settle(
            request.requester,
            TxKind::Refund,
            request.total_cost,
            TxRef::Rental(id),
        )?;
        request.status = RentalStatus::Cancelled;
        info!(rental = %id, credit = %credit.id, "rental cancelled, payment credited back");
        Ok(request.clone())
    }

    /// Returns the kit, applies the condition report, and assesses a fine if
    /// any component came back damaged.
    ///
    /// Legal only from `Active` (an overdue rental is still `Active`; overdue
    /// is a read-time view). Transitions to `Returned`.
    pub fn return_kit(
        &self,
        id: RentalId,
        report: &ConditionReport,
    ) -> Result<(RentalRequest, Option<Fine>), RentalError> {
        let slot = self.rental_slot(id)?;
        let mut request = slot.lock();
        if request.status != RentalStatus::Active {
            return Err(RentalError::InvalidStateTransition {
                from: request.status.label(),
            });
        }

        self.inventory.release(request.kit)?;
        let damage = self.inventory.apply_condition_report(request.kit, report)?;

        // One fine per rental: skip if inspection already assessed one.
        let fine = if damage.is_empty() || self.fine_by_rental.contains_key(&id) {
            None
        } else {
            Some(self.assess_fine(id, request.requester, damage))
        };

        request.status = RentalStatus::Returned;
        info!(rental = %id, fined = fine.is_some(), "kit returned");
        Ok((request.clone(), fine))
    }

    /// Snapshot of a rental request.
    pub fn rental_request(&self, id: RentalId) -> Option<RentalRequest> {
        self.rentals.get(&id).map(|slot| slot.lock().clone())
    }

    // === Refunds ===

    /// Opens a refund request against an `Active` or `Returned` rental.
    ///
    /// At most one refund per rental; a second attempt fails
    /// [`RentalError::InvalidSourceState`], as does any other source status.
    pub fn create_refund_request(
        &self,
        rental: RentalId,
        reason: impl Into<String>,
    ) -> Result<RefundRequest, RentalError> {
        let slot = self.rental_slot(rental)?;
        {
            let request = slot.lock();
            if !matches!(
                request.status,
                RentalStatus::Active | RentalStatus::Returned
            ) {
                return Err(RentalError::InvalidSourceState);
            }
        }

        let id = RefundId(self.next_refund.fetch_add(1, Ordering::Relaxed));
        // Atomic claim of the one-refund-per-rental slot.
        match self.refund_by_rental.entry(rental) {
            Entry::Occupied(_) => return Err(RentalError::InvalidSourceState),
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        let refund = RefundRequest {
            id,
            rental,
            reason: reason.into(),
            status: RefundStatus::Pending,
            final_amount: None,
            rejection_reason: None,
            credit_tx: None,
        };
        let snapshot = refund.clone();
        self.refunds.insert(id, Arc::new(Mutex::new(refund)));
        info!(refund = %id, rental = %rental, "refund requested");
        Ok(snapshot)
    }

    /// Inspects a pending refund: the single transition out of `Pending`.
    ///
    /// When the inspection includes a condition report, any damage found is
    /// applied to the kit and assessed as a fine first (once per rental).
    ///
    /// Approval enforces `0 ≤ final_amount ≤ original payment − linked fine`
    /// and credits the wallet in the same operation, landing on `Processed`.
    /// A zero final amount processes with no ledger entry. Rejection records
    /// the reason and touches no balance.
    pub fn inspect_refund_request(
        &self,
        id: RefundId,
        decision: RefundDecision,
        report: Option<&ConditionReport>,
    ) -> Result<RefundRequest, RentalError> {
        let slot = self
            .refunds
            .get(&id)
            .map(|s| Arc::clone(&s))
            .ok_or(RentalError::NotFound)?;
        let mut refund = slot.lock();
        if refund.status != RefundStatus::Pending {
            return Err(RentalError::InvalidStateTransition {
                from: refund.status.label(),
            });
        }

        let (payer, original_payment, kit) = {
            let rental_slot = self.rental_slot(refund.rental)?;
            let rental = rental_slot.lock();
            (rental.requester, rental.total_cost, rental.kit)
        };

        if let Some(report) = report {
            let damage = self.inventory.apply_condition_report(kit, report)?;
            if !damage.is_empty() && !self.fine_by_rental.contains_key(&refund.rental) {
                self.assess_fine(refund.rental, payer, damage);
            }
        }

        match decision {
            RefundDecision::Approve { final_amount } => {
                let fine_total = self.fine_total_for(refund.rental);
                let cap = original_payment - fine_total;
                if final_amount.is_negative() || final_amount > cap {
                    return Err(RentalError::RefundExceedsCap);
                }

                if final_amount.is_positive() {
                    let credit = self.ledger.append_and_settle(
                        payer,
                        TxKind::Refund,
                        final_amount,
                        TxRef::Refund(id),
                    )?;
                    refund.credit_tx = Some(credit.id);
                }
                refund.final_amount = Some(final_amount);
                refund.status = RefundStatus::Processed;
                info!(refund = %id, amount = %final_amount, "refund processed");
            }
            RefundDecision::Reject { reason } => {
                refund.status = RefundStatus::Rejected;
                refund.rejection_reason = Some(reason);
                info!(refund = %id, "refund rejected");
            }
        }
        Ok(refund.clone())
    }

    /// Snapshot of a refund request.
    pub fn refund_request(&self, id: RefundId) -> Option<RefundRequest> {
        self.refunds.get(&id).map(|slot| slot.lock().clone())
    }

    // === Fines ===

    /// Pays a pending fine, charging the payer's wallet.
    ///
    /// Works on overdue fines too; overdueness is derived on read, never
    /// stored. A failed charge leaves the fine `Pending`.
    pub fn pay_fine(&self, id: FineId, payer: OwnerId) -> Result<Fine, RentalError> {
        let slot = self
            .fines
            .get(&id)
            .map(|s| Arc::clone(&s))
            .ok_or(RentalError::NotFound)?;
        let mut fine = slot.lock();
        if fine.status != FineStatus::Pending {
            return Err(RentalError::InvalidStateTransition { from: "Paid" });
        }
        let tx = self
            .ledger
            .append_and_settle(payer, TxKind::FinePayment, -fine.total, TxRef::Fine(id))?;
        fine.status = FineStatus::Paid;
        fine.payment_tx = Some(tx.id);
        info!(fine = %id, %payer, amount = %fine.total, "fine paid");
        Ok(fine.clone())
    }

    /// Snapshot of a fine.
    pub fn fine(&self, id: FineId) -> Option<Fine> {
        self.fines.get(&id).map(|slot| slot.lock().clone())
    }

    /// The fine linked to a rental, if one was assessed.
    pub fn fine_for_rental(&self, rental: RentalId) -> Option<Fine> {
        let id = *self.fine_by_rental.get(&rental)?;
        self.fine(id)
    }

    // === Internals ===

    fn rental_slot(&self, id: RentalId) -> Result<Arc<Mutex<RentalRequest>>, RentalError> {
        self.rentals
            .get(&id)
            .map(|slot| Arc::clone(&slot))
            .ok_or(RentalError::NotFound)
    }

    /// Charges the rental payment and stamps approval fields. Caller holds
    /// the request lock (or exclusive ownership at creation).
    fn charge_rental(
        &self,
        request: &mut RentalRequest,
        approver: Option<OwnerId>,
    ) -> Result<(), RentalError> {
        let tx = self.ledger.append_and_settle(
            request.requester,
            TxKind::RentalPayment,
            -request.total_cost,
            TxRef::Rental(request.id),
        )?;
        request.status = RentalStatus::Approved;
        request.approver = approver;
        request.approved_at = Some(Utc::now());
        request.payment_tx = Some(tx.id);
        Ok(())
    }

    /// Creates the one fine for a rental from its damage lines.
    ///
    /// Not part of the public surface: only the return and inspection paths
    /// assess damage. Assessment happens once; the fine is never recomputed.
    fn assess_fine(
        &self,
        rental: RentalId,
        payer: OwnerId,
        assessment: Vec<DamageLine>,
    ) -> Fine {
        let id = FineId(self.next_fine.fetch_add(1, Ordering::Relaxed));
        let total: Amount = assessment.iter().map(|line| line.total()).sum();
        let due = Utc::now()
            .date_naive()
            .checked_add_days(Days::new(self.config.fine_due_days))
            .unwrap_or_else(|| Utc::now().date_naive());
        let fine = Fine {
            id,
            rental,
            payer,
            assessment,
            total,
            due,
            status: FineStatus::Pending,
            payment_tx: None,
        };
        self.fine_by_rental.insert(rental, id);
        self.fines.insert(id, Arc::new(Mutex::new(fine.clone())));
        info!(fine = %id, rental = %rental, total = %total, "fine assessed");
        fine
    }

    /// Total of the fine linked to a rental, zero when none exists.
    pub(crate) fn fine_total_for(&self, rental: RentalId) -> Amount {
        self.fine_by_rental
            .get(&rental)
            .and_then(|id| self.fine(*id))
            .map(|fine| fine.total)
            .unwrap_or(Amount::ZERO)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
