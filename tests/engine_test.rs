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

//! Engine public API integration tests: the full rental/refund/fine
//! lifecycle against the wallet ledger.

use chrono::NaiveDate;
use rental_ledger_rs::{
    Amount, Component, Condition, ConditionReport, Engine, EngineConfig, FineStatus, KitId,
    KitSpec, KitStatus, OwnerId, RefundDecision, RefundStatus, RentalError, RentalPeriod,
    RentalStatus, TxFilter, TxKind, TxStatus, is_overdue,
};

const STUDENT: OwnerId = OwnerId(7);
const STAFF: OwnerId = OwnerId(100);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn march(d: u32) -> NaiveDate {
    date(2026, 3, d)
}

fn period(start: u32, end: u32) -> RentalPeriod {
    RentalPeriod {
        start: march(start),
        end: march(end),
    }
}

/// 50,000/day kit with one component worth 75,000.
fn sensor_kit(quantity: u32) -> KitSpec {
    KitSpec {
        id: KitId(1),
        category: "sensors".into(),
        daily_price: Amount(50_000),
        quantity,
        components: vec![Component {
            name: "ultrasonic".into(),
            quantity: 1,
            condition: Condition::New,
            unit_value: Amount(75_000),
        }],
    }
}

fn engine_with_kit(require_approval: bool, quantity: u32) -> Engine {
    let engine = Engine::with_config(EngineConfig {
        require_approval,
        ..EngineConfig::default()
    });
    engine.add_kit(sensor_kit(quantity));
    engine
}

fn damaged_report() -> ConditionReport {
    ConditionReport::from([("ultrasonic".to_string(), Condition::Damaged)])
}

// === Rental lifecycle ===

#[test]
fn three_day_rental_charges_exactly_once() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();

    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab session")
        .unwrap();
    assert_eq!(rental.status, RentalStatus::PendingApproval);
    assert_eq!(rental.total_cost, Amount(150_000));
    // Nothing charged until approval.
    assert_eq!(engine.get_balance(STUDENT), Amount(200_000));

    let approved = engine.approve_rental_request(rental.id, STAFF).unwrap();
    assert_eq!(approved.status, RentalStatus::Approved);
    assert_eq!(approved.approver, Some(STAFF));
    assert!(approved.payment_tx.is_some());
    assert_eq!(engine.get_balance(STUDENT), Amount(50_000));
}

#[test]
fn approve_twice_never_charges_twice() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(500_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();

    engine.approve_rental_request(rental.id, STAFF).unwrap();
    let retry = engine.approve_rental_request(rental.id, STAFF);
    assert_eq!(
        retry,
        Err(RentalError::InvalidStateTransition { from: "Approved" })
    );

    let payments = engine.transactions(
        STUDENT,
        &TxFilter {
            kind: Some(TxKind::RentalPayment),
            ..TxFilter::default()
        },
    );
    assert_eq!(payments.len(), 1);
    assert_eq!(engine.get_balance(STUDENT), Amount(350_000));
}

#[test]
fn no_approval_mode_charges_on_creation() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();

    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    assert_eq!(rental.status, RentalStatus::Approved);
    assert_eq!(engine.get_balance(STUDENT), Amount(50_000));
}

#[test]
fn underfunded_creation_rolls_back_reservation() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(100_000)).unwrap();

    let result = engine.create_rental_request(STUDENT, KitId(1), period(1, 4), "lab");
    assert_eq!(result, Err(RentalError::InsufficientFunds));

    // No leaked reservation, no request, balance untouched.
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 1);
    assert!(engine.list_rental_requests(&Default::default()).is_empty());
    assert_eq!(engine.get_balance(STUDENT), Amount(100_000));
}

#[test]
fn underfunded_approval_auto_rejects_and_releases() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(100_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 0);

    let result = engine.approve_rental_request(rental.id, STAFF);
    assert_eq!(result, Err(RentalError::InsufficientFunds));

    let rejected = engine.rental_request(rental.id).unwrap();
    assert_eq!(rejected.status, RentalStatus::Rejected);
    assert!(rejected.rejection_reason.is_some());
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 1);
    assert_eq!(engine.get_balance(STUDENT), Amount(100_000));
}

#[test]
fn quantity_is_the_sole_availability_truth() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(500_000)).unwrap();

    engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "first")
        .unwrap();
    // Overlap does not matter; the counter is exhausted.
    let second = engine.create_rental_request(STUDENT, KitId(1), period(10, 12), "second");
    assert_eq!(second, Err(RentalError::KitUnavailable));
}

#[test]
fn invalid_date_range_is_rejected_before_reserving() {
    let engine = engine_with_kit(true, 1);
    let result = engine.create_rental_request(STUDENT, KitId(1), period(4, 4), "empty");
    assert_eq!(result, Err(RentalError::InvalidDateRange));
    let result = engine.create_rental_request(STUDENT, KitId(1), period(4, 1), "inverted");
    assert_eq!(result, Err(RentalError::InvalidDateRange));
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 1);
}

#[test]
fn unknown_kit_is_not_found() {
    let engine = engine_with_kit(true, 1);
    let result = engine.create_rental_request(STUDENT, KitId(9), period(1, 4), "ghost");
    assert_eq!(result, Err(RentalError::NotFound));
}

#[test]
fn reject_releases_reservation_without_ledger_effect() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(500_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();

    let rejected = engine
        .reject_rental_request(rental.id, STAFF, "out of term")
        .unwrap();
    assert_eq!(rejected.status, RentalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("out of term"));
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 1);
    assert_eq!(engine.get_balance(STUDENT), Amount(500_000));
}

#[test]
fn activate_is_idempotent_and_gated_on_approved() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();

    let active = engine.activate_rental_request(rental.id).unwrap();
    assert_eq!(active.status, RentalStatus::Active);
    // Second activation is a no-op, not an error.
    let again = engine.activate_rental_request(rental.id).unwrap();
    assert_eq!(again.status, RentalStatus::Active);
}

#[test]
fn activate_from_pending_fails() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();

    let result = engine.activate_rental_request(rental.id);
    assert_eq!(
        result,
        Err(RentalError::InvalidStateTransition {
            from: "PendingApproval"
        })
    );
}

#[test]
fn cancel_before_activation_credits_payment_back() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    assert_eq!(engine.get_balance(STUDENT), Amount(50_000));

    let cancelled = engine.cancel_rental_request(rental.id).unwrap();
    assert_eq!(cancelled.status, RentalStatus::Cancelled);
    assert_eq!(engine.get_balance(STUDENT), Amount(200_000));
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 1);

    // The original charge is still in the log; the credit is a new entry.
    let all = engine.transactions(STUDENT, &TxFilter::default());
    assert_eq!(all.len(), 3);
}

#[test]
fn cancel_after_activation_fails() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();

    let result = engine.cancel_rental_request(rental.id);
    assert_eq!(
        result,
        Err(RentalError::InvalidStateTransition { from: "Active" })
    );
}

// === Returns and fines ===

#[test]
fn clean_return_releases_kit_without_fine() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();

    let report = ConditionReport::from([("ultrasonic".to_string(), Condition::Used)]);
    let (returned, fine) = engine.return_kit(rental.id, &report).unwrap();
    assert_eq!(returned.status, RentalStatus::Returned);
    assert!(fine.is_none());
    assert_eq!(engine.kit(KitId(1)).unwrap().available_quantity, 1);
    assert_eq!(engine.kit(KitId(1)).unwrap().status(), KitStatus::Available);
}

#[test]
fn damaged_return_assesses_single_fine_and_payment() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(300_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();

    let (returned, fine) = engine.return_kit(rental.id, &damaged_report()).unwrap();
    assert_eq!(returned.status, RentalStatus::Returned);
    let fine = fine.expect("damaged component must produce a fine");
    assert_eq!(fine.total, Amount(75_000));
    assert_eq!(fine.status, FineStatus::Pending);
    assert_eq!(engine.kit(KitId(1)).unwrap().status(), KitStatus::Damaged);

    // Balance after rental charge: 150,000. Pay the fine.
    let paid = engine.pay_fine(fine.id, STUDENT).unwrap();
    assert_eq!(paid.status, FineStatus::Paid);
    assert!(paid.payment_tx.is_some());
    assert_eq!(engine.get_balance(STUDENT), Amount(75_000));

    let fine_payments = engine.transactions(
        STUDENT,
        &TxFilter {
            kind: Some(TxKind::FinePayment),
            ..TxFilter::default()
        },
    );
    assert_eq!(fine_payments.len(), 1);
    assert_eq!(fine_payments[0].amount, Amount(-75_000));
}

#[test]
fn paying_a_paid_fine_fails() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(300_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();
    let (_, fine) = engine.return_kit(rental.id, &damaged_report()).unwrap();
    let fine = fine.unwrap();

    engine.pay_fine(fine.id, STUDENT).unwrap();
    let retry = engine.pay_fine(fine.id, STUDENT);
    assert_eq!(
        retry,
        Err(RentalError::InvalidStateTransition { from: "Paid" })
    );
}

#[test]
fn underfunded_fine_payment_leaves_fine_pending() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(160_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();
    let (_, fine) = engine.return_kit(rental.id, &damaged_report()).unwrap();
    let fine = fine.unwrap();

    // 10,000 left after the 150,000 charge; the 75,000 fine cannot settle.
    let result = engine.pay_fine(fine.id, STUDENT);
    assert_eq!(result, Err(RentalError::InsufficientFunds));
    assert_eq!(
        engine.fine(fine.id).unwrap().status,
        FineStatus::Pending
    );
    assert_eq!(engine.get_balance(STUDENT), Amount(10_000));
}

#[test]
fn return_is_gated_on_active() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();

    // Approved but never handed over.
    let result = engine.return_kit(rental.id, &ConditionReport::new());
    assert_eq!(
        result,
        Err(RentalError::InvalidStateTransition { from: "Approved" })
    );
}

#[test]
fn overdue_is_a_read_time_view() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(200_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();

    let snapshot = engine.rental_request(rental.id).unwrap();
    assert!(!is_overdue(&snapshot, march(4)));
    assert!(is_overdue(&snapshot, march(5)));
    assert_eq!(engine.overdue_rentals(march(5)).len(), 1);
    assert!(engine.overdue_rentals(march(3)).is_empty());

    // An overdue rental is still Active and still returnable.
    let (returned, _) = engine
        .return_kit(rental.id, &ConditionReport::new())
        .unwrap();
    assert_eq!(returned.status, RentalStatus::Returned);
}

// === Refunds ===

fn returned_rental(engine: &Engine) -> rental_ledger_rs::RentalRequest {
    engine.deposit_to_wallet(STUDENT, Amount(300_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();
    let (returned, _) = engine
        .return_kit(rental.id, &ConditionReport::new())
        .unwrap();
    returned
}

#[test]
fn refund_lifecycle_credits_inspected_amount() {
    let engine = engine_with_kit(false, 1);
    let rental = returned_rental(&engine);
    assert_eq!(engine.get_balance(STUDENT), Amount(150_000));

    let refund = engine
        .create_refund_request(rental.id, "returned two days early")
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Pending);

    let processed = engine
        .inspect_refund_request(
            refund.id,
            RefundDecision::Approve {
                final_amount: Amount(100_000),
            },
            None,
        )
        .unwrap();
    assert_eq!(processed.status, RefundStatus::Processed);
    assert_eq!(processed.final_amount, Some(Amount(100_000)));
    assert!(processed.credit_tx.is_some());
    assert_eq!(engine.get_balance(STUDENT), Amount(250_000));
}

#[test]
fn refund_on_rejected_rental_fails() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(500_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine
        .reject_rental_request(rental.id, STAFF, "no slots")
        .unwrap();

    let result = engine.create_refund_request(rental.id, "please");
    assert_eq!(result, Err(RentalError::InvalidSourceState));
}

#[test]
fn refund_on_pending_rental_fails() {
    let engine = engine_with_kit(true, 1);
    engine.deposit_to_wallet(STUDENT, Amount(500_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();

    let result = engine.create_refund_request(rental.id, "early");
    assert_eq!(result, Err(RentalError::InvalidSourceState));
}

#[test]
fn at_most_one_refund_per_rental() {
    let engine = engine_with_kit(false, 1);
    let rental = returned_rental(&engine);

    engine.create_refund_request(rental.id, "first").unwrap();
    let second = engine.create_refund_request(rental.id, "second");
    assert_eq!(second, Err(RentalError::InvalidSourceState));
}

#[test]
fn refund_cap_accounts_for_linked_fine() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(300_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();
    engine.return_kit(rental.id, &damaged_report()).unwrap();

    let refund = engine.create_refund_request(rental.id, "overcharged").unwrap();

    // Cap: 150,000 payment − 75,000 fine = 75,000.
    let over = engine.inspect_refund_request(
        refund.id,
        RefundDecision::Approve {
            final_amount: Amount(80_000),
        },
        None,
    );
    assert_eq!(over, Err(RentalError::RefundExceedsCap));
    // Failed inspection leaves the refund pending.
    assert_eq!(
        engine.refund_request(refund.id).unwrap().status,
        RefundStatus::Pending
    );

    let processed = engine
        .inspect_refund_request(
            refund.id,
            RefundDecision::Approve {
                final_amount: Amount(75_000),
            },
            None,
        )
        .unwrap();
    assert_eq!(processed.final_amount, Some(Amount(75_000)));
}

#[test]
fn refund_rejection_has_no_ledger_effect() {
    let engine = engine_with_kit(false, 1);
    let rental = returned_rental(&engine);
    let balance_before = engine.get_balance(STUDENT);

    let refund = engine.create_refund_request(rental.id, "changed my mind").unwrap();
    let rejected = engine
        .inspect_refund_request(
            refund.id,
            RefundDecision::Reject {
                reason: "kit was used for the full period".into(),
            },
            None,
        )
        .unwrap();

    assert_eq!(rejected.status, RefundStatus::Rejected);
    assert!(rejected.rejection_reason.is_some());
    assert!(rejected.credit_tx.is_none());
    assert_eq!(engine.get_balance(STUDENT), balance_before);
}

#[test]
fn inspect_twice_fails() {
    let engine = engine_with_kit(false, 1);
    let rental = returned_rental(&engine);
    let refund = engine.create_refund_request(rental.id, "early").unwrap();
    engine
        .inspect_refund_request(
            refund.id,
            RefundDecision::Reject {
                reason: "no".into(),
            },
            None,
        )
        .unwrap();

    let retry = engine.inspect_refund_request(
        refund.id,
        RefundDecision::Approve {
            final_amount: Amount(10_000),
        },
        None,
    );
    assert_eq!(
        retry,
        Err(RentalError::InvalidStateTransition { from: "Rejected" })
    );
}

#[test]
fn inspection_damage_report_assesses_fine_and_lowers_cap() {
    let engine = engine_with_kit(false, 1);
    engine.deposit_to_wallet(STUDENT, Amount(300_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();

    let refund = engine.create_refund_request(rental.id, "broken kit").unwrap();
    // Inspector finds the damage and still approves a partial refund.
    let over = engine.inspect_refund_request(
        refund.id,
        RefundDecision::Approve {
            final_amount: Amount(100_000),
        },
        Some(&damaged_report()),
    );
    assert_eq!(over, Err(RentalError::RefundExceedsCap));

    // The fine from the inspection exists and is linked to the rental.
    let fine = engine.fine_for_rental(rental.id).expect("fine assessed at inspection");
    assert_eq!(fine.total, Amount(75_000));

    // A later damaged return does not assess a second fine.
    let (_, second) = engine.return_kit(rental.id, &damaged_report()).unwrap();
    assert!(second.is_none());
}

#[test]
fn zero_amount_refund_processes_without_credit() {
    let engine = engine_with_kit(false, 1);
    let rental = returned_rental(&engine);
    let refund = engine.create_refund_request(rental.id, "symbolic").unwrap();

    let processed = engine
        .inspect_refund_request(
            refund.id,
            RefundDecision::Approve {
                final_amount: Amount::ZERO,
            },
            None,
        )
        .unwrap();
    assert_eq!(processed.status, RefundStatus::Processed);
    assert_eq!(processed.final_amount, Some(Amount::ZERO));
    assert!(processed.credit_tx.is_none());
}

// === Balance correctness ===

#[test]
fn balance_always_equals_sum_of_completed_transactions() {
    let engine = engine_with_kit(false, 2);
    engine.deposit_to_wallet(STUDENT, Amount(400_000)).unwrap();
    let rental = engine
        .create_rental_request(STUDENT, KitId(1), period(1, 4), "lab")
        .unwrap();
    engine.activate_rental_request(rental.id).unwrap();
    engine.return_kit(rental.id, &damaged_report()).unwrap();
    let fine = engine.fine_for_rental(rental.id).unwrap();
    engine.pay_fine(fine.id, STUDENT).unwrap();

    let completed: Amount = engine
        .transactions(
            STUDENT,
            &TxFilter {
                status: Some(TxStatus::Completed),
                ..TxFilter::default()
            },
        )
        .iter()
        .map(|tx| tx.amount)
        .sum();
    assert_eq!(engine.get_balance(STUDENT), completed);
    assert_eq!(completed, Amount(175_000));
}
