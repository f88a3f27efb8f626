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

//! # Rental Ledger
//!
//! This library provides an equipment-rental management engine for a fixed
//! pool of physical kits: the rental/refund/fine lifecycle state machines and
//! the append-only transaction ledger backing every wallet balance.
//!
//! ## Core Components
//!
//! - [`Engine`]: central facade wiring the ledger, inventory, and lifecycle stores
//! - [`Ledger`]: append-only transaction store; balances are always derived
//! - [`Inventory`]: kit availability counters and component conditions
//! - [`RentalRequest`] / [`RefundRequest`] / [`Fine`]: the lifecycle records
//! - [`RentalError`]: typed, caller-recoverable failure taxonomy
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rental_ledger_rs::{
//!     Amount, Engine, EngineConfig, KitId, KitSpec, OwnerId, RentalPeriod, RentalStatus,
//! };
//!
//! let engine = Engine::with_config(EngineConfig {
//!     require_approval: false,
//!     ..EngineConfig::default()
//! });
//! engine.add_kit(KitSpec {
//!     id: KitId(1),
//!     category: "microcontrollers".into(),
//!     daily_price: Amount(50_000),
//!     quantity: 2,
//!     components: Vec::new(),
//! });
//!
//! engine.deposit_to_wallet(OwnerId(7), Amount(200_000)).unwrap();
//! let rental = engine
//!     .create_rental_request(
//!         OwnerId(7),
//!         KitId(1),
//!         RentalPeriod {
//!             start: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
//!             end: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
//!         },
//!         "lab session",
//!     )
//!     .unwrap();
//!
//! assert_eq!(rental.status, RentalStatus::Approved);
//! assert_eq!(rental.total_cost, Amount(150_000));
//! assert_eq!(engine.get_balance(OwnerId(7)), Amount(50_000));
//! ```
//!
//! ## Thread Safety
//!
//! All operations take `&self`: wallets, kits, and lifecycle records each sit
//! behind their own lock, so independent entities are processed in parallel
//! while racing transitions on one entity serialize and the loser gets a
//! typed error.

pub mod base;
pub mod engine;
pub mod error;
pub mod fine;
pub mod inventory;
pub mod ledger;
pub mod money;
pub mod query;
pub mod refund;
pub mod rental;
pub mod transaction;

pub use base::{FineId, KitId, OwnerId, RefundId, RentalId, TxId};
pub use engine::{Engine, EngineConfig};
pub use error::RentalError;
pub use fine::{EffectiveFineStatus, Fine, FineStatus, effective_status};
pub use inventory::{
    Component, Condition, ConditionReport, DamageLine, Inventory, Kit, KitSpec, KitStatus,
};
pub use ledger::Ledger;
pub use money::Amount;
pub use query::{FineFilter, LedgerSummary, RefundFilter, RentalFilter};
pub use refund::{RefundDecision, RefundRequest, RefundStatus};
pub use rental::{RentalPeriod, RentalRequest, RentalStatus, is_overdue};
pub use transaction::{Transaction, TxFilter, TxKind, TxRef, TxStatus};
