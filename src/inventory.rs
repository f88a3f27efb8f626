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

//! Kit inventory: availability counters and component conditions.
//!
//! Available quantity is the single source of truth for availability. A kit
//! with zero available quantity cannot be reserved regardless of any status
//! view; [`KitStatus`] is derived from the counters and conditions on read and
//! never stored.
//!
//! Quantity mutation happens only through [`Inventory::reserve`] and
//! [`Inventory::release`], each a single critical section per kit.

use crate::base::KitId;
use crate::error::RentalError;
use crate::money::Amount;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Physical condition of a kit component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    New,
    Used,
    Damaged,
}

/// One component line in a kit's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub quantity: u32,
    pub condition: Condition,
    /// Replacement value per unit, used for damage fines.
    pub unit_value: Amount,
}

/// Derived kit status; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KitStatus {
    Available,
    InUse,
    Damaged,
}

/// Catalog entry for registering a kit with the inventory.
#[derive(Debug, Clone)]
pub struct KitSpec {
    pub id: KitId,
    pub category: String,
    pub daily_price: Amount,
    pub quantity: u32,
    pub components: Vec<Component>,
}

/// Read-only snapshot of a kit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kit {
    pub id: KitId,
    pub category: String,
    pub daily_price: Amount,
    pub total_quantity: u32,
    pub available_quantity: u32,
    pub components: Vec<Component>,
}

impl Kit {
    /// Derives the status from quantity and component conditions.
    pub fn status(&self) -> KitStatus {
        if self
            .components
            .iter()
            .any(|c| c.condition == Condition::Damaged)
        {
            KitStatus::Damaged
        } else if self.available_quantity == 0 {
            KitStatus::InUse
        } else {
            KitStatus::Available
        }
    }
}

/// Condition observed per component at return time, keyed by component name.
pub type ConditionReport = HashMap<String, Condition>;

/// One damaged component with the count and catalog value to fine for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageLine {
    pub component: String,
    pub count: u32,
    pub unit_value: Amount,
}

impl DamageLine {
    pub fn total(&self) -> Amount {
        self.unit_value.times(i64::from(self.count))
    }
}

#[derive(Debug)]
struct KitData {
    category: String,
    daily_price: Amount,
    total_quantity: u32,
    available_quantity: u32,
    components: Vec<Component>,
}

/// Tracks kit quantities and component conditions for the whole pool.
#[derive(Debug, Default)]
pub struct Inventory {
    kits: DashMap<KitId, Arc<Mutex<KitData>>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            kits: DashMap::new(),
        }
    }

    /// Registers a kit, replacing any previous entry with the same id.
    pub fn add_kit(&self, spec: KitSpec) {
        self.kits.insert(
            spec.id,
            Arc::new(Mutex::new(KitData {
                category: spec.category,
                daily_price: spec.daily_price,
                total_quantity: spec.quantity,
                available_quantity: spec.quantity,
                components: spec.components,
            })),
        );
    }

    /// Returns a point-in-time snapshot of a kit.
    pub fn get(&self, id: KitId) -> Option<Kit> {
        let entry = self.kits.get(&id)?;
        let data = entry.lock();
        Some(Kit {
            id,
            category: data.category.clone(),
            daily_price: data.daily_price,
            total_quantity: data.total_quantity,
            available_quantity: data.available_quantity,
            components: data.components.clone(),
        })
    }

    pub fn daily_price(&self, id: KitId) -> Result<Amount, RentalError> {
        let entry = self.kits.get(&id).ok_or(RentalError::NotFound)?;
        let price = entry.lock().daily_price;
        Ok(price)
    }

    /// Takes one unit of availability, or fails if none is free.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NotFound`] - no kit with this id.
    /// - [`RentalError::KitUnavailable`] - available quantity is zero.
    pub fn reserve(&self, id: KitId) -> Result<(), RentalError> {
        let entry = self.kits.get(&id).ok_or(RentalError::NotFound)?;
        let mut data = entry.lock();
        if data.available_quantity == 0 {
            return Err(RentalError::KitUnavailable);
        }
        data.available_quantity -= 1;
        Ok(())
    }

    /// Gives one unit of availability back.
    ///
    /// Capped at the total quantity; releasing more units than were reserved
    /// indicates an engine bug and is asserted in debug builds.
    pub fn release(&self, id: KitId) -> Result<(), RentalError> {
        let entry = self.kits.get(&id).ok_or(RentalError::NotFound)?;
        let mut data = entry.lock();
        debug_assert!(
            data.available_quantity < data.total_quantity,
            "release without matching reserve for kit {id}"
        );
        if data.available_quantity < data.total_quantity {
            data.available_quantity += 1;
        }
        Ok(())
    }

    /// Applies a return-time condition report and extracts damage lines.
    ///
    /// Each reported component found in the catalog takes the reported
    /// condition; anything reported as other than `New`/`Used` marks the
    /// component damaged. Report entries naming unknown components are
    /// ignored. The returned lines carry catalog unit values for fine
    /// assessment.
    pub fn apply_condition_report(
        &self,
        id: KitId,
        report: &ConditionReport,
    ) -> Result<Vec<DamageLine>, RentalError> {
        let entry = self.kits.get(&id).ok_or(RentalError::NotFound)?;
        let mut data = entry.lock();
        let mut damage = Vec::new();
        for component in data.components.iter_mut() {
            let Some(&condition) = report.get(&component.name) else {
                continue;
            };
            component.condition = condition;
            if condition == Condition::Damaged {
                damage.push(DamageLine {
                    component: component.name.clone(),
                    count: component.quantity,
                    unit_value: component.unit_value,
                });
            }
        }
        Ok(damage)
    }
}
