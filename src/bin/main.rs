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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rental_ledger_rs::{
    Amount, Component, Condition, ConditionReport, Engine, EngineConfig, FineId, KitId, KitSpec,
    OwnerId, RefundDecision, RefundId, RentalError, RentalId, RentalPeriod,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Rental Ledger - replay rental operations from CSV files
///
/// Loads a kit catalog, replays an operations CSV (deposits, rentals,
/// approvals, returns, refunds, fine payments) against a fresh engine, and
/// writes per-owner wallet balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "rental-ledger-rs")]
#[command(about = "An equipment-rental engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to the kit catalog CSV
    ///
    /// Expected format: kit,category,daily_price,quantity,component,count,unit_value
    /// (one row per component; component columns may be empty)
    #[arg(long, value_name = "FILE")]
    kits: PathBuf,

    /// Path to the operations CSV
    ///
    /// Expected format: op,user,kit,start,end,amount,reference,note
    #[arg(value_name = "FILE")]
    ops: PathBuf,

    /// Charge and approve rentals on creation, skipping staff review
    #[arg(long)]
    no_approval: bool,

    /// Days between fine assessment and due date
    #[arg(long, default_value_t = 14)]
    fine_due_days: u64,

    /// Write the full transaction journal to stderr after the replay
    #[arg(long)]
    audit: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let engine = Engine::with_config(EngineConfig {
        require_approval: !args.no_approval,
        fine_due_days: args.fine_due_days,
    });

    if let Err(e) = load_kits(&engine, &args.kits) {
        eprintln!("Error loading kit catalog '{}': {}", args.kits.display(), e);
        process::exit(1);
    }

    let file = match File::open(&args.ops) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.ops.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = replay_operations(&engine, BufReader::new(file)) {
        eprintln!("Error replaying operations: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_balances(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    if args.audit {
        for tx in engine_audit(&engine) {
            eprintln!("{}", tx);
        }
    }
}

/// Raw catalog row. One row per component; kit header fields repeat.
#[derive(Debug, Deserialize)]
struct KitRecord {
    kit: u32,
    category: String,
    daily_price: i64,
    quantity: u32,
    component: Option<String>,
    count: Option<u32>,
    unit_value: Option<i64>,
}

/// Reads the catalog CSV and registers every kit with the engine.
fn load_kits(engine: &Engine, path: &PathBuf) -> Result<(), csv::Error> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(BufReader::new(file));

    // Group component rows by kit id, preserving first-seen header fields.
    let mut specs: HashMap<u32, KitSpec> = HashMap::new();
    for result in rdr.deserialize::<KitRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed catalog row: {e}");
                continue;
            }
        };
        let spec = specs.entry(record.kit).or_insert_with(|| KitSpec {
            id: KitId(record.kit),
            category: record.category.clone(),
            daily_price: Amount(record.daily_price),
            quantity: record.quantity,
            components: Vec::new(),
        });
        if let (Some(name), Some(count), Some(unit_value)) =
            (record.component, record.count, record.unit_value)
        {
            spec.components.push(Component {
                name,
                quantity: count,
                condition: Condition::New,
                unit_value: Amount(unit_value),
            });
        }
    }

    for (_, spec) in specs {
        engine.add_kit(spec);
    }
    Ok(())
}

/// Raw operations row.
///
/// Fields: `op, user, kit, start, end, amount, reference, note`
#[derive(Debug, Deserialize)]
struct OpRecord {
    op: String,
    user: Option<u32>,
    kit: Option<u32>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    amount: Option<i64>,
    /// Rental, refund, or fine id, depending on the op.
    reference: Option<u64>,
    note: Option<String>,
}

impl OpRecord {
    fn apply(self, engine: &Engine) -> Option<Result<(), RentalError>> {
        let result = match self.op.to_lowercase().as_str() {
            "deposit" => engine
                .deposit_to_wallet(OwnerId(self.user?), Amount(self.amount?))
                .map(|_| ()),
            "rent" => engine
                .create_rental_request(
                    OwnerId(self.user?),
                    KitId(self.kit?),
                    RentalPeriod {
                        start: self.start?,
                        end: self.end?,
                    },
                    self.note.unwrap_or_default(),
                )
                .map(|_| ()),
            "approve" => engine
                .approve_rental_request(RentalId(self.reference?), OwnerId(self.user?))
                .map(|_| ()),
            "reject" => engine
                .reject_rental_request(
                    RentalId(self.reference?),
                    OwnerId(self.user?),
                    self.note.unwrap_or_default(),
                )
                .map(|_| ()),
            "activate" => engine
                .activate_rental_request(RentalId(self.reference?))
                .map(|_| ()),
            "cancel" => engine
                .cancel_rental_request(RentalId(self.reference?))
                .map(|_| ()),
            "return" => {
                let report = parse_condition_report(self.note.as_deref().unwrap_or(""))?;
                engine
                    .return_kit(RentalId(self.reference?), &report)
                    .map(|_| ())
            }
            "refund-request" => engine
                .create_refund_request(RentalId(self.reference?), self.note.unwrap_or_default())
                .map(|_| ()),
            "refund-approve" => engine
                .inspect_refund_request(
                    RefundId(self.reference?),
                    RefundDecision::Approve {
                        final_amount: Amount(self.amount?),
                    },
                    None,
                )
                .map(|_| ()),
            "refund-reject" => engine
                .inspect_refund_request(
                    RefundId(self.reference?),
                    RefundDecision::Reject {
                        reason: self.note.unwrap_or_default(),
                    },
                    None,
                )
                .map(|_| ()),
            "pay-fine" => engine
                .pay_fine(FineId(self.reference?), OwnerId(self.user?))
                .map(|_| ()),
            _ => return None,
        };
        Some(result)
    }
}

/// Parses `name=condition;name=condition` into a condition report.
///
/// Returns `None` on an unknown condition word; an empty string is an empty
/// report (everything came back fine).
fn parse_condition_report(encoded: &str) -> Option<ConditionReport> {
    let mut report = ConditionReport::new();
    for pair in encoded.split(';').filter(|p| !p.is_empty()) {
        let (name, condition) = pair.split_once('=')?;
        let condition = match condition.trim().to_lowercase().as_str() {
            "new" => Condition::New,
            "used" => Condition::Used,
            "damaged" => Condition::Damaged,
            _ => return None,
        };
        report.insert(name.trim().to_string(), condition);
    }
    Some(report)
}

/// Replays operations from a CSV reader against the engine.
///
/// Streaming parse; malformed rows and failed operations are skipped with a
/// warning so one bad row never aborts the batch.
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn replay_operations<R: Read>(engine: &Engine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<OpRecord>() {
        match result {
            Ok(record) => {
                let op = record.op.clone();
                match record.apply(engine) {
                    Some(Ok(())) => {}
                    Some(Err(e)) => warn!(%op, error = %e, "operation failed"),
                    None => warn!(%op, "skipping invalid operation record"),
                }
            }
            Err(e) => {
                warn!("skipping malformed row: {e}");
                continue;
            }
        }
    }
    Ok(())
}

/// Writes per-owner wallet balances as CSV.
///
/// Columns: `owner, balance`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_balances<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["owner", "balance"])?;
    for owner in engine.owners() {
        wtr.write_record([owner.to_string(), engine.get_balance(owner).to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One journal line per transaction, in append order.
fn engine_audit(engine: &Engine) -> Vec<String> {
    engine
        .audit_journal()
        .iter()
        .map(|tx| {
            format!(
                "{} owner={} kind={:?} amount={} status={:?}",
                tx.id, tx.owner, tx.kind, tx.amount, tx.status
            )
        })
        .collect()
}
