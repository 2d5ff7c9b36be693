//! Line queries over a posted book.
//!
//! Posts a small history through the engine and exercises the filter
//! surface against what actually landed: ordering, per-field
//! predicates, inclusive bounds, and tenant scoping.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use tally_core::definition::{AccountSpec, Definition};
use tally_core::engine::Ledger;
use tally_core::execution::EntryParams;
use tally_db::{LineFilter, MemStore};
use tally_shared::{Currency, EntityRef, Ident, LockingConfig, Money};

fn definition() -> Arc<Definition> {
    let definition = Definition::configure(|cfg| {
        cfg.tenant("portfolio", "CLP", |t| {
            t.account(AccountSpec::asset("cash"))?;
            t.account(AccountSpec::liability("payable"))?;
            t.entry("deposit", "receipt", |e| {
                e.debit("cash", None)?;
                e.credit("payable", Some("user"))?;
                Ok(())
            })?;
            t.entry("withdrawal", "payout", |e| {
                e.debit("payable", Some("user"))?;
                e.credit("cash", None)?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    Arc::new(definition)
}

fn ident(raw: &str) -> Ident {
    Ident::new(raw).unwrap()
}

fn portfolio(id: u128) -> EntityRef {
    EntityRef::of("portfolio", Uuid::from_u128(id)).unwrap()
}

fn user(id: u128) -> EntityRef {
    EntityRef::of("user", Uuid::from_u128(id)).unwrap()
}

fn clp(amount: Decimal) -> Money {
    Money::new(amount, Currency::new("CLP").unwrap())
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, hour, 0, 0).unwrap()
}

fn params(
    tenant: u128,
    entry: &str,
    kind: &str,
    document: u128,
    posted_at: DateTime<Utc>,
) -> EntryParams {
    EntryParams::new(
        portfolio(tenant),
        ident(entry),
        EntityRef::of(kind, Uuid::from_u128(document)).unwrap(),
        posted_at,
    )
}

/// A portfolio book with two deposits and one withdrawal:
///
/// - 09:00 deposit 100, split to user 1
/// - 10:00 deposit 250, split to user 2
/// - 11:00 withdrawal 40, split to user 1
fn posted_book() -> MemStore {
    let store = MemStore::new();
    let ledger = Ledger::new(definition(), store.clone(), LockingConfig::default());

    ledger
        .execute(&params(1, "deposit", "receipt", 1, at(9)), |m| {
            m.debit("cash", None, clp(dec!(100)))?;
            m.credit("payable", Some(user(1)), clp(dec!(100)))?;
            Ok(())
        })
        .unwrap();
    ledger
        .execute(&params(1, "deposit", "receipt", 2, at(10)), |m| {
            m.debit("cash", None, clp(dec!(250)))?;
            m.credit("payable", Some(user(2)), clp(dec!(250)))?;
            Ok(())
        })
        .unwrap();
    ledger
        .execute(&params(1, "withdrawal", "payout", 3, at(11)), |m| {
            m.debit("payable", Some(user(1)), clp(dec!(40)))?;
            m.credit("cash", None, clp(dec!(40)))?;
            Ok(())
        })
        .unwrap();

    store
}

#[test]
fn lines_come_back_newest_first() {
    let store = posted_book();

    let lines = store.lines(&LineFilter::new()).unwrap();
    let stamps: Vec<DateTime<Utc>> = lines.iter().map(|line| line.posted_at).collect();
    assert_eq!(stamps, vec![at(11), at(11), at(10), at(10), at(9), at(9)]);
}

#[test]
fn entry_code_and_account_predicates_conjoin() {
    let store = posted_book();

    let filter = LineFilter::new()
        .entry_code(ident("deposit"))
        .account(ident("cash"));
    let lines = store.lines(&filter).unwrap();
    let amounts: Vec<Decimal> = lines.iter().map(|line| line.amount).collect();
    assert_eq!(amounts, vec![dec!(250), dec!(100)]);
}

#[test]
fn accountable_predicate_keeps_only_that_entity_split() {
    let store = posted_book();

    let lines = store
        .lines(&LineFilter::new().accountable(user(1)))
        .unwrap();

    // the cash legs are unsplit and never match an accountable filter
    assert_eq!(lines.len(), 2);
    assert!(lines
        .iter()
        .all(|line| line.account.name.as_str() == "payable"));
    let amounts: Vec<Decimal> = lines.iter().map(|line| line.amount).collect();
    assert_eq!(amounts, vec![dec!(-40), dec!(100)]);
}

#[test]
fn posting_window_bounds_are_inclusive() {
    let store = posted_book();

    let filter = LineFilter::new()
        .posted_at_or_after(at(10))
        .posted_at_or_before(at(10));
    let lines = store.lines(&filter).unwrap();

    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.posted_at == at(10)));
    assert!(lines
        .iter()
        .all(|line| line.document == EntityRef::of("receipt", Uuid::from_u128(2)).unwrap()));
}

#[test]
fn amount_bounds_separate_growth_from_shrink() {
    let store = posted_book();

    let growth = store
        .lines(&LineFilter::new().amount_at_least(dec!(0)))
        .unwrap();
    assert_eq!(growth.len(), 4);
    assert!(growth.iter().all(|line| line.amount > Decimal::ZERO));

    let shrink = store
        .lines(&LineFilter::new().amount_at_most(dec!(0)))
        .unwrap();
    assert_eq!(shrink.len(), 2);
    assert!(shrink.iter().all(|line| line.amount == dec!(-40)));
    assert!(shrink
        .iter()
        .all(|line| line.entry_code == ident("withdrawal")));
}

#[test]
fn tenant_predicate_scopes_books_apart() {
    let store = posted_book();
    let ledger = Ledger::new(definition(), store.clone(), LockingConfig::default());

    // a second portfolio posts into the same store
    ledger
        .execute(&params(2, "deposit", "receipt", 9, at(12)), |m| {
            m.debit("cash", None, clp(dec!(77)))?;
            m.credit("payable", Some(user(3)), clp(dec!(77)))?;
            Ok(())
        })
        .unwrap();

    let second = store
        .lines(&LineFilter::new().tenant(portfolio(2)))
        .unwrap();
    assert_eq!(second.len(), 2);
    assert!(second
        .iter()
        .all(|line| line.account.tenant == portfolio(2) && line.amount == dec!(77)));

    let first = store
        .lines(&LineFilter::new().tenant(portfolio(1)))
        .unwrap();
    assert_eq!(first.len(), 6);
}
