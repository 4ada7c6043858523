//! Document commit benchmarks.
//!
//! Run with: cargo bench -p stockledger-movement

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockledger_core::{AllocationLine, BalanceKey, CostingMethod, PendingAllocation};
use stockledger_movement::{
    Document, DocumentLine, DocumentType, ItemProfile, ReceiptRequest, StaticItemMaster,
    StockLedger,
};
use stockledger_store::MemoryStore;

/// A ledger with `locations` stocked locations of one FIFO item.
fn stocked(locations: usize) -> StockLedger<MemoryStore> {
    let ledger = StockLedger::new(
        MemoryStore::new(),
        StaticItemMaster::new().with_item(ItemProfile::new("STOCK", CostingMethod::Fifo)),
    );
    for i in 0..locations {
        ledger
            .apply_receipt(
                ReceiptRequest::new(BalanceKey::new("STOCK", format!("L{i}")), dec!(1000000))
                    .with_unit_cost(dec!(10) + Decimal::from(i)),
            )
            .unwrap();
    }
    ledger
}

/// A delivery with one line picking one unit from each location.
fn delivery(locations: usize) -> Document {
    let allocation: PendingAllocation = (0..locations)
        .map(|i| AllocationLine::new(format!("L{i}"), dec!(1)))
        .collect();
    Document::new("GD-BENCH", DocumentType::GoodsDelivery).with_line(
        DocumentLine::new(1, "STOCK", Decimal::from(locations)).with_allocation(allocation),
    )
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_document");

    for size in [1, 10, 100] {
        let ledger = stocked(size);
        let document = delivery(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &document, |b, doc| {
            b.iter(|| black_box(ledger.validate(doc).unwrap()));
        });
    }

    group.finish();
}

fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_document");

    for size in [1, 10, 100] {
        let ledger = stocked(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let mut document = delivery(size);
                black_box(ledger.commit(&mut document).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_commit);
criterion_main!(benches);
