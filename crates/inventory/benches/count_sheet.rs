use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use stockroom_core::{Aggregate, ReconciliationId, SkuId};
use stockroom_inventory::count_sheet;
use stockroom_inventory::{
    ReconciliationCommand, ReconciliationSession, SnapshotLine, StartSession,
};

fn sheet(rows: usize, delimiter: char) -> String {
    let mut out = format!("SKU Code{delimiter}Physical Qty\n");
    for i in 0..rows {
        out.push_str(&format!("TSH-{i:05}-M{delimiter}{}\n", i % 40));
    }
    out
}

fn session(rows: usize) -> ReconciliationSession {
    let id = ReconciliationId::new();
    let mut session = ReconciliationSession::empty(id);
    let snapshot = (0..rows)
        .map(|i| SnapshotLine {
            sku_id: SkuId::new(),
            sku_code: format!("TSH-{i:05}-M"),
            system_qty: 20,
        })
        .collect();
    session
        .execute(&ReconciliationCommand::StartSession(StartSession {
            session_id: id,
            snapshot,
            occurred_at: Utc::now(),
        }))
        .unwrap();
    session
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_sheet_parse");

    for rows in [100usize, 1_000, 10_000] {
        for delimiter in [',', ';'] {
            let input = sheet(rows, delimiter);
            group.throughput(Throughput::Bytes(input.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("delimiter_{delimiter}"), rows),
                &input,
                |b, input| b.iter(|| count_sheet::parse(black_box(input.as_bytes())).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("count_sheet_match");

    for rows in [1_000usize, 10_000] {
        let session = session(rows);
        // Lowercased so every lookup goes through normalization.
        let parsed = count_sheet::parse(sheet(rows, ',').to_lowercase().as_bytes()).unwrap();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &parsed, |b, parsed| {
            b.iter(|| session.match_count_rows(black_box(&parsed.rows)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_match);
criterion_main!(benches);
