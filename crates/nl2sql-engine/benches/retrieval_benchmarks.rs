//! Benchmarks for table ranking
//!
//! Measures ranking cost against stores holding N tables with the local
//! hashing embedder.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nl2sql_core::ColumnMetadata;
use nl2sql_engine::SemanticRetriever;
use nl2sql_model::HashingEmbedder;
use nl2sql_store::MetadataStore;
use std::sync::Arc;

const SUBJECTS: [&str; 8] = [
    "employee attendance", "warehouse inventory", "customer orders", "supplier invoices",
    "payroll runs", "shipment tracking", "product reviews", "store visits",
];

fn populated_store(num_tables: usize) -> MetadataStore {
    let store = MetadataStore::open_in_memory().unwrap();
    store.initialize().unwrap();

    let mut rows = Vec::with_capacity(num_tables * 3);
    for i in 0..num_tables {
        let intent = format!("Records {} for region {}", SUBJECTS[i % SUBJECTS.len()], i);
        for column in ["id", "created_at", "amount"] {
            rows.push(
                ColumnMetadata::new("bench.db", format!("table_{i}"), column, "INTEGER")
                    .with_intents(&intent, ""),
            );
        }
    }
    store.insert(&rows).unwrap();
    store
}

fn bench_rank(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let retriever = SemanticRetriever::new(Arc::new(HashingEmbedder::new(512).unwrap()));
    let mut group = c.benchmark_group("rank_tables");

    for size in [10, 100, 1000] {
        let store = populated_store(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| {
                runtime
                    .block_on(retriever.top_tables(store, black_box("how many orders did customers place"), 4))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
