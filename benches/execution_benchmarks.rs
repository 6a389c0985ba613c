//! Performance benchmarks for execution engine fan-out and result reconciliation

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shardcore::executor::{
    fn_callback, ExecutionGroup, ExecutionGroupContext, ExecutionUnit, ExecutorCallback,
    ExecutorEngine, ProcessRegistry,
};
use shardcore::session::{QueryContext, SqlStatementContext};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Units spread round-robin over `sources` data sources
fn create_units(count: usize, sources: usize) -> Vec<ExecutionUnit> {
    (0..count)
        .map(|i| {
            ExecutionUnit::new(
                format!("ds_{}", i % sources),
                format!("UPDATE t_order_{} SET status = 'paid'", i),
            )
        })
        .collect()
}

fn update_callback() -> Arc<dyn ExecutorCallback<Option<i64>>> {
    Arc::new(fn_callback(|_unit: ExecutionUnit| async move {
        tokio::task::yield_now().await;
        Ok::<_, anyhow::Error>(Some(1))
    }))
}

fn bench_engine_fan_out(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let processes = ProcessRegistry::new();
    let query = QueryContext::new(
        SqlStatementContext::update(&["t_order"]),
        "UPDATE t_order SET status = 'paid'",
        "sharding_db",
    );
    let callback = update_callback();

    let mut group = c.benchmark_group("engine_fan_out");
    group
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5));

    for (units, sources) in [(8, 2), (64, 8), (256, 16)] {
        let groups = ExecutionGroup::partition(create_units(units, sources), 1);
        let context = ExecutionGroupContext::new(groups, "bench");

        for concurrency in [1, 16] {
            let engine = ExecutorEngine::new(concurrency);
            group.bench_with_input(
                BenchmarkId::new(format!("{}_units_{}_sources", units, sources), concurrency),
                &context,
                |b, context| {
                    b.to_async(&rt).iter(|| async {
                        let guard = processes.begin(context, &query);
                        let results = engine
                            .execute(context, guard.process(), callback.clone())
                            .await
                            .unwrap();
                        black_box(results);
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    c.benchmark_group("partition")
        .bench_function("1024_units_32_sources", |b| {
            b.iter(|| {
                let groups = ExecutionGroup::partition(create_units(1024, 32), 4);
                black_box(groups);
            });
        });
}

criterion_group!(benches, bench_engine_fan_out, bench_partition);
criterion_main!(benches);
