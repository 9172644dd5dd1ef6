//! Route resolution throughput: client model id lookup against the
//! route table and provider/protocol allow-list fallback.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nexus_gateway::catalog::Catalog;
use nexus_gateway::router::{Protocol, Router};
use nexus_gateway::store::ModelRoute;

fn sample_routes() -> Vec<ModelRoute> {
    (0..50)
        .map(|i| ModelRoute {
            id: i,
            client_model: format!("custom-model-{i}"),
            target_provider: "openrouter".to_string(),
            target_model: format!("vendor/model-{i}"),
            is_active: true,
            created_at: 0,
        })
        .collect()
}

fn bench_resolve_hit(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::load());
    let router = Router::new(sample_routes(), catalog);

    c.bench_function("router::resolve (route table hit)", |b| {
        b.iter(|| black_box(router.resolve(black_box("custom-model-25"), Protocol::OpenAi)));
    });
}

fn bench_resolve_passthrough(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::load());
    let router = Router::new(sample_routes(), catalog);

    c.bench_function("router::resolve (no route, passthrough)", |b| {
        b.iter(|| black_box(router.resolve(black_box("gpt-4o"), Protocol::OpenAi)));
    });
}

criterion_group!(benches, bench_resolve_hit, bench_resolve_passthrough);
criterion_main!(benches);
