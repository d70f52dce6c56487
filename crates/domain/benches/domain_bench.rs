use chrono::Utc;
use common::{Money, ProductType};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{CatalogService, CreateOrder, LineRequest, OrderService, batches, generate_reference};
use store::{InMemoryDatabase, NewCategory, NewProduct};

fn seed(rt: &tokio::runtime::Runtime, db: &InMemoryDatabase) -> common::ProductId {
    rt.block_on(async {
        let catalog = CatalogService::new(db.clone());
        let category = catalog
            .create_category(NewCategory {
                name: "Bench".to_string(),
                parent_id: None,
                shop_id: Some("bench".to_string()),
            })
            .await
            .unwrap();
        catalog
            .create_product(NewProduct {
                name: "Widget".to_string(),
                description: None,
                wholesale_price: Money::from_minor(500),
                retail_price: Money::from_minor(1000),
                category_id: category.id,
                product_image: None,
                product_type: ProductType::Goods,
                stock: 1_000_000,
            })
            .await
            .unwrap()
            .id
    })
}

fn bench_reference(c: &mut Criterion) {
    let now = Utc::now();
    c.bench_function("domain/generate_reference", |b| {
        b.iter(|| generate_reference(std::hint::black_box(&now)));
    });
}

fn bench_batching(c: &mut Criterion) {
    let rows: Vec<u64> = (0..12_001).collect();
    c.bench_function("domain/batches_12001", |b| {
        b.iter(|| batches(std::hint::black_box(&rows), 6000).count());
    });
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("domain/create_order");

    for lines in [1usize, 100, 1000] {
        let db = InMemoryDatabase::new();
        let product_id = seed(&rt, &db);
        let service = OrderService::new(db);

        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, &lines| {
            b.iter(|| {
                rt.block_on(async {
                    let cmd = CreateOrder::new("bench", "Bench", "bench@example.com", "")
                        .with_items((0..lines).map(|_| LineRequest::new(product_id, 2)));
                    service.create_order(cmd).await.unwrap();
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reference, bench_batching, bench_create_order);
criterion_main!(benches);
