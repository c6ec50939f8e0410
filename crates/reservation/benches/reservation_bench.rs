use criterion::{Criterion, criterion_group, criterion_main};
use reservation::{OrderId, ReservationService, ReserveRequest};
use stock_store::{GoodsItem, InMemoryStockStore};

fn seeded_service(items: i32, quantity: i32) -> ReservationService<InMemoryStockStore> {
    ReservationService::new(InMemoryStockStore::with_goods(
        (1..=items).map(|id| GoodsItem::new(id, quantity)),
    ))
}

fn batch_request(order: &str, items: i32) -> ReserveRequest {
    (1..=items).fold(ReserveRequest::new(order), |request, id| {
        request.item(id.to_string(), 1)
    })
}

fn bench_reserve_unreserve_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = seeded_service(1, 1_000_000);
    let request = batch_request("bench", 1);
    let order = OrderId::new("bench");

    c.bench_function("reservation/reserve_unreserve_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.reserve_goods_for_order(&request).await.unwrap();
                service.unreserve_goods_for_order(&order).await.unwrap();
            });
        });
    });
}

fn bench_reserve_unreserve_batch_20(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = seeded_service(20, 1_000_000);
    let request = batch_request("bench", 20);
    let order = OrderId::new("bench");

    c.bench_function("reservation/reserve_unreserve_batch_20", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.reserve_goods_for_order(&request).await.unwrap();
                service.unreserve_goods_for_order(&order).await.unwrap();
            });
        });
    });
}

fn bench_rejected_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = seeded_service(20, 0);
    let request = batch_request("bench", 20);

    c.bench_function("reservation/rejected_reserve_batch_20", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = service.reserve_goods_for_order(&request).await;
                assert!(result.is_err());
            });
        });
    });
}

fn bench_check_status(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = seeded_service(20, 1_000);
    let order = OrderId::new("bench");

    rt.block_on(async {
        service
            .reserve_goods_for_order(&batch_request("bench", 20))
            .await
            .unwrap();
    });

    c.bench_function("reservation/check_order_reserve", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.check_order_reserve(&order).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reserve_unreserve_single,
    bench_reserve_unreserve_batch_20,
    bench_rejected_reserve,
    bench_check_status,
);
criterion_main!(benches);
