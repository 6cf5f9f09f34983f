use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo::{Polygon, Rect};
use h3_country_cells::*;

fn square(center_lng: f64, center_lat: f64, size: f64) -> Polygon<f64> {
    let half = size / 2.0;
    Rect::new(
        (center_lng - half, center_lat - half),
        (center_lng + half, center_lat + half),
    )
    .to_polygon()
}

fn bench_tile(c: &mut Criterion) {
    let polygon = square(2.35, 48.85, 2.0);

    let mut group = c.benchmark_group("tile");
    for res in [4u8, 6, 8] {
        group.bench_function(format!("square_2deg_res_{}", res), |b| {
            b.iter(|| tile(black_box(&polygon), black_box(res)))
        });
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut polygons = CountryPolygons::new();
    for (i, lng) in [-60.0, -20.0, 10.0, 40.0, 80.0, 120.0].iter().enumerate() {
        let code = CountryCode::parse_alpha3(&format!("A{}A", (b'A' + i as u8) as char)).unwrap();
        polygons.insert(code, vec![square(*lng, 10.0, 5.0), square(*lng, -10.0, 3.0)]);
    }

    c.bench_function("aggregate_6_countries_res_5", |b| {
        b.iter(|| aggregate(black_box(&polygons), &[5], AggregateOptions::default()))
    });
}

criterion_group!(benches, bench_tile, bench_aggregate);
criterion_main!(benches);
