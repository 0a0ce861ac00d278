use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tablero::buckets::default_weeks;
use tablero::coerce::parse_number;
use tablero::report::finanzas;
use tablero::*;

const ASESORES: [&str; 6] = ["Ana", "Luis", "Rosa", "Carlos", "Maria", "Jorge"];
const CARTERAS: [&str; 4] = ["A", "B", "C", "D"];

fn sheet(size: usize) -> Dataset {
    let rows = (0..size)
        .map(|i| {
            let venta = 100.0 + (i % 97) as f64 * 3.25;
            let igv = venta * 0.18;
            let asesor = if i % 50 == 49 {
                ColumnValue::Missing
            } else {
                ColumnValue::text(ASESORES[i % ASESORES.len()])
            };
            vec![
                asesor,
                ColumnValue::text(format!("Campana {}", i % 3)),
                ColumnValue::text(CARTERAS[i % CARTERAS.len()]),
                ColumnValue::text(format!("Empresa {}", i % 40)),
                ColumnValue::text(format!("{:02}/01/2026", 1 + i % 31)),
                ColumnValue::Number(venta),
                // amounts typed by hand arrive as text
                if i % 5 == 0 {
                    ColumnValue::text(format!("S/ {:.2}", igv))
                } else {
                    ColumnValue::Number(igv)
                },
                ColumnValue::Number(venta + igv),
                ColumnValue::text(if i % 4 == 0 { "PENDIENTE" } else { "PAGADO" }),
                ColumnValue::text(format!("F001-{}", i)),
            ]
        })
        .collect();
    Dataset::from_rows("finanzas", &finanzas::DETAIL_COLUMNS, rows).unwrap()
}

fn bench_parse_number(c: &mut Criterion) {
    let inputs = ["1234.5", "S/ 1,234.50", "1.234,50", "(1,200.00)", "N/A"];
    c.bench_function("parse_number", |b| {
        b.iter(|| {
            for s in inputs.iter() {
                black_box(parse_number(black_box(s)));
            }
        });
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [100, 1000, 10000].iter() {
        let ds = sheet(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                aggregate(
                    black_box(&ds),
                    &["ASESOR"],
                    &[Metric::sum("MONTO"), Metric::count_distinct("CARTERA")],
                )
                .unwrap()
                .top_n("MONTO", 15)
                .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_bucket_by_week(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_by_week");
    let weeks = default_weeks();

    for size in [100, 1000, 10000].iter() {
        let ds = sheet(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                bucket_by_week(black_box(&ds), "FECHA_DE_PAGO", &weeks, &[], &[Metric::sum("MONTO")]).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_finanzas_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("finanzas_report");
    let config = Config::default();

    for size in [100, 1000, 10000].iter() {
        let ds = finanzas::prepare(&sheet(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| finanzas::build(black_box(&ds), &config));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_number,
    bench_aggregate,
    bench_bucket_by_week,
    bench_finanzas_report,
);

criterion_main!(benches);
