//! Benchmark suite for the temperature analysis kernels
//!
//! Run with: `cargo bench --package rumenkernel-temporal`

use std::f64::consts::PI;
use std::hint::black_box;

use chrono::{Duration, NaiveDate};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rumenkernel_core::config::PipelineConfig;
use rumenkernel_temporal::{
    AnimalDayPipeline, AnimalSeries, ArtifactCorrection, CorrectionParams, CosinorFitting,
    DetectionParams, DrinkEventDetection, FitSettings, PercentileExtraction, TemperatureSample,
};

/// `days` of 5-minute readings with a daily rhythm and a drink every 4 hours.
fn create_series(days: usize) -> Vec<TemperatureSample> {
    let start = NaiveDate::from_ymd_opt(2023, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..days * 288)
        .map(|i| {
            let t = i as f64 * 5.0 / 60.0;
            let mut v = 38.8 + 0.4 * (2.0 * PI * t / 24.0 + 0.7).cos();
            v -= match i % 48 {
                20 => 2.5,
                21 => 5.0,
                22 => 3.3,
                23 => 1.7,
                _ => 0.0,
            };
            TemperatureSample::new(start + Duration::minutes(5 * i as i64), v)
        })
        .collect()
}

fn correction_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal/artifact-correction");
    let params = CorrectionParams::default();

    for days in [1usize, 7, 30].iter() {
        let samples = create_series(*days);
        group.throughput(Throughput::Elements(samples.len() as u64));
        group.bench_with_input(BenchmarkId::new("days", days), days, |b, _| {
            b.iter(|| ArtifactCorrection::compute(black_box(&samples), black_box(&params)))
        });
    }

    group.finish();
}

fn cosinor_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("circadian/cosinor-fit");
    let settings = FitSettings::default();
    let samples = create_series(1);
    let times: Vec<f64> = samples.iter().map(|s| s.hour_of_day()).collect();
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();

    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("one_day", |b| {
        b.iter(|| CosinorFitting::compute(black_box(&times), black_box(&values), &settings))
    });
    group.bench_function("percentiles", |b| {
        b.iter(|| {
            PercentileExtraction::compute(
                black_box(&values),
                &[0.01, 0.05, 0.10, 0.20, 0.30, 0.40, 0.45],
            )
        })
    });

    group.finish();
}

fn detection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("behaviour/drink-detection");
    let params = DetectionParams::default();

    for days in [1usize, 7, 30].iter() {
        let samples = create_series(*days);
        group.throughput(Throughput::Elements(samples.len() as u64));
        group.bench_with_input(BenchmarkId::new("days", days), days, |b, _| {
            b.iter(|| DrinkEventDetection::compute(black_box(&samples), &params, "S0001"))
        });
    }

    group.finish();
}

fn pipeline_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/animal-day");
    let config = PipelineConfig::default();
    let series = AnimalSeries::new("S0001", create_series(30));

    group.throughput(Throughput::Elements(series.len() as u64));
    group.bench_function("30_days", |b| {
        b.iter(|| AnimalDayPipeline::compute(black_box(&series), &config))
    });

    group.finish();
}

criterion_group!(
    benches,
    correction_benchmark,
    cosinor_benchmark,
    detection_benchmark,
    pipeline_benchmark
);
criterion_main!(benches);
