use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_pcg::Pcg64;

use imu_calib::{
    CalibratedTriad, MultiPosCalibration, MultiPosSettings, TriadSample, static_intervals_detector,
};

const DT: f64 = 0.01;
const GRAVITY: f64 = 9.81;

// Pre-generated capture to keep RNG and trigonometry out of the measured loop
fn generate_capture(orientations: usize, seed: u64) -> Vec<TriadSample> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let triad = CalibratedTriad::new(
        [0.01, -0.006, 0.004, -0.003, 0.008, -0.005],
        [1.02, 0.98, 1.01],
        [0.2, -0.15, 0.3],
    );
    let inverse = triad.combined_matrix().try_inverse().unwrap();

    let mut samples = Vec::new();
    let mut t = 0.0;
    for k in 0..orientations {
        // One gravity direction per rest position, roughly uniform on the sphere
        let direction = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        )
        .normalize();
        let gravity_body = direction * GRAVITY;

        for _ in 0..150 {
            let noise = Vector3::new(
                rng.random_range(-0.003..0.003),
                rng.random_range(-0.003..0.003),
                rng.random_range(-0.003..0.003),
            );
            let raw = inverse * (gravity_body + noise) + triad.bias();
            samples.push(TriadSample::tagged(t, raw, k as i32));
            t += DT;
        }
        for _ in 0..80 {
            samples.push(TriadSample::new(t, Vector3::new(0.5, -0.3, 9.0)));
            t += DT;
        }
    }
    samples
}

/// Benchmark the static interval scan over a tagged capture
fn bench_interval_detection(c: &mut Criterion) {
    let samples: Vec<TriadSample> = generate_capture(20, 7)
        .into_iter()
        .filter(TriadSample::is_tagged)
        .collect();

    c.bench_function("static_intervals_detector", |b| {
        b.iter(|| static_intervals_detector(black_box(&samples)))
    });
}

/// Benchmark a full accelerometer calibration run
fn bench_calibrate_acc(c: &mut Criterion) {
    let samples = generate_capture(20, 11);
    let settings = MultiPosSettings {
        init_samples: 150,
        interval_samples: 100,
        acc_use_means: true,
        init_acc_calibration: Some(CalibratedTriad::default()),
        ..Default::default()
    };

    c.bench_function("calibrate_acc", |b| {
        b.iter(|| {
            let mut calibration = MultiPosCalibration::with_settings(settings.clone());
            calibration
                .calibrate_acc(black_box(&samples))
                .expect("benchmark capture must calibrate");
            calibration
        })
    });
}

criterion_group!(benches, bench_interval_detection, bench_calibrate_acc);
criterion_main!(benches);
