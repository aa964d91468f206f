use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jurassic_rt::atmos::{Atm, AtmLevel};
use jurassic_rt::bandrt::synthesize_ray;
use jurassic_rt::ctl::Ctl;
use jurassic_rt::geokit::GeoPoint;
use jurassic_rt::raytracer::trace_ray;
use jurassic_rt::table::TableStore;

fn climatology(n_levels: usize) -> Atm {
    let levels = (0..n_levels)
        .map(|i| {
            let z = i as f64;
            AtmLevel {
                time: 0.0,
                z,
                lon: 0.0,
                lat: 0.0,
                p: 1013.25 * (-z / 7.0).exp(),
                t: 288.0 - 6.5 * z.min(11.0) + 0.5 * (z - 11.0).max(0.0),
                q: vec![400e-6],
                k: vec![0.0],
            }
        })
        .collect();
    Atm {
        levels,
        clz: 0.0,
        cldz: 1.0,
        clk: vec![0.0],
        sft: 288.0,
        sfeps: vec![0.98],
    }
}

fn reference_ctl() -> Ctl {
    let mut ctl = Ctl::reference_single_channel(667.5);
    ctl.ng = 1;
    ctl.emitters = vec!["CO2".into()];
    ctl.rayds = 1.0;
    ctl
}

fn bench_nadir_raytrace(c: &mut Criterion) {
    let atm = climatology(60);
    let ctl = reference_ctl();
    c.bench_function("trace_ray nadir 60 levels", |b| {
        b.iter(|| {
            let obs = GeoPoint::new(800.0, 0.0, 0.0);
            let vp = GeoPoint::new(0.0, 0.0, 0.0);
            black_box(trace_ray(&atm, &ctl, obs, vp));
        })
    });
}

fn bench_limb_raytrace(c: &mut Criterion) {
    let atm = climatology(60);
    let ctl = reference_ctl();
    c.bench_function("trace_ray limb 60 levels", |b| {
        b.iter(|| {
            let obs = GeoPoint::new(800.0, -30.0, 0.0);
            let vp = GeoPoint::new(20.0, 0.0, 0.0);
            black_box(trace_ray(&atm, &ctl, obs, vp));
        })
    });
}

fn bench_synthesize_ray(c: &mut Criterion) {
    let atm = climatology(60);
    let ctl = reference_ctl();
    let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
    let obs = GeoPoint::new(800.0, 0.0, 0.0);
    let vp = GeoPoint::new(0.0, 0.0, 0.0);
    c.bench_function("synthesize_ray nadir 60 levels", |b| {
        b.iter(|| {
            let mut los = trace_ray(&atm, &ctl, obs, vp);
            black_box(synthesize_ray(&ctl, &atm, &store, &mut los, 0.0, 0.0, 0.0));
        })
    });
}

criterion_group!(benches, bench_nadir_raytrace, bench_limb_raytrace, bench_synthesize_ray);
criterion_main!(benches);
