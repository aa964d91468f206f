use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jurassic_rt::atmos::{Atm, AtmLevel};
use jurassic_rt::ctl::{AltWindow, Ctl};
use jurassic_rt::formod::run_forward_model;
use jurassic_rt::geokit::GeoPoint;
use jurassic_rt::obs::{Obs, ObsRay};
use jurassic_rt::retrieve;
use jurassic_rt::table::TableStore;

fn truth_atm(n_levels: usize) -> Atm {
    let levels = (0..n_levels)
        .map(|i| {
            let z = i as f64 * 3.0;
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

fn limb_ctl() -> Ctl {
    let mut ctl = Ctl::reference_single_channel(667.5);
    ctl.ng = 1;
    ctl.emitters = vec!["CO2".into()];
    ctl.rayds = 3.0;
    ctl.err_q = vec![ctl.err_q[0]; 1];
    ctl.ret_q = vec![AltWindow::none(); 1];
    ctl.ret_t = AltWindow { zmin: 0.0, zmax: 60.0 };
    ctl.conv_itmax = 10;
    ctl
}

fn bench_retrieval_convergence(c: &mut Criterion) {
    let truth = truth_atm(20);
    let ctl = limb_ctl();
    let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);

    let mut obs = Obs::new();
    for tangent in [0.0, 6.0, 12.0, 18.0, 24.0] {
        obs.rays.push(ObsRay::new(
            0.0,
            GeoPoint::new(800.0, 0.0, 0.0),
            GeoPoint::new(tangent, 0.0, 0.0),
            ctl.nd,
        ));
    }
    run_forward_model(&ctl, &truth, &store, &mut obs);

    let mut apriori = truth.clone();
    for level in &mut apriori.levels {
        level.t += 4.0;
    }

    c.bench_function("retrieve 5-ray limb temperature", |b| {
        b.iter(|| {
            black_box(retrieve(&ctl, &apriori, &obs, &store).expect("retrieval should not error"));
        })
    });
}

criterion_group!(benches, bench_retrieval_convergence);
criterion_main!(benches);
