//! Properties 3 and 4, and scenario E3: limb ray tangent
//! behavior, layer emissivity/transmittance bounds, and ray symmetry.

use jurassic_rt::atmos::{Atm, AtmLevel};
use jurassic_rt::ctl::Ctl;
use jurassic_rt::geokit::GeoPoint;
use jurassic_rt::raytracer::trace_ray;

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
    ctl.rayds = 2.0;
    ctl
}

#[test]
fn property3_limb_ray_descends_to_a_tangent_then_rises() {
    let atm = climatology(70);
    let ctl = reference_ctl();
    let obs = GeoPoint::new(800.0, -30.0, 0.0);
    let vp = GeoPoint::new(20.0, 0.0, 0.0);
    let los = trace_ray(&atm, &ctl, obs, vp);

    assert!(!los.hit_surface);
    let zs: Vec<f64> = los.points.iter().map(|p| p.geo.z).collect();
    let min_idx = zs
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap();

    assert!(zs[..min_idx].windows(2).all(|w| w[0] >= w[1] - 1e-6), "not monotone descending before tangent");
    assert!(zs[min_idx..].windows(2).all(|w| w[1] >= w[0] - 1e-6), "not monotone ascending after tangent");

    let tangent_z = los.tangent_altitude();
    assert!((tangent_z - zs[min_idx]).abs() <= ctl.raydz.max(ctl.rayds));
}

#[test]
fn property4_every_segment_transmittance_is_bounded() {
    use jurassic_rt::bandrt::synthesize_ray;
    use jurassic_rt::table::TableStore;

    let atm = climatology(60);
    let ctl = reference_ctl();
    let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
    let obs = GeoPoint::new(800.0, 0.0, 0.0);
    let vp = GeoPoint::new(0.0, 0.0, 0.0);
    let mut los = trace_ray(&atm, &ctl, obs, vp);
    synthesize_ray(&ctl, &atm, &store, &mut los, 0.0, 0.0, 0.0);

    for point in &los.points {
        for &eps in &point.eps {
            assert!((0.0..=1.0).contains(&eps), "eps out of bounds: {eps}");
        }
    }
}

#[test]
fn e3_symmetric_limb_geometry_produces_mirrored_tangent() {
    let atm = climatology(70);
    let ctl = reference_ctl();

    let obs_a = GeoPoint::new(800.0, -30.0, 0.0);
    let vp_a = GeoPoint::new(20.0, 0.0, 0.0);
    let los_a = trace_ray(&atm, &ctl, obs_a, vp_a);

    let obs_b = GeoPoint::new(800.0, 30.0, 0.0);
    let vp_b = GeoPoint::new(20.0, 0.0, 0.0);
    let los_b = trace_ray(&atm, &ctl, obs_b, vp_b);

    assert!((los_a.tangent_altitude() - los_b.tangent_altitude()).abs() < 0.5);
}
