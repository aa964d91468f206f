//! `jrt`: demo CLI driving the forward model and retrieval over a built-in
//! reference scenario (end-to-end scenarios E1/E2).
//!
//! Reading real `.ctl`/table/Atm/Obs files from disk is out of scope for
//! this binary — it exists to exercise the library against an
//! in-memory reference atmosphere, not to replace a host application's I/O
//! layer.

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use jurassic_rt::atmos::{Atm, AtmLevel};
use jurassic_rt::ctl::{AltWindow, Ctl};
use jurassic_rt::formod::run_forward_model;
use jurassic_rt::geokit::GeoPoint;
use jurassic_rt::obs::{Obs, ObsRay};
use jurassic_rt::retrieve;
use jurassic_rt::table::TableStore;

#[derive(Parser)]
#[command(name = "jrt", about = "Infrared radiative transfer / retrieval demo CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log verbosity (error, warn, info, debug, trace), overridden by
    /// RUST_LOG if set.
    #[arg(long, env = "JRT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the forward model on the built-in reference nadir scenario.
    Forward,
    /// Run a retrieval against a synthetic noisy measurement of the
    /// reference scenario, then report the recovered surface temperature.
    Retrieve,
}

/// Installs an `EnvFilter` + stdout fmt layer plus a daily-rolling file
/// appender under `./logs`. The returned guard must be held for the
/// process lifetime or the non-blocking file writer stops flushing.
fn init_tracing(default_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.to_string()));
    let file_appender = tracing_appender::rolling::daily("logs", "jrt.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout.and(non_blocking))
        .init();
    guard
}

/// A 60-level mid-latitude-summer-ish reference profile, surface at sea
/// level, single CO2 channel at the 667.5 cm^-1 Q-branch (E1).
fn reference_atm() -> Atm {
    let mut levels = Vec::with_capacity(60);
    for i in 0..60 {
        let z = i as f64;
        levels.push(AtmLevel {
            time: 0.0,
            z,
            lon: 0.0,
            lat: 45.0,
            p: 1013.25 * (-z / 7.0).exp(),
            t: 288.0 - 6.5 * z.min(11.0) + 0.5 * (z - 11.0).max(0.0),
            q: vec![400e-6; 8],
            k: vec![0.0],
        });
    }
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
    ctl.ret_t = AltWindow { zmin: 0.0, zmax: 60.0 };
    ctl
}

fn reference_obs(ctl: &Ctl) -> Obs {
    let mut obs = Obs::new();
    obs.rays.push(ObsRay::new(
        0.0,
        GeoPoint::new(800.0, 0.0, 45.0),
        GeoPoint::new(0.0, 0.0, 45.0),
        ctl.nd,
    ));
    obs
}

fn run_forward(ctl: &Ctl) -> anyhow::Result<()> {
    let atm = reference_atm();
    let store = TableStore::synthetic(ctl.ng, &ctl.nu, 16, 10, 64);
    let mut obs = reference_obs(ctl);

    run_forward_model(ctl, &atm, &store, &mut obs);

    for (i, ray) in obs.rays.iter().enumerate() {
        info!(ray = i, radiance = ray.rad[0], transmittance = ray.tau[0], "forward model result");
    }
    for (name, seconds) in jurassic_rt::timing::snapshot() {
        info!(stage = name, seconds, "timing");
    }
    Ok(())
}

fn run_retrieve(ctl: &Ctl) -> anyhow::Result<()> {
    let atm_true = reference_atm();
    let store = TableStore::synthetic(ctl.ng, &ctl.nu, 16, 10, 64);
    let mut obs = reference_obs(ctl);
    run_forward_model(ctl, &atm_true, &store, &mut obs);

    // Add Gaussian measurement noise (noise policy) so the
    // retrieval is exercised against a realistic, not exact, measurement.
    let noise = Normal::new(0.0, ctl.err_noise[0]).expect("finite noise sigma");
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    for ray in &mut obs.rays {
        for r in &mut ray.rad {
            *r += noise.sample(&mut rng);
        }
    }

    // Perturb the a priori away from truth so the retrieval has work to do.
    let mut atm_apriori = atm_true.clone();
    for level in &mut atm_apriori.levels {
        level.t += 3.0;
    }

    let result = retrieve(ctl, &atm_apriori, &obs, &store)?;
    if !result.status.converged() {
        warn!(iterations = result.iterations, "retrieval hit the iteration cap without converging");
    }
    info!(
        iterations = result.iterations,
        dof = result.dof,
        chi2 = result.chi2,
        p_value = result.p_value,
        "retrieval finished"
    );
    info!(
        near_surface_temperature_truth = atm_true.levels[0].t,
        near_surface_temperature_recovered = result.atm.levels[0].t,
        "near-surface temperature"
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let run_config = jurassic_rt::RunConfig::load()?;
    run_config.install_thread_pool()?;

    let cli = Cli::parse();
    let _tracing_guard = init_tracing(&cli.log_level);
    info!(worker_threads = run_config.worker_threads, "runtime configured");

    let ctl = reference_ctl();
    match cli.command {
        Command::Forward => run_forward(&ctl),
        Command::Retrieve => run_retrieve(&ctl),
    }
}
