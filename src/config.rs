//! `RunConfig`: process-level knobs the core needs handed to it explicitly
//! (worker thread count, default log level) — not the domain `Ctl`, which
//! stays a plain value type — Atm/Obs/Ctl structures must be
//! explicit values, not singletons.
//!
//! Loading reads `.env` via `dotenvy`, then each var with `env::var` using a
//! default and an `anyhow::Context` message.

use anyhow::{Context, Result};
use std::env;

/// Process-level runtime configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Size of the `rayon` global thread pool; 0 means "use rayon's own
    /// default" (number of logical CPUs).
    pub worker_threads: usize,
    /// Default `tracing_subscriber::EnvFilter` directive when `RUST_LOG`
    /// is unset.
    pub log_level: String,
}

impl RunConfig {
    /// Load from the environment (`.env` first, if present).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let worker_threads = env::var("JRT_WORKER_THREADS")
            .unwrap_or_else(|_| num_cpus::get().to_string())
            .parse()
            .context("Invalid JRT_WORKER_THREADS")?;
        let log_level = env::var("JRT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let config = Self { worker_threads, log_level };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 && env::var("JRT_WORKER_THREADS").is_ok() {
            anyhow::bail!("JRT_WORKER_THREADS must be greater than 0 if set");
        }
        Ok(())
    }

    /// Install this config's worker-thread count as rayon's global pool
    /// size. Must be called at most once per process, before any rayon
    /// work runs; a second call is a no-op (rayon already initialized).
    pub fn install_thread_pool(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Ok(());
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .build_global()
            .context("failed to install rayon global thread pool")
    }
}
