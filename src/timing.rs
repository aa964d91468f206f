//! Process-wide timing registry: name -> cumulative seconds, guarded by a
//! mutex as the one acceptable piece of global mutable state. Everything
//! else (Atm/Obs/Ctl, LOS buffers, table handles) is an explicit owned
//! value threaded through call sites.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

fn registry() -> &'static Mutex<HashMap<&'static str, f64>> {
    static TIMERS: OnceLock<Mutex<HashMap<&'static str, f64>>> = OnceLock::new();
    TIMERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Add `seconds` to the cumulative total recorded under `name`.
pub fn add_elapsed(name: &'static str, seconds: f64) {
    let mut map = registry().lock().unwrap_or_else(|e| e.into_inner());
    *map.entry(name).or_insert(0.0) += seconds;
}

/// Snapshot the registry as `(name, cumulative_seconds)` pairs.
pub fn snapshot() -> Vec<(&'static str, f64)> {
    let map = registry().lock().unwrap_or_else(|e| e.into_inner());
    let mut out: Vec<_> = map.iter().map(|(&k, &v)| (k, v)).collect();
    out.sort_by(|a, b| a.0.cmp(b.0));
    out
}

/// Reset the registry (used between independent benchmark/test runs).
pub fn reset() {
    let mut map = registry().lock().unwrap_or_else(|e| e.into_inner());
    map.clear();
}

/// RAII guard that records elapsed wall time under `name` on drop.
pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        add_elapsed(self.name, self.start.elapsed().as_secs_f64());
    }
}

/// Time the given closure under `name`, recording cumulative seconds.
#[macro_export]
macro_rules! scoped_timer {
    ($name:expr) => {
        let _timer_guard = $crate::timing::ScopedTimer::start($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_calls() {
        reset();
        add_elapsed("raytrace", 1.5);
        add_elapsed("raytrace", 0.5);
        let snap = snapshot();
        assert_eq!(snap, vec![("raytrace", 2.0)]);
    }
}
