//! `jurassic-rt`: an infrared atmospheric radiative transfer engine and
//! Bayesian optimal-estimation retrieval.
//!
//! The crate is organized bottom-up: [`geokit`] and
//! [`constants`] are dependency-free primitives; [`ctl`], [`atmos`], and
//! [`obs`] are the plain data model; [`table`] and [`continua`] supply
//! absorption data; [`raytracer`] traces lines of sight through [`atmos`];
//! [`bandrt`] turns a traced line of sight into radiance; [`formod`] fans
//! that out over an observation set; [`statemap`], [`jacobian`], and
//! [`retrieval`] build the Bayesian inversion on top. [`external`] is the
//! escape hatch for a host-provided forward model.
//!
//! Nothing here reads or writes control/table files from disk — that I/O
//! layer is explicitly out of scope (see each module's docs for the exact
//! boundary); every public entry point takes already-parsed values.

pub mod atmos;
pub mod bandrt;
pub mod config;
pub mod constants;
pub mod continua;
pub mod ctl;
pub mod error;
pub mod external;
pub mod formod;
pub mod geokit;
pub mod jacobian;
pub mod obs;
pub mod planck;
pub mod raytracer;
pub mod retrieval;
pub mod statemap;
pub mod table;
pub mod timing;

pub use atmos::{Atm, AtmLevel, AtmState};
pub use config::RunConfig;
pub use ctl::Ctl;
pub use error::{ConvergenceStatus, CoreError, CoreResult};
pub use obs::{Los, LosPoint, Obs, ObsRay};
pub use retrieval::{retrieve, RetrievalResult};
pub use table::TableStore;
