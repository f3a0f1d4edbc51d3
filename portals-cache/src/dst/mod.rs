//! DST - Deterministic Simulation Testing
//!
//! Seeded simulation of the remote source, with explicit fault injection at
//! the fetch boundary.
//!
//! # Usage
//!
//! ```rust
//! use portals_cache::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//!
//! let env = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::FetchTimeout, 0.1))
//!     .build();
//! assert_eq!(env.config.seed(), 42);
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod config;
mod fault;
mod rng;
mod simulation;

pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use rng::DeterministicRng;
pub use simulation::{create_simulation, SimEnvironment, Simulation};
