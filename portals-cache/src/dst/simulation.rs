//! Simulation - DST Test Harness
//!
//! `TigerStyle`: One seed builds the whole session: registries, cursor cache,
//! event bus and a simulated remote sharing a single fault injector.

use std::future::Future;
use std::sync::Arc;

use super::config::SimConfig;
use super::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder};
use super::rng::DeterministicRng;
use crate::config::CacheConfig;
use crate::entity::EntityKind;
use crate::events::{EventBus, InvalidationBridge};
use crate::pagination::CursorCache;
use crate::registry::Registries;
use crate::source::SimEntitySource;
use crate::view::SearchController;

/// Environment provided to simulation tests.
pub struct SimEnvironment {
    /// Simulation configuration
    pub config: SimConfig,
    /// Deterministic RNG, independent of the fault injector's
    pub rng: DeterministicRng,
    /// Fault injector shared with `source`
    pub faults: Arc<FaultInjector>,
    /// Session registries
    pub registries: Registries,
    /// Session cursor cache
    pub cursors: CursorCache,
    /// Session event bus
    pub bus: EventBus,
    /// Simulated remote
    pub source: SimEntitySource,
    /// Cache configuration used for controllers and the bus
    pub cache_config: CacheConfig,
}

impl SimEnvironment {
    /// New browse controller over `kind`, wired to this session.
    #[must_use]
    pub fn controller(&self, kind: EntityKind) -> SearchController<SimEntitySource> {
        SearchController::new(
            kind,
            Arc::new(self.source.clone()),
            &self.registries,
            self.cursors.clone(),
            &self.cache_config,
        )
    }

    /// New invalidation bridge subscribed to the session bus.
    #[must_use]
    pub fn bridge(&self) -> InvalidationBridge {
        InvalidationBridge::subscribe(self.registries.clone(), &self.bus)
    }
}

/// DST simulation harness.
///
/// `TigerStyle`:
/// - Single seed controls all randomness
/// - Faults are registered explicitly
/// - Environment is provided to test closure
///
/// # Example
///
/// ```rust
/// use portals_cache::dst::{FaultConfig, FaultType, SimConfig, Simulation};
/// use portals_cache::entity::EntityKind;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let sim = Simulation::new(SimConfig::with_seed(42))
///         .with_fault(FaultConfig::new(FaultType::FetchTimeout, 0.1));
///
///     sim.run(|env| async move {
///         let mut view = env.controller(EntityKind::Category);
///         view.open();
///         view.settle().await;
///         Ok::<(), String>(())
///     })
///     .await
///     .unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    cache_config: CacheConfig,
    fault_configs: Vec<FaultConfig>,
}

impl Simulation {
    /// Create a new simulation with the given configuration.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            cache_config: CacheConfig::default(),
            fault_configs: Vec::new(),
        }
    }

    /// Use a specific cache configuration.
    #[must_use]
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    /// Register a fault to inject during simulation.
    #[must_use]
    pub fn with_fault(mut self, fault_config: FaultConfig) -> Self {
        self.fault_configs.push(fault_config);
        self
    }

    /// Add common fetch faults (timeouts and server errors).
    #[must_use]
    pub fn with_fetch_faults(self, probability: f64) -> Self {
        use super::fault::FaultType;

        self.with_fault(FaultConfig::new(FaultType::FetchTimeout, probability))
            .with_fault(FaultConfig::new(FaultType::FetchServerError, probability))
    }

    /// Run the simulation with the given test function.
    ///
    /// # Errors
    /// Returns any error from the test function.
    pub async fn run<F, Fut, E>(self, test_fn: F) -> Result<(), E>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let seed = self.config.seed();
        let env = self.build();
        let faults = Arc::clone(&env.faults);

        let result = test_fn(env).await;

        tracing::debug!(
            seed,
            injections = faults.total_injections(),
            ok = result.is_ok(),
            "simulation finished"
        );
        result
    }

    /// Build the simulation environment without running a test.
    #[must_use]
    pub fn build(self) -> SimEnvironment {
        let mut rng = DeterministicRng::new(self.config.seed());

        let mut fault_builder = FaultInjectorBuilder::new(rng.fork());
        for fault_config in self.fault_configs {
            fault_builder = fault_builder.with_fault(fault_config);
        }
        let faults = Arc::new(fault_builder.build());

        SimEnvironment {
            config: self.config,
            rng,
            source: SimEntitySource::with_fault_injector(Arc::clone(&faults)),
            faults,
            registries: Registries::new(),
            cursors: CursorCache::new(),
            bus: EventBus::from_config(&self.cache_config),
            cache_config: self.cache_config,
        }
    }
}

/// Create a simulation with optional seed.
#[must_use]
pub fn create_simulation(seed: Option<u64>) -> Simulation {
    let config = match seed {
        Some(s) => SimConfig::with_seed(s),
        None => SimConfig::from_env_or_random(),
    };
    Simulation::new(config)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dst::fault::FaultType;
    use crate::events::{ChangeEffect, ChangeEvent};
    use crate::view::ViewUpdate;

    #[tokio::test]
    async fn test_basic_simulation() {
        let sim = Simulation::new(SimConfig::with_seed(42));

        sim.run(|env| async move {
            env.source
                .insert(EntityKind::Role, json!({"ID": "r1", "Title": "Editor"}));
            let mut view = env.controller(EntityKind::Role);
            view.open();
            view.settle().await;

            assert_eq!(view.visible().len(), 1);
            assert_eq!(env.registries.total_len(), 1);
            assert_eq!(env.cursors.len(), 1);
            Ok::<(), String>(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_same_seed_same_rng() {
        let mut first = create_simulation(Some(12345)).build();
        let mut second = create_simulation(Some(12345)).build();

        for _ in 0..10 {
            assert_eq!(first.rng.next_float(), second.rng.next_float());
        }
        assert_eq!(first.config.seed(), 12345);
    }

    #[tokio::test]
    async fn test_fault_injection_through_harness() {
        let sim = Simulation::new(SimConfig::with_seed(42))
            .with_fault(FaultConfig::new(FaultType::FetchConnectionRefused, 1.0));
        let env = sim.build();

        let mut view = env.controller(EntityKind::Site);
        view.open();
        let updates = view.settle().await;

        assert!(matches!(updates.as_slice(), [ViewUpdate::Failed(err)] if err.is_transient()));
        assert_eq!(env.faults.total_injections(), 1);
    }

    #[tokio::test]
    async fn test_bridge_follows_bus() {
        let env = Simulation::new(SimConfig::with_seed(9)).build();
        let mut bridge = env.bridge();
        env.registries
            .for_kind(EntityKind::Desktop)
            .update(json!({"ID": "d1", "Title": "Home"}))
            .unwrap();

        env.bus
            .publish(ChangeEvent::deleted(EntityKind::Desktop, "d1"));

        let (_, effect) = bridge.next().await.unwrap();
        assert_eq!(effect, ChangeEffect::Removed);
        assert_eq!(env.registries.total_len(), 0);
    }

    #[test]
    fn test_fluent_api() {
        let env = Simulation::new(SimConfig::with_seed(42))
            .with_fetch_faults(0.1)
            .with_cache_config(CacheConfig::default().with_page_size(5))
            .build();

        assert_eq!(env.controller(EntityKind::Content).page_size(), 5);
    }
}
