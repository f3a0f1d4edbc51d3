//! `SimEntitySource` - In-memory remote for testing
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! Requests are executed "server-side" with the same `LocalFilter` and
//! `SortBy` the cache uses locally, so a browse view and a search against
//! this source agree on membership and order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::backend::EntitySource;
use super::envelope::Envelope;
use super::error::{FetchError, FetchResult};
use crate::constants::DST_LATENCY_MS_MAX;
use crate::dst::{DeterministicRng, FaultConfig, FaultInjector, FaultType, SimConfig};
use crate::entity::{normalize, Entity, EntityKind};
use crate::pagination::Pagination;
use crate::query::{LocalFilter, Request};

// =============================================================================
// SimEntitySource
// =============================================================================

/// In-memory entity source for testing.
///
/// `TigerStyle`:
/// - Deterministic via `DeterministicRng`
/// - Fault injection via `FaultInjector`
/// - Cheap to clone; clones share data, faults and the request log
#[derive(Debug, Clone)]
pub struct SimEntitySource {
    /// Raw objects per kind, in insertion order
    objects: Arc<RwLock<HashMap<EntityKind, Vec<Value>>>>,
    /// Fault injector for simulating failures
    fault_injector: Arc<FaultInjector>,
    /// Delay applied before answering
    latency: Duration,
    /// Per-query delays, keyed by the raw `Query` string
    query_latency: Arc<RwLock<HashMap<String, Duration>>>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<(EntityKind, Request)>>>,
}

impl SimEntitySource {
    /// Create a source with its own fault injector.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let mut rng = DeterministicRng::new(config.seed());
        Self::with_fault_injector(Arc::new(FaultInjector::new(rng.fork())))
    }

    /// Create a source sharing a simulation's fault injector.
    #[must_use]
    pub fn with_fault_injector(fault_injector: Arc<FaultInjector>) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            fault_injector,
            latency: Duration::ZERO,
            query_latency: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a fault configuration.
    ///
    /// # Panics
    /// Panics if the fault injector is already shared.
    #[must_use]
    pub fn with_faults(mut self, config: FaultConfig) -> Self {
        Arc::get_mut(&mut self.fault_injector)
            .expect("cannot add faults after source is shared")
            .register(config);
        self
    }

    /// Delay every answer by `latency`.
    ///
    /// # Panics
    /// Panics if the latency exceeds `DST_LATENCY_MS_MAX`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        // Precondition
        assert!(
            latency <= Duration::from_millis(DST_LATENCY_MS_MAX),
            "latency must be <= {DST_LATENCY_MS_MAX}ms"
        );
        self.latency = latency;
        self
    }

    /// Delay answers to requests whose `Query` equals `query`.
    ///
    /// # Panics
    /// Panics if the latency exceeds `DST_LATENCY_MS_MAX`.
    pub fn set_query_latency(&self, query: impl Into<String>, latency: Duration) {
        // Precondition
        assert!(
            latency <= Duration::from_millis(DST_LATENCY_MS_MAX),
            "latency must be <= {DST_LATENCY_MS_MAX}ms"
        );
        self.query_latency.write().insert(query.into(), latency);
    }

    /// Get fault injector for inspection.
    #[must_use]
    pub fn fault_injector(&self) -> &Arc<FaultInjector> {
        &self.fault_injector
    }

    /// Add a raw object for `kind`; an object with the same `ID` is replaced.
    pub fn insert(&self, kind: EntityKind, raw: Value) {
        let mut objects = self.objects.write();
        let list = objects.entry(kind).or_default();
        let id = raw.get("ID").cloned();
        match list.iter_mut().find(|existing| id.is_some() && existing.get("ID") == id.as_ref()) {
            Some(existing) => *existing = raw,
            None => list.push(raw),
        }
    }

    /// Add many raw objects for `kind`.
    pub fn extend(&self, kind: EntityKind, raws: impl IntoIterator<Item = Value>) {
        for raw in raws {
            self.insert(kind, raw);
        }
    }

    /// Remove the object with `id`; returns whether it existed.
    pub fn remove(&self, kind: EntityKind, id: &str) -> bool {
        let mut objects = self.objects.write();
        let Some(list) = objects.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|raw| raw.get("ID").and_then(Value::as_str) != Some(id));
        list.len() != before
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<(EntityKind, Request)> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn latency_for(&self, request: &Request) -> Duration {
        request
            .filter_by
            .query
            .as_ref()
            .and_then(|query| self.query_latency.read().get(query).copied())
            .unwrap_or(self.latency)
    }

    fn maybe_inject_fault(&self, operation: &str) -> FetchResult<Option<FaultType>> {
        match self.fault_injector.should_inject(operation) {
            None => Ok(None),
            Some(FaultType::ObjectMissingId) => Ok(Some(FaultType::ObjectMissingId)),
            Some(FaultType::FetchMalformedResponse) => Err(FetchError::malformed(format!(
                "injected malformed response during {operation}"
            ))),
            Some(FaultType::FetchTimeout) => Err(FetchError::timeout(
                u64::try_from(self.latency.as_millis()).unwrap_or(DST_LATENCY_MS_MAX),
            )),
            Some(fault_type) => Err(FetchError::simulated_fault(fault_type.as_str())),
        }
    }

    fn execute(&self, kind: EntityKind, request: &Request) -> Envelope {
        let filter = LocalFilter::new(&request.filter_by);
        let mut matched: Vec<(Entity, Value)> = self
            .objects
            .read()
            .get(&kind)
            .map(|list| {
                list.iter()
                    .filter_map(|raw| {
                        normalize(kind, raw, None)
                            .ok()
                            .map(|normalized| (normalized.entity, raw.clone()))
                    })
                    .filter(|(entity, _)| filter.matches(entity))
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by(|(a, _), (b, _)| request.sort_by.compare(a, b));

        let total_records = matched.len();
        let (objects, pagination) = match request.pagination {
            Some(page) => (
                matched
                    .into_iter()
                    .skip(page.offset())
                    .take(page.page_size)
                    .map(|(_, raw)| raw)
                    .collect(),
                Pagination::from_totals(total_records, page.page_size, page.page_number),
            ),
            None => (
                matched.into_iter().map(|(_, raw)| raw).collect(),
                Pagination::from_totals(total_records, total_records, 1),
            ),
        };

        Envelope::new(objects, pagination)
    }
}

#[async_trait]
impl EntitySource for SimEntitySource {
    #[tracing::instrument(skip(self, kind, request), fields(kind = %kind, page = ?request.pagination))]
    async fn search(&self, kind: EntityKind, request: &Request) -> FetchResult<Envelope> {
        self.requests.lock().push((kind, request.clone()));

        let latency = self.latency_for(request);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        // Check for faults
        let fault = self.maybe_inject_fault(&format!("search:{}", kind.as_str()))?;

        let mut envelope = self.execute(kind, request);
        if fault == Some(FaultType::ObjectMissingId) {
            if let Some(Value::Object(first)) = envelope.objects.first_mut() {
                first.remove("ID");
            }
        }

        tracing::debug!(objects = envelope.objects.len(), "sim search answered");
        Ok(envelope)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::FaultInjectorBuilder;
    use crate::query::{build_request, Clause, FilterBy, PageRequest, SortBy};
    use serde_json::json;

    fn source() -> SimEntitySource {
        let source = SimEntitySource::new(SimConfig::with_seed(42));
        source.extend(
            EntityKind::Content,
            (1..=25).map(|i| json!({"ID": format!("n{i:02}"), "Title": format!("News {i:02}"), "OrderIndex": i})),
        );
        source.insert(EntityKind::Content, json!({"ID": "w1", "Title": "Weather", "OrderIndex": 0}));
        source
    }

    fn ids(envelope: &Envelope) -> Vec<&str> {
        envelope
            .objects
            .iter()
            .filter_map(|raw| raw.get("ID").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_paginates_filtered_results() {
        let source = source();
        let request = build_request(
            FilterBy::new().with_query("+news"),
            SortBy::tree_default(),
            Some(PageRequest::new(3, 10)),
        );

        let envelope = source.search(EntityKind::Content, &request).await.unwrap();

        assert_eq!(ids(&envelope), vec!["n21", "n22", "n23", "n24", "n25"]);
        let pagination = envelope.pagination.unwrap();
        assert_eq!(pagination.total_records, 25);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.page_number, 3);
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_clauses_and_sort() {
        let source = source();
        source.insert(
            EntityKind::Content,
            json!({"ID": "c1", "Title": "Child", "ParentID": "w1"}),
        );

        let request = build_request(
            FilterBy::new().and(Clause::equals("ParentID", "w1")),
            SortBy::new(),
            None,
        );
        let envelope = source.search(EntityKind::Content, &request).await.unwrap();
        assert_eq!(ids(&envelope), vec!["c1"]);

        let request = build_request(
            FilterBy::new().with_query("weather news"),
            SortBy::new().descending("OrderIndex"),
            Some(PageRequest::new(1, 2)),
        );
        let envelope = source.search(EntityKind::Content, &request).await.unwrap();
        assert_eq!(ids(&envelope), vec!["n25", "n24"]);
    }

    #[tokio::test]
    async fn test_insert_replaces_and_remove() {
        let source = source();
        source.insert(EntityKind::Content, json!({"ID": "w1", "Title": "Sunny"}));
        assert!(source.remove(EntityKind::Content, "n01"));
        assert!(!source.remove(EntityKind::Content, "n01"));
        assert!(!source.remove(EntityKind::Role, "n01"));

        let request = build_request(FilterBy::new(), SortBy::new(), None);
        let envelope = source.search(EntityKind::Content, &request).await.unwrap();
        assert_eq!(envelope.objects.len(), 25);
        assert_eq!(envelope.pagination.unwrap().total_pages, 1);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let faults = FaultInjectorBuilder::new(DeterministicRng::new(7))
            .with_fault(FaultConfig::new(FaultType::FetchServerError, 1.0).with_max_injections(1))
            .build();
        let source = SimEntitySource::with_fault_injector(Arc::new(faults));
        let request = build_request(FilterBy::new(), SortBy::new(), None);

        let err = source.search(EntityKind::Site, &request).await.unwrap_err();
        assert_eq!(err, FetchError::simulated_fault("fetch_server_error"));
        assert!(err.is_transient());

        assert!(source.search(EntityKind::Site, &request).await.is_ok());
        assert_eq!(source.fault_injector().total_injections(), 1);
    }

    #[tokio::test]
    async fn test_object_missing_id_fault() {
        let source = source().with_faults(
            FaultConfig::new(FaultType::ObjectMissingId, 1.0).with_filter("search:Content"),
        );
        let request = build_request(FilterBy::new(), SortBy::tree_default(), Some(PageRequest::new(1, 3)));

        let envelope = source.search(EntityKind::Content, &request).await.unwrap();
        assert!(envelope.objects[0].get("ID").is_none());
        assert_eq!(ids(&envelope).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_latency() {
        let source = source();
        source.set_query_latency("slow", Duration::from_millis(500));
        let request = build_request(FilterBy::new().with_query("slow"), SortBy::new(), None);

        let started = tokio::time::Instant::now();
        source.search(EntityKind::Content, &request).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
