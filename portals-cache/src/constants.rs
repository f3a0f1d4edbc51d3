//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `PAGINATION_PAGE_SIZE_DEFAULT` (not `DEFAULT_PAGE_SIZE`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX` for size limits
//! - _`COUNT_MAX/DEFAULT` for quantity limits
//! - _MS for milliseconds

// =============================================================================
// Entity Limits
// =============================================================================

/// Maximum length of an entity ID
pub const ENTITY_ID_BYTES_MAX: usize = 256;

/// Maximum length of an entity title
pub const ENTITY_TITLE_BYTES_MAX: usize = 4096;

/// Maximum depth walked when resolving ancestors or full titles
pub const TREE_DEPTH_COUNT_MAX: usize = 256;

/// Separator used between segments of a full title
pub const TREE_FULL_TITLE_SEPARATOR: &str = " > ";

// =============================================================================
// Pagination Limits
// =============================================================================

/// Default page size when no response envelope is known
pub const PAGINATION_PAGE_SIZE_DEFAULT: usize = 20;

/// Maximum page size a view may request
pub const PAGINATION_PAGE_SIZE_MAX: usize = 1000;

/// Default prefix for cursor signatures
pub const PAGINATION_CURSOR_PREFIX_DEFAULT: &str = "portals";

// =============================================================================
// Query Limits
// =============================================================================

/// Maximum length of a free-text search query
pub const QUERY_BYTES_MAX: usize = 10_000;

/// Maximum number of terms considered in one query
pub const QUERY_TERMS_COUNT_MAX: usize = 64;

// =============================================================================
// Event Bus Limits
// =============================================================================

/// Default capacity of the change-event channel
pub const EVENT_CHANNEL_CAPACITY_DEFAULT: usize = 256;

/// Maximum capacity of the change-event channel
pub const EVENT_CHANNEL_CAPACITY_MAX: usize = 65_536;

/// Name of the channel carrying entity change notifications
pub const EVENT_CHANNEL_NAME: &str = "Portals";

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum simulation steps
pub const DST_SIMULATION_STEPS_MAX: u64 = 1_000_000;

/// Maximum fault probability
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

/// Maximum simulated fetch latency
pub const DST_LATENCY_MS_MAX: u64 = 10_000; // 10 seconds

// =============================================================================
// Telemetry
// =============================================================================

/// Default tracing filter directive
pub const TELEMETRY_FILTER_DEFAULT: &str = "portals_cache=info";

// =============================================================================
// Compile-time assertions
// =============================================================================

const _: () = {
    assert!(PAGINATION_PAGE_SIZE_DEFAULT >= 1);
    assert!(PAGINATION_PAGE_SIZE_DEFAULT <= PAGINATION_PAGE_SIZE_MAX);
    assert!(EVENT_CHANNEL_CAPACITY_DEFAULT >= 1);
    assert!(EVENT_CHANNEL_CAPACITY_DEFAULT <= EVENT_CHANNEL_CAPACITY_MAX);
    assert!(TREE_DEPTH_COUNT_MAX > 0);
};
