//! `EntitySource` - Remote list/search contract
//!
//! `TigerStyle`: Abstract interface for the transport. The cache never talks
//! HTTP itself; an application plugs in its client here.
//!
//! # Simulation-First
//!
//! Tests run against `SimEntitySource`; a real transport must satisfy the
//! same contract.

use async_trait::async_trait;

use super::envelope::Envelope;
use super::error::FetchResult;
use crate::entity::EntityKind;
use crate::query::Request;

/// Remote source of entity pages.
///
/// `TigerStyle`: Async, explicit errors. Cancellation is done by the caller
/// dropping or aborting the future.
#[async_trait]
pub trait EntitySource: Send + Sync + 'static {
    /// Execute a filtered, sorted, paginated search for `kind`.
    ///
    /// The returned envelope holds the requested page of raw objects and the
    /// totals of the whole query.
    async fn search(&self, kind: EntityKind, request: &Request) -> FetchResult<Envelope>;
}
