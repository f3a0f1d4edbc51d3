//! View - Live list controllers
//!
//! `TigerStyle`: One controller per open list. Each owns its fetch slot and
//! outcome channel; registries and the cursor cache are shared.

mod controller;
mod flight;

pub use controller::{ListScope, ScrollOutcome, SearchController, ViewMode, ViewUpdate};
pub use flight::{FetchHandle, FetchOutcome, FetchPurpose, FetchSlot, FetchTicket};
