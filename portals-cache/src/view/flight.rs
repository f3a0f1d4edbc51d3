//! Fetch slot - At most one fetch in flight per view
//!
//! `TigerStyle`: Every fetch gets a ticket. Only the outcome carrying the
//! slot's current ticket is applied; anything else is stale.

use std::fmt;

use tokio::task::JoinHandle;

use crate::source::{Envelope, FetchResult};

/// Monotonic identifier of one fetch of one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    /// Raw value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// Browse page `page`; afterwards show `show_pages` pages
    Browse {
        /// Server page requested
        page: usize,
        /// Local pages to show once merged
        show_pages: usize,
    },
    /// Search result page `page`
    Search {
        /// Server page requested
        page: usize,
    },
}

impl FetchPurpose {
    /// Server page requested.
    #[must_use]
    pub fn page(&self) -> usize {
        match self {
            Self::Browse { page, .. } | Self::Search { page } => *page,
        }
    }
}

/// A completed fetch, as delivered to the owning view.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Ticket of the fetch
    pub ticket: FetchTicket,
    /// Why it was issued
    pub purpose: FetchPurpose,
    /// What the source answered
    pub result: FetchResult<Envelope>,
}

/// Handle to the running fetch task.
#[derive(Debug)]
pub struct FetchHandle {
    pub(crate) ticket: FetchTicket,
    pub(crate) purpose: FetchPurpose,
    pub(crate) task: JoinHandle<()>,
}

impl FetchHandle {
    /// Ticket of the fetch.
    #[must_use]
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    /// Why it was issued.
    #[must_use]
    pub fn purpose(&self) -> FetchPurpose {
        self.purpose
    }

    /// Abort the task. Safe after completion.
    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Single in-flight slot of a view.
#[derive(Debug, Default)]
pub struct FetchSlot {
    issued: u64,
    current: Option<FetchHandle>,
}

impl FetchSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next ticket.
    pub fn issue(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    /// Occupy the slot with a started fetch.
    ///
    /// # Panics
    /// Panics if the slot is busy or the ticket was not the last issued.
    pub fn install(&mut self, handle: FetchHandle) {
        // Preconditions
        assert!(self.current.is_none(), "fetch slot already busy");
        assert_eq!(handle.ticket.0, self.issued, "ticket must be the last issued");

        self.current = Some(handle);
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    /// Ticket of the fetch in flight.
    #[must_use]
    pub fn current_ticket(&self) -> Option<FetchTicket> {
        self.current.as_ref().map(FetchHandle::ticket)
    }

    /// Purpose of the fetch in flight.
    #[must_use]
    pub fn current_purpose(&self) -> Option<FetchPurpose> {
        self.current.as_ref().map(FetchHandle::purpose)
    }

    /// Whether `ticket` is the fetch in flight.
    #[must_use]
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.current_ticket() == Some(ticket)
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut FetchHandle> {
        self.current.as_mut()
    }

    /// Release the slot if `ticket` is current; returns the handle.
    pub fn finish(&mut self, ticket: FetchTicket) -> Option<FetchHandle> {
        if self.is_current(ticket) {
            self.current.take()
        } else {
            None
        }
    }

    /// Abort the fetch in flight; returns whether there was one.
    ///
    /// Idempotent.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                tracing::debug!(ticket = %handle.ticket, "fetch cancelled");
                handle.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for FetchSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
