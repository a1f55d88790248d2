//! Offline-first paged cache for heroes.
//!
//! This module keeps a remote paged source mirrored in a local SQLite store:
//! - Heroes and their previous/next page keys are written in one transaction
//! - The mediator decides between cache and network per load request
//! - Reads (paging, lookups, search) never touch the network
//! - A failed fetch leaves everything already cached readable

mod items;
mod mediator;
mod page_keys;
mod storage;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use mediator::PagedCacheMediator;
pub use storage::LocalStore;
pub use traits::{InitializeAction, LoadKind, LoadOutcome, RemotePage, RemoteSource};
