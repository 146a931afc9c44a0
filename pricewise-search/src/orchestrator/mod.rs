//! Search orchestrator: concurrent fan-out, merge, tax overlay, ranking.
//!
//! This module dispatches one search to every requested marketplace under a
//! shared deadline, records per-marketplace failures, deduplicates repeated
//! listings, attaches import tax estimates and orders the merged page with a
//! deterministic total order.

pub mod dedup;
pub mod search;
pub(crate) mod sorting;

pub use search::Orchestrator;
