//! Proposal quorum engine
//!
//! This module provides:
//! - Short-id lookup with explicit ambiguity reporting
//! - The proposal listing shown to copayers
//! - Concurrent batch signing with per-proposal outcomes
//! - Sign, reject and broadcast by short id

pub mod batch;
pub mod engine;
pub mod lookup;
pub mod render;

pub use batch::{parse_batch, BatchOutcome, SignatureBatchEntry};
pub use engine::{apply_batch, ProposalEngine};
pub use lookup::find_by_short_id;
pub use render::render_proposals;
