//! Transparency module for the behavior pipeline.
//!
//! This module tracks what the pipeline processed and forwarded, so that
//! collection can be audited.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_stats, create_shared_stats_with_persistence, PipelineStats, SharedStats,
    StatsSnapshot,
};
