/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Latency metrics for the store's public operations.
//!
//! Every public operation of [`BlockStore`](super::block_store::BlockStore) records its
//! wall-clock duration into one Prometheus histogram, labelled by method name. When no
//! registry is supplied at store construction, all observations are no-ops.

use std::time::Instant;

use prometheus::{HistogramOpts, HistogramVec, Registry};

// Method label values:
pub(crate) const LOAD_BLOCK: &str = "load_block";
pub(crate) const LOAD_BLOCK_BY_HASH: &str = "load_block_by_hash";
pub(crate) const LOAD_BLOCK_PART: &str = "load_block_part";
pub(crate) const LOAD_BLOCK_META: &str = "load_block_meta";
pub(crate) const LOAD_BLOCK_META_BY_HASH: &str = "load_block_meta_by_hash";
pub(crate) const LOAD_BLOCK_COMMIT: &str = "load_block_commit";
pub(crate) const LOAD_SEEN_EXT_COMMIT: &str = "load_seen_ext_commit";
pub(crate) const LOAD_SEEN_COMMIT: &str = "load_seen_commit";
pub(crate) const PRUNE_BLOCKS: &str = "prune_blocks";
pub(crate) const SAVE_BLOCK: &str = "save_block";
pub(crate) const SAVE_SEEN_EXT_COMMIT: &str = "save_seen_ext_commit";
pub(crate) const SAVE_SEEN_COMMIT: &str = "save_seen_commit";

/// Handle on the store's metric instruments.
#[derive(Clone)]
pub struct Metrics {
    access_duration_seconds: Option<HistogramVec>,
}

impl Metrics {
    /// Create metrics registered into `registry`.
    pub fn new(registry: &Registry) -> Result<Metrics, prometheus::Error> {
        let access_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "blockstore_access_duration_seconds",
                "Duration of accesses to the block store, labelled by method.",
            ),
            &["method"],
        )?;
        registry.register(Box::new(access_duration_seconds.clone()))?;
        Ok(Metrics {
            access_duration_seconds: Some(access_duration_seconds),
        })
    }

    /// Create metrics that discard every observation.
    pub fn nop() -> Metrics {
        Metrics {
            access_duration_seconds: None,
        }
    }

    /// Start timing an operation. The elapsed time is observed when the returned timer
    /// is dropped.
    pub(crate) fn time(&self, method: &'static str) -> AccessTimer<'_> {
        AccessTimer {
            metrics: self,
            method,
            start: Instant::now(),
        }
    }
}

pub(crate) struct AccessTimer<'a> {
    metrics: &'a Metrics,
    method: &'static str,
    start: Instant,
}

impl Drop for AccessTimer<'_> {
    fn drop(&mut self) {
        if let Some(histogram) = &self.metrics.access_duration_seconds {
            histogram
                .with_label_values(&[self.method])
                .observe(self.start.elapsed().as_secs_f64());
        }
    }
}
