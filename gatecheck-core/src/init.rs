//! Process-wide [`Pipeline`] singleton, for hosts that want a single shared
//! instance instantiated once at startup rather than threaded through every
//! handler — the same shape as `r2e_cache::cache_backend()`.

use crate::pipeline::Pipeline;
use std::sync::{Arc, OnceLock};

static PIPELINE: OnceLock<Arc<Pipeline>> = OnceLock::new();

/// Install the process-wide pipeline. Returns the pipeline back on the
/// error path if one was already installed — callers that don't care can
/// ignore the `Err`.
pub fn init(pipeline: Arc<Pipeline>) -> Result<(), Arc<Pipeline>> {
    PIPELINE.set(pipeline)
}

/// The process-wide pipeline, if [`init`] has run.
pub fn get() -> Option<Arc<Pipeline>> {
    PIPELINE.get().cloned()
}

/// The process-wide pipeline.
///
/// # Panics
/// Panics if [`init`] has not been called yet.
pub fn instance() -> Arc<Pipeline> {
    PIPELINE.get().cloned().expect("gatecheck::init was never called")
}
