//! PPT invariant system: runtime invariant enforcement with contract tracking.
//!
//! Engine code asserts invariants as it runs; contract tests later check that
//! the invariants they depend on were actually exercised.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

pub const MODEL_SATURATES: u32 = 1;
pub const MODEL_OVERFLOW_UNCLAMPED: u32 = 2;
pub const QUEUE_SINGLE_SLOT: u32 = 3;
pub const SAMPLER_TAGS_ORIGIN: u32 = 4;
pub const PIPELINE_ARRIVAL_ORDER: u32 = 5;
pub const SCOREBOARD_INDEX_PAIRED: u32 = 6;
pub const TALLY_BALANCED: u32 = 7;
pub const SUPERVISOR_ONE_IN_FLIGHT: u32 = 8;
pub const MONITOR_SINGLE_WRITER: u32 = 9;
pub const ACTIVE_ONE_WAY: u32 = 10;
pub const TERMINATION_AT_TARGET: u32 = 11;
pub const RUN_END_GATE: u32 = 12;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = match context {
            Some(ctx) => format!("Invariant {} failed: {} (context: {})", id, message, ctx),
            None => format!("Invariant {} failed: {}", id, message),
        };
        log::error!("{}", full_message);
        panic!("{}", full_message);
    }
    if let Ok(mut log) = INVARIANT_LOG.lock() {
        log.insert(id);
    }
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that the given invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let missing: Vec<&str> = match INVARIANT_LOG.lock() {
        Ok(log) => required_invariants
            .iter()
            .filter(|id| !log.contains(id))
            .map(|&id| invariant_name(id))
            .collect(),
        Err(_) => panic!("Contract test '{}': invariant log poisoned", test_name),
    };
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

/// Maps an invariant ID to a human-readable name (diagnostics only).
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        MODEL_SATURATES => "MODEL_SATURATES",
        MODEL_OVERFLOW_UNCLAMPED => "MODEL_OVERFLOW_UNCLAMPED",
        QUEUE_SINGLE_SLOT => "QUEUE_SINGLE_SLOT",
        SAMPLER_TAGS_ORIGIN => "SAMPLER_TAGS_ORIGIN",
        PIPELINE_ARRIVAL_ORDER => "PIPELINE_ARRIVAL_ORDER",
        SCOREBOARD_INDEX_PAIRED => "SCOREBOARD_INDEX_PAIRED",
        TALLY_BALANCED => "TALLY_BALANCED",
        SUPERVISOR_ONE_IN_FLIGHT => "SUPERVISOR_ONE_IN_FLIGHT",
        MONITOR_SINGLE_WRITER => "MONITOR_SINGLE_WRITER",
        ACTIVE_ONE_WAY => "ACTIVE_ONE_WAY",
        TERMINATION_AT_TARGET => "TERMINATION_AT_TARGET",
        RUN_END_GATE => "RUN_END_GATE",
        _ => "UNKNOWN",
    }
}
