use std::time::Duration;

use thiserror::Error;

use crate::Origin;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("threshold is not configured")]
    ThresholdUnset,

    #[error("threshold must be non-negative, got {0}")]
    NegativeThreshold(i64),

    #[error("threshold {threshold} does not fit in {bit_width} bits")]
    ThresholdOutOfRange { threshold: u64, bit_width: u32 },

    #[error("bit width must be within 1..=64, got {0}")]
    InvalidBitWidth(u32),

    #[error("value {value} exceeds the {bit_width}-bit data range")]
    ValueOutOfRange { value: u64, bit_width: u32 },

    #[error("malformed {origin} transaction: {reason}")]
    MalformedTransaction { origin: Origin, reason: String },

    #[error("device boundary is closed")]
    DeviceClosed,

    #[error("transport queue is closed")]
    QueueClosed,

    #[error("scoreboard found {failure} failed comparisons ({success} succeeded)")]
    ComparisonFailures { success: u64, failure: u64 },

    #[error("{task} task failed: {reason}")]
    TaskFailed { task: &'static str, reason: String },

    #[error("run did not finish within {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start runtime: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, CheckError>;
