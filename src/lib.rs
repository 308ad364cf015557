//! satcheck: conformance-checking engine for saturating accumulator devices.
//!
//! The engine drives independent producer/consumer traffic against a device,
//! predicts its output with an isolated reference model and compares the two
//! streams pairwise on a scoreboard. Everything runs on one thread under
//! cooperative scheduling (tokio current-thread runtime + `LocalSet`).

pub mod config;
pub mod device;
pub mod error;
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod sampler;
pub mod scoreboard;
pub mod sequence;
#[doc(hidden)]
pub mod sim;
pub mod supervisor;
pub mod vseq;

pub use error::{CheckError, Result};

use std::fmt;

/// Provenance of a transaction. Diagnostics only; never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Sampled from the device input (producer) side.
    ProducerSide,
    /// Sampled from the device output (consumer) side.
    ConsumerSide,
    /// Synthesized by the reference pipeline.
    Reference,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::ProducerSide => "producer",
            Origin::ConsumerSide => "consumer",
            Origin::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// The unit flowing through every queue. Immutable once created.
#[derive(Debug, Clone, Copy)]
pub struct Transaction {
    value: u64,
    valid: bool,
    origin: Origin,
}

impl Transaction {
    /// A valid transaction carrying `value`, tagged with `origin`.
    pub fn new(value: u64, origin: Origin) -> Self {
        Self {
            value,
            valid: true,
            origin,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

// Equality is defined on the value alone.
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Transaction {}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : data = {};", self.origin, self.value)
    }
}

/// One raw per-cycle sample at the device boundary.
///
/// `value == None` means the bus carried an undefined (X/Z) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub value: Option<u64>,
    pub valid: bool,
}

impl Observation {
    /// A valid cycle carrying a concrete value.
    pub fn valid(value: u64) -> Self {
        Self {
            value: Some(value),
            valid: true,
        }
    }

    /// An idle cycle.
    pub fn idle() -> Self {
        Self {
            value: Some(0),
            valid: false,
        }
    }

    /// A valid cycle whose value is undefined.
    pub fn undefined() -> Self {
        Self {
            value: None,
            valid: true,
        }
    }
}

impl From<Transaction> for Observation {
    fn from(item: Transaction) -> Self {
        Self {
            value: Some(item.value),
            valid: item.valid,
        }
    }
}
