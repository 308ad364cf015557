//! Paired-comparison scoreboard.
//!
//! Two independent streams arrive on their own queues. Items are paired by
//! arrival index only, compared by value, and counted. A mismatch is not
//! fatal here; [`Tally::check`] is the run-end gate.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{CheckError, Result};
use crate::invariant_ppt::{
    assert_invariant, RUN_END_GATE, SAMPLER_TAGS_ORIGIN, SCOREBOARD_INDEX_PAIRED, TALLY_BALANCED,
};
use crate::queue::QueueGet;
use crate::{Origin, Transaction};

/// Pass/fail counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub success: u64,
    pub failure: u64,
}

impl Tally {
    /// Number of pairs compared so far.
    pub fn compared(&self) -> u64 {
        self.success + self.failure
    }

    /// Hard gate: any failed comparison fails the run.
    pub fn check(&self) -> Result<()> {
        let verdict = if self.failure > 0 {
            Err(CheckError::ComparisonFailures {
                success: self.success,
                failure: self.failure,
            })
        } else {
            Ok(())
        };
        assert_invariant(
            RUN_END_GATE,
            verdict.is_err() == (self.failure != 0),
            "gate must fail exactly when failures were recorded",
            Some("Tally::check"),
        );
        verdict
    }
}

/// Diagnostic record for one failed comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub index: u64,
    pub observed: Transaction,
    pub expected: Transaction,
}

/// Tally plus mismatch history. Only the comparison loop writes it.
#[derive(Debug, Default)]
pub struct Ledger {
    tally: Tally,
    mismatches: Vec<Mismatch>,
}

impl Ledger {
    /// Compare the next pair; returns whether it matched.
    pub fn record(&mut self, observed: Transaction, expected: Transaction) -> bool {
        let index = self.tally.compared();
        let matched = observed == expected;
        assert_invariant(
            SCOREBOARD_INDEX_PAIRED,
            self.mismatches.last().map_or(true, |m| m.index < index),
            "mismatch indices must strictly follow arrival order",
            Some("Ledger::record"),
        );
        if matched {
            self.tally.success += 1;
            log::debug!("pair {} matched: {}", index, observed.value());
        } else {
            self.tally.failure += 1;
            log::error!(
                "pair {} mismatch: observed {} expected {}",
                index,
                observed,
                expected
            );
            self.mismatches.push(Mismatch {
                index,
                observed,
                expected,
            });
        }
        matched
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }
}

/// Final state handed back when the scoreboard drains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreboardReport {
    pub tally: Tally,
    pub mismatches: Vec<Mismatch>,
    pub unpaired_observed: u64,
    pub unpaired_expected: u64,
}

/// Read-only view for the reporting boundary.
#[derive(Debug, Clone)]
pub struct ScoreboardHandle {
    ledger: Rc<RefCell<Ledger>>,
}

impl ScoreboardHandle {
    pub fn get_tally(&self) -> Tally {
        self.ledger.borrow().tally()
    }

    pub fn mismatches(&self) -> Vec<Mismatch> {
        self.ledger.borrow().mismatches().to_vec()
    }
}

pub struct Scoreboard {
    observed: QueueGet<Transaction>,
    expected: QueueGet<Transaction>,
    ledger: Rc<RefCell<Ledger>>,
}

impl Scoreboard {
    pub fn new(observed: QueueGet<Transaction>, expected: QueueGet<Transaction>) -> Self {
        Self {
            observed,
            expected,
            ledger: Rc::new(RefCell::new(Ledger::default())),
        }
    }

    pub fn handle(&self) -> ScoreboardHandle {
        ScoreboardHandle {
            ledger: Rc::clone(&self.ledger),
        }
    }

    /// Compare pairs until both queues close.
    pub async fn run(mut self) -> ScoreboardReport {
        let mut paired = 0u64;
        let mut unpaired_observed = 0u64;
        let mut unpaired_expected = 0u64;
        loop {
            let (observed, expected) = tokio::join!(self.observed.get(), self.expected.get());
            match (observed, expected) {
                (Some(o), Some(e)) => {
                    assert_invariant(
                        SAMPLER_TAGS_ORIGIN,
                        o.origin() == Origin::ConsumerSide && e.origin() == Origin::Reference,
                        "scoreboard streams must carry consumer and reference origins",
                        Some("Scoreboard::run"),
                    );
                    paired += 1;
                    let mut ledger = self.ledger.borrow_mut();
                    ledger.record(o, e);
                    assert_invariant(
                        TALLY_BALANCED,
                        ledger.tally().compared() == paired,
                        "success + failure must equal pairs compared",
                        Some("Scoreboard::run"),
                    );
                }
                (Some(o), None) => {
                    log::warn!("expected stream closed; unpaired {}", o);
                    unpaired_observed += 1;
                    while let Some(o) = self.observed.get().await {
                        log::warn!("expected stream closed; unpaired {}", o);
                        unpaired_observed += 1;
                    }
                    break;
                }
                (None, Some(e)) => {
                    log::warn!("observed stream closed; unpaired {}", e);
                    unpaired_expected += 1;
                    while let Some(e) = self.expected.get().await {
                        log::warn!("observed stream closed; unpaired {}", e);
                        unpaired_expected += 1;
                    }
                    break;
                }
                (None, None) => break,
            }
        }

        let ledger = self.ledger.borrow();
        let tally = ledger.tally();
        log::info!(
            "scoreboard: {} success, {} failure",
            tally.success,
            tally.failure
        );
        ScoreboardReport {
            tally,
            mismatches: ledger.mismatches().to_vec(),
            unpaired_observed,
            unpaired_expected,
        }
    }
}
