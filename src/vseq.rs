//! Traffic modes: the virtual sequences that drive a run.

use std::rc::Rc;

use crate::config::{
    DEFAULT_ACCUMULATE_TARGET, DEFAULT_RAND_N, DEFAULT_REACTIVE_RAND_N, DEFAULT_REACTIVE_TARGET,
    DEFAULT_REPEATS,
};
use crate::error::{CheckError, Result};
use crate::sequence::{ResponseCell, Sequence};
use crate::supervisor::{Supervisor, SupervisorReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficMode {
    /// One producer and one consumer in parallel, joined, `repeats` times.
    Default { repeats: u32 },
    /// `count` producers back to back, concurrently with `count` consumers
    /// back to back.
    RandN { count: u32 },
    /// Default pairs until the consumer responses add up to `target`.
    /// At least one pair always runs.
    ReactiveAccumulate { target: u64 },
    /// Default pairs, `count` times.
    ReactiveRandN { count: u32 },
    /// Supervised, continuously relaunched traffic until the accumulated
    /// consumer responses reach `target`.
    InfiniteAccumulate { target: u64 },
}

impl TrafficMode {
    pub fn rand_n() -> Self {
        TrafficMode::RandN {
            count: DEFAULT_RAND_N,
        }
    }

    pub fn reactive_accumulate() -> Self {
        TrafficMode::ReactiveAccumulate {
            target: DEFAULT_REACTIVE_TARGET,
        }
    }

    pub fn reactive_rand_n() -> Self {
        TrafficMode::ReactiveRandN {
            count: DEFAULT_REACTIVE_RAND_N,
        }
    }

    pub fn infinite_accumulate() -> Self {
        TrafficMode::InfiniteAccumulate {
            target: DEFAULT_ACCUMULATE_TARGET,
        }
    }
}

impl Default for TrafficMode {
    fn default() -> Self {
        TrafficMode::Default {
            repeats: DEFAULT_REPEATS,
        }
    }
}

/// What a traffic mode did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficReport {
    pub producer_items: u64,
    pub consumer_items: u64,
    /// Sum of consumer responses, for the accumulating modes.
    pub accumulated: u64,
    /// Present when the mode ran under the supervisor.
    pub supervisor: Option<SupervisorReport>,
}

/// Owns the two sequences and launches them according to a mode.
pub struct VirtualSequencer {
    producer: Rc<dyn Sequence>,
    consumer: Rc<dyn Sequence>,
    response: ResponseCell,
}

impl VirtualSequencer {
    pub fn new(producer: Rc<dyn Sequence>, consumer: Rc<dyn Sequence>, response: ResponseCell) -> Self {
        Self {
            producer,
            consumer,
            response,
        }
    }

    pub async fn run(&self, mode: TrafficMode) -> Result<TrafficReport> {
        log::info!("running traffic mode {:?}", mode);
        match mode {
            TrafficMode::Default { repeats } | TrafficMode::ReactiveRandN { count: repeats } => {
                let mut report = TrafficReport::default();
                for _ in 0..repeats {
                    self.pair(&mut report).await?;
                }
                Ok(report)
            }
            TrafficMode::RandN { count } => {
                let producers = async {
                    for _ in 0..count {
                        self.producer.start().await?;
                    }
                    Ok::<_, CheckError>(())
                };
                let consumers = async {
                    let mut sum = 0u64;
                    for _ in 0..count {
                        sum = sum.saturating_add(self.consumer.start().await?.value());
                    }
                    Ok::<_, CheckError>(sum)
                };
                let (p, c) = tokio::join!(producers, consumers);
                p?;
                let accumulated = c?;
                Ok(TrafficReport {
                    producer_items: count as u64,
                    consumer_items: count as u64,
                    accumulated,
                    supervisor: None,
                })
            }
            TrafficMode::ReactiveAccumulate { target } => {
                let mut report = TrafficReport::default();
                loop {
                    self.pair(&mut report).await?;
                    log::debug!("accumulated {} of {}", report.accumulated, target);
                    if report.accumulated >= target {
                        break;
                    }
                }
                log::info!("accumulated value was {}", report.accumulated);
                Ok(report)
            }
            TrafficMode::InfiniteAccumulate { target } => {
                let mut supervisor = Supervisor::new(
                    Rc::clone(&self.producer),
                    Rc::clone(&self.consumer),
                    self.response.clone(),
                    target,
                );
                let report = supervisor.run().await?;
                Ok(TrafficReport {
                    producer_items: report.producer_launches,
                    consumer_items: report.consumer_launches,
                    accumulated: report.data_adder,
                    supervisor: Some(report),
                })
            }
        }
    }

    /// One producer and one consumer started together and both awaited.
    async fn pair(&self, report: &mut TrafficReport) -> Result<()> {
        let (p, c) = tokio::join!(self.producer.start(), self.consumer.start());
        p?;
        let rsp = c?;
        report.producer_items += 1;
        report.consumer_items += 1;
        report.accumulated = report.accumulated.saturating_add(rsp.value());
        Ok(())
    }
}
