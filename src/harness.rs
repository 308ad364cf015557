//! Bench: wires a device into the checking fabric and runs one traffic mode.
//!
//! ```text
//! input probe  -> Sampler(producer)  -> Q -> ReferencePipeline -> Sampler(reference) -> Q(expected)
//! output probe -> Sampler(consumer)  -> Q(observed)                                     |
//!                                          Scoreboard <---------------------------------+
//! ```

use std::rc::Rc;

use tokio::task::{spawn_local, JoinHandle, LocalSet};

use crate::config::BenchConfig;
use crate::device::DeviceBoundary;
use crate::error::{CheckError, Result};
use crate::model::ReferenceModel;
use crate::pipeline::{PipelineStats, ReferencePipeline};
use crate::queue::{analysis_port, transport_queue};
use crate::sampler::Sampler;
use crate::scoreboard::{Mismatch, Scoreboard, Tally};
use crate::sequence::{ConsumerSequence, ProducerSequence, RandomValues, ResponseCell, Sequence};
use crate::vseq::{TrafficReport, VirtualSequencer};
use crate::Origin;

/// Items each sampler forwarded before the boundary closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounts {
    pub input: u64,
    pub reference: u64,
    pub output: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub tally: Tally,
    pub mismatches: Vec<Mismatch>,
    pub unpaired_observed: u64,
    pub unpaired_expected: u64,
    pub traffic: TrafficReport,
    pub pipeline: PipelineStats,
    pub samples: SampleCounts,
}

impl RunReport {
    /// Hard gate: fails when any comparison failed.
    pub fn check(&self) -> Result<()> {
        self.tally.check()
    }
}

pub struct Bench {
    config: BenchConfig,
}

impl Bench {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run one traffic mode against `device` and drain the fabric.
    ///
    /// Must be polled inside a `LocalSet`. A pipeline error wins over sampler
    /// errors, and both win over the traffic result; a timeout is reported
    /// as [`CheckError::Timeout`].
    pub async fn run(&self, device: &dyn DeviceBoundary) -> Result<RunReport> {
        let params = device.params();
        if params != self.config.params {
            return Err(CheckError::InvalidConfig(format!(
                "device reports {:?}, bench expects {:?}",
                params, self.config.params
            )));
        }

        let (input_put, input_get) = transport_queue();
        let (reference_port, reference_fifo) = analysis_port();
        let (expected_put, expected_get) = transport_queue();
        let (observed_put, observed_get) = transport_queue();

        let input_sampler = spawn_local(
            Sampler::new(device.input_probe(), Origin::ProducerSide, &params, input_put).run(),
        );
        let pipeline = spawn_local(
            ReferencePipeline::new(ReferenceModel::new(&params), input_get, reference_port).run(),
        );
        let reference_sampler = spawn_local(
            Sampler::new(reference_fifo, Origin::Reference, &params, expected_put).run(),
        );
        let output_sampler = spawn_local(
            Sampler::new(device.output_probe(), Origin::ConsumerSide, &params, observed_put).run(),
        );
        let scoreboard = Scoreboard::new(observed_get, expected_get);
        let handle = scoreboard.handle();
        let scoreboard = spawn_local(scoreboard.run());

        let response = ResponseCell::new();
        let producer: Rc<dyn Sequence> = Rc::new(ProducerSequence::new(
            device.input_driver(),
            RandomValues::new(self.config.seed, params.max_value()),
        ));
        let consumer: Rc<dyn Sequence> =
            Rc::new(ConsumerSequence::new(device.output_probe(), response.clone()));
        let sequencer = VirtualSequencer::new(producer, consumer, response);

        let traffic = tokio::time::timeout(self.config.run_timeout, sequencer.run(self.config.mode))
            .await
            .unwrap_or(Err(CheckError::Timeout(self.config.run_timeout)));
        device.shutdown();

        let input = join_task("input sampler", input_sampler).await;
        let pipeline = join_task("reference pipeline", pipeline).await;
        let reference = join_task("reference sampler", reference_sampler).await;
        let output = join_task("output sampler", output_sampler).await;
        let board = scoreboard.await.map_err(|e| CheckError::TaskFailed {
            task: "scoreboard",
            reason: e.to_string(),
        })?;

        let (samples, pipeline, traffic) = settle(input, pipeline, reference, output, traffic)?;

        if board.unpaired_observed + board.unpaired_expected > 0 {
            log::warn!(
                "{} observed and {} expected items were never paired",
                board.unpaired_observed,
                board.unpaired_expected
            );
        }
        let tally = handle.get_tally();
        log::info!(
            "run finished: {} compared, {} success, {} failure",
            tally.compared(),
            tally.success,
            tally.failure
        );

        Ok(RunReport {
            tally,
            mismatches: board.mismatches,
            unpaired_observed: board.unpaired_observed,
            unpaired_expected: board.unpaired_expected,
            traffic,
            pipeline,
            samples,
        })
    }

    /// Build a current-thread runtime and run to completion on it.
    pub fn run_blocking(&self, device: &dyn DeviceBoundary) -> Result<RunReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| CheckError::Runtime(e.to_string()))?;
        LocalSet::new().block_on(&runtime, self.run(device))
    }
}

/// Combine the stage outcomes, root cause first. A failed pipeline drops
/// its inbox, which the input sampler then reports as a closed queue.
fn settle(
    input: Result<u64>,
    pipeline: Result<PipelineStats>,
    reference: Result<u64>,
    output: Result<u64>,
    traffic: Result<TrafficReport>,
) -> Result<(SampleCounts, PipelineStats, TrafficReport)> {
    let pipeline = pipeline?;
    let samples = SampleCounts {
        input: input?,
        reference: reference?,
        output: output?,
    };
    Ok((samples, pipeline, traffic?))
}

async fn join_task<T>(task: &'static str, handle: JoinHandle<Result<T>>) -> Result<T> {
    handle.await.map_err(|e| CheckError::TaskFailed {
        task,
        reason: e.to_string(),
    })?
}
