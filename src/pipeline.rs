//! Reference pipeline: input stream in, predicted output stream out.

use crate::error::Result;
use crate::invariant_ppt::{assert_invariant, PIPELINE_ARRIVAL_ORDER, SAMPLER_TAGS_ORIGIN};
use crate::model::ReferenceModel;
use crate::queue::{AnalysisPort, QueueGet};
use crate::{Origin, Transaction};

/// Counters reported when the pipeline drains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub evaluated: u64,
    pub overflows: u64,
}

/// Owns the reference model for one run and feeds it every sampled input
/// in arrival order.
pub struct ReferencePipeline {
    model: ReferenceModel,
    inbox: QueueGet<Transaction>,
    outbox: AnalysisPort<Transaction>,
}

impl ReferencePipeline {
    pub fn new(
        model: ReferenceModel,
        inbox: QueueGet<Transaction>,
        outbox: AnalysisPort<Transaction>,
    ) -> Self {
        Self {
            model,
            inbox,
            outbox,
        }
    }

    /// Evaluate until the input queue closes.
    pub async fn run(mut self) -> Result<PipelineStats> {
        let mut stats = PipelineStats::default();
        let first_step = self.model.steps();
        while let Some(input) = self.inbox.get().await {
            assert_invariant(
                SAMPLER_TAGS_ORIGIN,
                input.origin() == Origin::ProducerSide,
                "pipeline input must come from the producer-side sampler",
                Some("ReferencePipeline::run"),
            );
            let out = self.model.apply(input.value())?;
            assert_invariant(
                PIPELINE_ARRIVAL_ORDER,
                self.model.steps() == first_step + stats.evaluated + 1,
                "model state must advance once per arrival",
                Some("ReferencePipeline::run"),
            );
            stats.evaluated += 1;
            if out.overflow {
                stats.overflows += 1;
                log::debug!(
                    "overflow on input {} (threshold {})",
                    input.value(),
                    self.model.threshold()
                );
            }
            let expected = Transaction::new(out.value, Origin::Reference);
            log::debug!("predicted {}", expected);
            if !self.outbox.write(expected) {
                log::warn!("reference output has no subscriber; dropping {}", expected);
            }
        }
        log::info!(
            "reference pipeline drained: {} evaluated, {} overflows",
            stats.evaluated,
            stats.overflows
        );
        Ok(stats)
    }
}
