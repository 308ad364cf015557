//! Sampler: copies a live observation stream into a transport queue.

use crate::config::DeviceParams;
use crate::device::SignalProbe;
use crate::error::{CheckError, Result};
use crate::queue::QueuePut;
use crate::{Origin, Transaction};

/// Forwards every valid observation, unmodified, tagged with its origin.
pub struct Sampler<P> {
    probe: P,
    origin: Origin,
    max_value: u64,
    bit_width: u32,
    queue: QueuePut<Transaction>,
}

impl<P: SignalProbe> Sampler<P> {
    pub fn new(
        probe: P,
        origin: Origin,
        params: &DeviceParams,
        queue: QueuePut<Transaction>,
    ) -> Self {
        Self {
            probe,
            origin,
            max_value: params.max_value(),
            bit_width: params.bit_width(),
            queue,
        }
    }

    /// Run until the probe reports shutdown; returns the number forwarded.
    ///
    /// Dropping the sampler at the end closes its queue, which is how the
    /// downstream stage learns the run is over.
    pub async fn run(mut self) -> Result<u64> {
        let mut forwarded = 0u64;
        while let Some(obs) = self.probe.read_output().await? {
            if !obs.valid {
                continue;
            }
            let value = obs.value.ok_or_else(|| CheckError::MalformedTransaction {
                origin: self.origin,
                reason: format!("undefined value after {} items", forwarded),
            })?;
            if value > self.max_value {
                return Err(CheckError::ValueOutOfRange {
                    value,
                    bit_width: self.bit_width,
                });
            }
            let item = Transaction::new(value, self.origin);
            log::debug!("sampled {}", item);
            self.queue.put(item).await?;
            forwarded += 1;
        }
        log::debug!("{} sampler closed after {} items", self.origin, forwarded);
        Ok(forwarded)
    }
}
