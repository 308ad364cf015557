//! Device boundary: the only way the engine touches the device under test.
//!
//! Pin-level driving and sampling live behind these traits. Futures are
//! `?Send` because everything runs on one thread inside a `LocalSet`.

use async_trait::async_trait;

use crate::config::DeviceParams;
use crate::error::Result;
use crate::queue::AnalysisFifo;
use crate::{Observation, Transaction};

/// One observation per device cycle.
#[async_trait(?Send)]
pub trait SignalProbe {
    /// `Ok(None)` once the boundary has shut down.
    async fn read_output(&mut self) -> Result<Option<Observation>>;
}

/// One drive per device cycle.
#[async_trait(?Send)]
pub trait InputDriver {
    async fn write_input(&mut self, value: u64, valid: bool) -> Result<()>;
}

/// A device the bench can be wired to.
pub trait DeviceBoundary {
    fn params(&self) -> DeviceParams;
    fn input_driver(&self) -> Box<dyn InputDriver>;
    /// A fresh tap on the input bus. Each call returns an independent reader.
    fn input_probe(&self) -> Box<dyn SignalProbe>;
    /// A fresh tap on the output bus. Each call returns an independent reader.
    fn output_probe(&self) -> Box<dyn SignalProbe>;
    /// Close every probe and driver handed out so far.
    fn shutdown(&self);
}

#[async_trait(?Send)]
impl SignalProbe for AnalysisFifo<Observation> {
    async fn read_output(&mut self) -> Result<Option<Observation>> {
        Ok(self.get().await)
    }
}

#[async_trait(?Send)]
impl SignalProbe for AnalysisFifo<Transaction> {
    async fn read_output(&mut self) -> Result<Option<Observation>> {
        Ok(self.get().await.map(Observation::from))
    }
}

#[async_trait(?Send)]
impl<P: SignalProbe + ?Sized> SignalProbe for Box<P> {
    async fn read_output(&mut self) -> Result<Option<Observation>> {
        (**self).read_output().await
    }
}

#[async_trait(?Send)]
impl<D: InputDriver + ?Sized> InputDriver for Box<D> {
    async fn write_input(&mut self, value: u64, valid: bool) -> Result<()> {
        (**self).write_input(value, valid).await
    }
}
