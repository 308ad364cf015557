//! In-process device simulation for exercising the bench end to end.
//!
//! `SimDevice` is a loopback saturating accumulator. Every drive is one
//! cycle: the input is broadcast to every input tap, the new output to
//! every output tap. No timing is modelled.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;

use crate::config::DeviceParams;
use crate::device::{DeviceBoundary, InputDriver, SignalProbe};
use crate::error::{CheckError, Result};
use crate::queue::{analysis_port, AnalysisPort};
use crate::Observation;

#[derive(Debug)]
struct SimState {
    params: DeviceParams,
    sum: u64,
    cycles: u64,
    outputs: u64,
    fault: Option<OutputFault>,
    input_taps: Vec<AnalysisPort<Observation>>,
    output_taps: Vec<AnalysisPort<Observation>>,
    closed: bool,
}

#[derive(Debug, Clone, Copy)]
struct OutputFault {
    nth: u64,
    xor: u64,
}

impl SimState {
    fn cycle(&mut self, value: u64, valid: bool) -> Result<()> {
        if self.closed {
            return Err(CheckError::DeviceClosed);
        }
        self.params.check_value(value)?;
        self.cycles += 1;
        broadcast(&mut self.input_taps, Observation { value: Some(value), valid });

        let output = if valid {
            let threshold = self.params.threshold();
            self.sum = (self.sum as u128 + value as u128).min(threshold as u128) as u64;
            let mut out = self.sum;
            if let Some(fault) = self.fault {
                if fault.nth == self.outputs {
                    out = (out ^ fault.xor) & self.params.max_value();
                }
            }
            self.outputs += 1;
            Observation::valid(out)
        } else {
            Observation::idle()
        };
        broadcast(&mut self.output_taps, output);
        Ok(())
    }
}

fn broadcast(taps: &mut Vec<AnalysisPort<Observation>>, obs: Observation) {
    taps.retain(|tap| tap.write(obs));
}

/// Cloneable handle to one simulated device.
#[derive(Debug, Clone)]
pub struct SimDevice(Rc<RefCell<SimState>>);

impl SimDevice {
    pub fn new(params: DeviceParams) -> Self {
        Self(Rc::new(RefCell::new(SimState {
            params,
            sum: 0,
            cycles: 0,
            outputs: 0,
            fault: None,
            input_taps: Vec::new(),
            output_taps: Vec::new(),
            closed: false,
        })))
    }

    /// Corrupt the `nth` valid output (0-based) by xor-ing it with `xor`.
    pub fn with_fault(self, nth: u64, xor: u64) -> Self {
        self.0.borrow_mut().fault = Some(OutputFault { nth, xor });
        self
    }

    pub fn cycles(&self) -> u64 {
        self.0.borrow().cycles
    }

    pub fn sum(&self) -> u64 {
        self.0.borrow().sum
    }

    pub fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }
}

impl DeviceBoundary for SimDevice {
    fn params(&self) -> DeviceParams {
        self.0.borrow().params
    }

    fn input_driver(&self) -> Box<dyn InputDriver> {
        Box::new(SimDriver(Rc::clone(&self.0)))
    }

    fn input_probe(&self) -> Box<dyn SignalProbe> {
        let (port, fifo) = analysis_port();
        self.0.borrow_mut().input_taps.push(port);
        Box::new(fifo)
    }

    fn output_probe(&self) -> Box<dyn SignalProbe> {
        let (port, fifo) = analysis_port();
        self.0.borrow_mut().output_taps.push(port);
        Box::new(fifo)
    }

    fn shutdown(&self) {
        let mut state = self.0.borrow_mut();
        state.closed = true;
        state.input_taps.clear();
        state.output_taps.clear();
        log::debug!("sim device closed after {} cycles", state.cycles);
    }
}

struct SimDriver(Rc<RefCell<SimState>>);

#[async_trait(?Send)]
impl InputDriver for SimDriver {
    async fn write_input(&mut self, value: u64, valid: bool) -> Result<()> {
        self.0.borrow_mut().cycle(value, valid)?;
        // One cycle per drive; let the taps' readers run.
        tokio::task::yield_now().await;
        Ok(())
    }
}

/// Probe replaying a fixed observation stream, then reporting shutdown.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    script: VecDeque<Observation>,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = Observation>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

#[async_trait(?Send)]
impl SignalProbe for ScriptedProbe {
    async fn read_output(&mut self) -> Result<Option<Observation>> {
        Ok(self.script.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_saturates_and_broadcasts() {
        let sim = SimDevice::new(DeviceParams::new(Some(8), 4).unwrap());
        let mut input = sim.input_probe();
        let mut output = sim.output_probe();
        let mut driver = sim.input_driver();
        for v in [3, 4, 5] {
            driver.write_input(v, true).await.unwrap();
        }
        driver.write_input(0, false).await.unwrap();
        sim.shutdown();

        let mut seen_in = Vec::new();
        while let Some(obs) = input.read_output().await.unwrap() {
            seen_in.push(obs);
        }
        let mut seen_out = Vec::new();
        while let Some(obs) = output.read_output().await.unwrap() {
            seen_out.push(obs);
        }
        assert_eq!(seen_in[..3], [Observation::valid(3), Observation::valid(4), Observation::valid(5)]);
        assert!(!seen_in[3].valid);
        assert_eq!(seen_out[..3], [Observation::valid(3), Observation::valid(7), Observation::valid(8)]);
        assert_eq!(seen_out[3], Observation::idle());
        assert_eq!(sim.cycles(), 4);
    }

    #[tokio::test]
    async fn fault_corrupts_one_output() {
        let sim = SimDevice::new(DeviceParams::default()).with_fault(1, 0b1);
        let mut output = sim.output_probe();
        let mut driver = sim.input_driver();
        driver.write_input(1, true).await.unwrap();
        driver.write_input(1, true).await.unwrap();
        assert_eq!(output.read_output().await.unwrap(), Some(Observation::valid(1)));
        assert_eq!(output.read_output().await.unwrap(), Some(Observation::valid(3)));
    }

    #[tokio::test]
    async fn closed_device_refuses_drives() {
        let sim = SimDevice::new(DeviceParams::default());
        let mut driver = sim.input_driver();
        sim.shutdown();
        assert_eq!(driver.write_input(1, true).await, Err(CheckError::DeviceClosed));
    }

    #[tokio::test]
    async fn scripted_probe_ends_with_none() {
        let mut probe = ScriptedProbe::new(vec![Observation::valid(2)]);
        assert_eq!(probe.read_output().await, Ok(Some(Observation::valid(2))));
        assert_eq!(probe.read_output().await, Ok(None));
    }
}
