//! Producer and consumer generation units.
//!
//! A sequence is one unit of traffic: the producer drives one random value
//! into the device, the consumer waits for the next valid output. Each
//! sequencer is a FIFO-fair mutex around the boundary handle, so concurrent
//! starts of the same sequence are served in arrival order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::device::{InputDriver, SignalProbe};
use crate::error::{CheckError, Result};
use crate::{Origin, Transaction};

/// A startable unit of traffic that yields a response.
#[async_trait(?Send)]
pub trait Sequence {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<Transaction>;
}

/// Most recent consumer response, shared between the consumer sequence and
/// whoever reads it afterwards. A later start overwrites it.
#[derive(Debug, Clone, Default)]
pub struct ResponseCell(Rc<Cell<Option<Transaction>>>);

impl ResponseCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, rsp: Transaction) {
        self.0.set(Some(rsp));
    }

    pub fn latest(&self) -> Option<Transaction> {
        self.0.get()
    }
}

/// Seeded source of valid stimulus values in `1..=max`.
#[derive(Debug, Clone)]
pub struct RandomValues {
    rng: StdRng,
    max: u64,
}

impl RandomValues {
    pub fn new(seed: u64, max: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max: max.max(1),
        }
    }

    pub fn next_value(&mut self) -> u64 {
        self.rng.gen_range(1..=self.max)
    }
}

/// Drives one random value for one cycle, then releases the bus.
pub struct ProducerSequence {
    driver: Rc<Mutex<Box<dyn InputDriver>>>,
    values: RefCell<RandomValues>,
}

impl ProducerSequence {
    pub fn new(driver: Box<dyn InputDriver>, values: RandomValues) -> Self {
        Self {
            driver: Rc::new(Mutex::new(driver)),
            values: RefCell::new(values),
        }
    }
}

#[async_trait(?Send)]
impl Sequence for ProducerSequence {
    fn name(&self) -> &str {
        "producer"
    }

    async fn start(&self) -> Result<Transaction> {
        let mut driver = self.driver.lock().await;
        let value = self.values.borrow_mut().next_value();
        log::debug!("producer drives {}", value);
        driver.write_input(value, true).await?;
        driver.write_input(0, false).await?;
        Ok(Transaction::new(value, Origin::ProducerSide))
    }
}

/// Waits for the next valid output and responds with it.
pub struct ConsumerSequence {
    probe: Rc<Mutex<Box<dyn SignalProbe>>>,
    response: ResponseCell,
}

impl ConsumerSequence {
    pub fn new(probe: Box<dyn SignalProbe>, response: ResponseCell) -> Self {
        Self {
            probe: Rc::new(Mutex::new(probe)),
            response,
        }
    }

    pub fn response(&self) -> &ResponseCell {
        &self.response
    }
}

#[async_trait(?Send)]
impl Sequence for ConsumerSequence {
    fn name(&self) -> &str {
        "consumer"
    }

    async fn start(&self) -> Result<Transaction> {
        let mut probe = self.probe.lock().await;
        let value = loop {
            match probe.read_output().await? {
                Some(obs) if obs.valid => {
                    break obs.value.ok_or_else(|| CheckError::MalformedTransaction {
                        origin: Origin::ConsumerSide,
                        reason: "undefined value on a valid output cycle".into(),
                    })?;
                }
                Some(_) => continue,
                None => return Err(CheckError::DeviceClosed),
            }
        };
        let rsp = Transaction::new(value, Origin::ConsumerSide);
        log::debug!("consumer response {}", rsp);
        self.response.publish(rsp);
        Ok(rsp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedProbe;
    use crate::Observation;

    #[test]
    fn random_values_stay_in_range_and_replay() {
        let mut a = RandomValues::new(7, 15);
        let mut b = RandomValues::new(7, 15);
        for _ in 0..200 {
            let v = a.next_value();
            assert!((1..=15).contains(&v));
            assert_eq!(v, b.next_value());
        }
    }

    #[test]
    fn one_bit_bus_always_drives_one() {
        let mut values = RandomValues::new(0, 1);
        assert!((0..20).all(|_| values.next_value() == 1));
    }

    #[tokio::test]
    async fn consumer_waits_for_valid_and_publishes() {
        let probe = ScriptedProbe::new(vec![
            Observation::idle(),
            Observation::valid(9),
            Observation::valid(3),
        ]);
        let seq = ConsumerSequence::new(Box::new(probe), ResponseCell::new());
        assert_eq!(seq.start().await.unwrap().value(), 9);
        assert_eq!(seq.response().latest().map(|r| r.value()), Some(9));
        assert_eq!(seq.start().await.unwrap().value(), 3);
        assert_eq!(seq.response().latest().map(|r| r.value()), Some(3));
        assert_eq!(seq.start().await, Err(CheckError::DeviceClosed));
    }

    #[tokio::test]
    async fn consumer_rejects_undefined_output() {
        let probe = ScriptedProbe::new(vec![Observation::undefined()]);
        let seq = ConsumerSequence::new(Box::new(probe), ResponseCell::new());
        assert!(matches!(
            seq.start().await,
            Err(CheckError::MalformedTransaction { .. })
        ));
        assert_eq!(seq.response().latest(), None);
    }
}
