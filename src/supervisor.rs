//! Adaptive traffic supervisor.
//!
//! Keeps exactly one producer task and one consumer task in flight,
//! relaunching whichever finishes first. A monitor task bound to the
//! current consumer adds each consumer response to a run-wide accumulator;
//! once it reaches the target the supervisor stops relaunching and detaches
//! whatever is still running.
//!
//! The monitor reads the consumer's shared response cell *after* its bound
//! task completed. A consumer relaunched in between may already have
//! overwritten the cell, in which case the monitor accumulates the newer
//! response. That interleaving is kept as is.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::task::{JoinError, JoinHandle};

use crate::error::{CheckError, Result};
use crate::invariant_ppt::{
    assert_invariant, ACTIVE_ONE_WAY, MONITOR_SINGLE_WRITER, SUPERVISOR_ONE_IN_FLIGHT,
    TERMINATION_AT_TARGET,
};
use crate::sequence::{ResponseCell, Sequence};
use crate::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Stopping,
    Stopped,
}

/// Which tasks have finished since they were launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completions {
    pub producer: bool,
    pub consumer: bool,
    pub monitor: bool,
}

/// Decision for one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub next: SupervisorState,
    pub relaunch_producer: bool,
    pub relaunch_consumer: bool,
    pub relaunch_monitor: bool,
}

impl StepPlan {
    fn hold(next: SupervisorState) -> Self {
        Self {
            next,
            relaunch_producer: false,
            relaunch_consumer: false,
            relaunch_monitor: false,
        }
    }
}

/// Pure transition function of the supervision loop.
///
/// While running and active, every finished task is replaced. Once the
/// accumulator deactivates the run, nothing is relaunched again.
pub fn next_state(state: SupervisorState, active: bool, done: Completions) -> StepPlan {
    match state {
        SupervisorState::Running if active => StepPlan {
            next: SupervisorState::Running,
            relaunch_producer: done.producer,
            relaunch_consumer: done.consumer,
            relaunch_monitor: done.monitor,
        },
        SupervisorState::Running => StepPlan::hold(SupervisorState::Stopping),
        SupervisorState::Stopping | SupervisorState::Stopped => {
            StepPlan::hold(SupervisorState::Stopped)
        }
    }
}

/// Set once the owning task's future has completed or been dropped.
#[derive(Debug, Clone, Default)]
pub struct DoneFlag(Rc<Cell<bool>>);

impl DoneFlag {
    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    fn guard(&self) -> DoneGuard {
        DoneGuard(self.clone())
    }
}

struct DoneGuard(DoneFlag);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        (self.0).0.set(true);
    }
}

/// A launched task plus what the loop needs to race and replace it.
struct TaskSlot<T> {
    name: &'static str,
    join: JoinHandle<Result<T>>,
    done: DoneFlag,
    settled: bool,
}

impl<T: 'static> TaskSlot<T> {
    fn spawn<F>(name: &'static str, fut: F) -> Self
    where
        F: std::future::Future<Output = Result<T>> + 'static,
    {
        let done = DoneFlag::default();
        let guard = done.guard();
        let join = tokio::task::spawn_local(async move {
            let _guard = guard;
            fut.await
        });
        Self {
            name,
            join,
            done,
            settled: false,
        }
    }

    fn is_finished(&self) -> bool {
        self.settled || self.done.is_set()
    }

    /// Take the outcome of a finished task that the race did not consume.
    async fn collect(&mut self) -> Option<Result<T>> {
        if self.settled {
            return None;
        }
        let outcome = (&mut self.join).await;
        Some(self.settle(outcome))
    }

    fn settle(&mut self, outcome: std::result::Result<Result<T>, JoinError>) -> Result<T> {
        self.settled = true;
        outcome.map_err(|e| CheckError::TaskFailed {
            task: self.name,
            reason: e.to_string(),
        })?
    }
}

/// Responses kept for the run report; older ones are dropped.
pub const HISTORY_LIMIT: usize = 1024;

/// Run-wide accumulator of consumer responses.
///
/// Only the consumer monitor writes it.
#[derive(Debug)]
pub struct CompletionState {
    target: u64,
    data_adder: Cell<u64>,
    replayed: Cell<u64>,
    responses: Cell<u64>,
    active: Cell<bool>,
    history: RefCell<VecDeque<u64>>,
}

impl CompletionState {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            data_adder: Cell::new(0),
            replayed: Cell::new(0),
            responses: Cell::new(0),
            active: Cell::new(true),
            history: RefCell::new(VecDeque::new()),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn data_adder(&self) -> u64 {
        self.data_adder.get()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Number of responses accumulated so far.
    pub fn responses(&self) -> u64 {
        self.responses.get()
    }

    /// The most recent responses, oldest first, at most [`HISTORY_LIMIT`].
    pub fn history(&self) -> Vec<u64> {
        self.history.borrow().iter().copied().collect()
    }

    fn accumulate(&self, value: u64) {
        // Whatever the last call left behind must still be there.
        assert_invariant(
            MONITOR_SINGLE_WRITER,
            self.data_adder.get() == self.replayed.get(),
            "accumulator changed outside the monitor",
            Some("CompletionState::accumulate"),
        );
        let was_active = self.active.get();
        let adder = self.replayed.get().saturating_add(value);
        self.replayed.set(adder);
        self.data_adder.set(adder);
        self.responses.set(self.responses.get() + 1);
        {
            let mut history = self.history.borrow_mut();
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(value);
        }
        if adder >= self.target {
            self.active.set(false);
        }

        assert_invariant(
            ACTIVE_ONE_WAY,
            was_active || !self.active.get(),
            "active must never return to true",
            Some("CompletionState::accumulate"),
        );
        assert_invariant(
            TERMINATION_AT_TARGET,
            !self.active.get() || adder < self.target,
            "run must deactivate once the target is reached",
            Some("CompletionState::accumulate"),
        );
    }
}

/// Wait for the bound consumer task, then fold its response into the
/// accumulator.
async fn monitor_consumer(
    consumer_done: DoneFlag,
    response: ResponseCell,
    completion: Rc<CompletionState>,
) -> Result<()> {
    while !consumer_done.is_set() {
        tokio::task::yield_now().await;
    }
    match response.latest() {
        Some(rsp) => {
            log::info!("adder: {}, resp: {}", completion.data_adder(), rsp);
            completion.accumulate(rsp.value());
        }
        None => log::warn!("consumer finished without a response"),
    }
    Ok(())
}

/// Summary of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub data_adder: u64,
    pub target: u64,
    pub producer_launches: u64,
    pub consumer_launches: u64,
    pub monitor_launches: u64,
    pub responses_monitored: u64,
    /// Tasks still running when the loop stopped.
    pub detached_in_flight: u64,
    /// The most recent accumulated responses, in order, at most
    /// [`HISTORY_LIMIT`].
    pub history: Vec<u64>,
}

pub struct Supervisor {
    producer: Rc<dyn Sequence>,
    consumer: Rc<dyn Sequence>,
    response: ResponseCell,
    completion: Rc<CompletionState>,
    producer_launches: u64,
    consumer_launches: u64,
    monitor_launches: u64,
}

impl Supervisor {
    /// `response` must be the cell the consumer sequence publishes to.
    pub fn new(
        producer: Rc<dyn Sequence>,
        consumer: Rc<dyn Sequence>,
        response: ResponseCell,
        target: u64,
    ) -> Self {
        Self {
            producer,
            consumer,
            response,
            completion: Rc::new(CompletionState::new(target)),
            producer_launches: 0,
            consumer_launches: 0,
            monitor_launches: 0,
        }
    }

    pub fn get_accumulated(&self) -> u64 {
        self.completion.data_adder()
    }

    pub fn completion(&self) -> &CompletionState {
        &self.completion
    }

    fn launch_producer(&mut self) -> TaskSlot<Transaction> {
        self.producer_launches += 1;
        log::debug!(
            "launch {} sequence #{}",
            self.producer.name(),
            self.producer_launches
        );
        let seq = Rc::clone(&self.producer);
        TaskSlot::spawn("producer", async move { seq.start().await })
    }

    fn launch_consumer(&mut self) -> TaskSlot<Transaction> {
        self.consumer_launches += 1;
        log::debug!(
            "launch {} sequence #{}",
            self.consumer.name(),
            self.consumer_launches
        );
        let seq = Rc::clone(&self.consumer);
        TaskSlot::spawn("consumer", async move { seq.start().await })
    }

    fn launch_monitor(&mut self, consumer: &TaskSlot<Transaction>) -> TaskSlot<()> {
        self.monitor_launches += 1;
        log::debug!("launch consumer monitor #{}", self.monitor_launches);
        TaskSlot::spawn(
            "monitor",
            monitor_consumer(
                consumer.done.clone(),
                self.response.clone(),
                Rc::clone(&self.completion),
            ),
        )
    }

    /// Supervise until the accumulator reaches its target.
    ///
    /// Must be polled inside a `LocalSet`. Never returns if the target is
    /// unreachable; callers bound it with a timeout.
    pub async fn run(&mut self) -> Result<SupervisorReport> {
        log::info!("accumulator target = {}", self.completion.target());

        let mut state = SupervisorState::Running;
        let mut failure: Option<CheckError> = None;
        let mut detached = 0u64;

        let mut producer = self.launch_producer();
        let mut consumer = self.launch_consumer();
        let mut monitor = self.launch_monitor(&consumer);

        loop {
            let done = Completions {
                producer: producer.is_finished(),
                consumer: consumer.is_finished(),
                monitor: monitor.is_finished(),
            };
            let active = failure.is_none() && self.completion.is_active();
            let plan = next_state(state, active, done);

            // A failed outcome is kept and its task is not replaced.
            if plan.relaunch_producer {
                if let Some(Err(e)) = producer.collect().await {
                    failure.get_or_insert(e);
                }
                if failure.is_none() {
                    producer = self.launch_producer();
                }
            }
            if plan.relaunch_consumer {
                if let Some(Err(e)) = consumer.collect().await {
                    failure.get_or_insert(e);
                }
                if failure.is_none() {
                    consumer = self.launch_consumer();
                }
            }
            if plan.relaunch_monitor {
                if let Some(Err(e)) = monitor.collect().await {
                    failure.get_or_insert(e);
                }
                if failure.is_none() {
                    monitor = self.launch_monitor(&consumer);
                }
            }
            state = plan.next;

            match state {
                // Failed while relaunching; the next step stops the run.
                SupervisorState::Running if failure.is_some() => {}
                SupervisorState::Running => {
                    assert_invariant(
                        SUPERVISOR_ONE_IN_FLIGHT,
                        !producer.settled && !consumer.settled,
                        "one producer and one consumer must be in flight",
                        Some("Supervisor::run"),
                    );
                    let outcome = tokio::select! {
                        biased;
                        out = &mut producer.join, if !producer.settled => {
                            producer.settle(out).map(|_| ())
                        }
                        out = &mut consumer.join, if !consumer.settled => {
                            consumer.settle(out).map(|_| ())
                        }
                        else => Ok(()),
                    };
                    if let Err(e) = outcome {
                        log::error!("supervised task failed: {}", e);
                        failure.get_or_insert(e);
                    }
                }
                SupervisorState::Stopping => {
                    detached = [
                        producer.is_finished(),
                        consumer.is_finished(),
                        monitor.is_finished(),
                    ]
                    .iter()
                    .filter(|finished| !**finished)
                    .count() as u64;
                    if detached > 0 {
                        log::warn!("stopping with {} task(s) still in flight; detaching", detached);
                    }
                }
                SupervisorState::Stopped => break,
            }
        }

        log::info!(
            "supervisor stopped: adder {} / target {}, launches p={} c={} m={}",
            self.completion.data_adder(),
            self.completion.target(),
            self.producer_launches,
            self.consumer_launches,
            self.monitor_launches
        );

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(SupervisorReport {
            data_adder: self.completion.data_adder(),
            target: self.completion.target(),
            producer_launches: self.producer_launches,
            consumer_launches: self.consumer_launches,
            monitor_launches: self.monitor_launches,
            responses_monitored: self.completion.responses(),
            detached_in_flight: detached,
            history: self.completion.history(),
        })
    }
}
