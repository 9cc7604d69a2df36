//! Parallel pipelines over bounded queues.
//!
//! Both directions of the tool share one shape:
//!
//! ```text
//! feeder ──► bounded queue ──► worker pool ──► results ──► aggregator
//! ```
//!
//! A single feeder owns the input order, workers compete for items and
//! complete in any order, and results that need folding flow to a single
//! aggregator. Queues are bounded, so a slow stage backpressures the
//! fast ones instead of buffering without limit.
//!
//! The first fatal error from any thread trips [`JobControl`], which
//! unblocks every pending queue operation so the job winds down promptly
//! and reports that error. Row-level problems never reach the control;
//! the stage that hit them logs, counts, and moves on.

pub use aggregate::{ExtractConfig, ExtractReport, SummaryConfig, extract_images, summarize};
pub use build::{BuildConfig, BuildReport, build_shards};

mod aggregate;
mod build;

use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError, select};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

/// Worker count for a configured value, where 0 means all cores.
pub(crate) fn thread_count(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Shared cancellation signal plus first-error slot for one job.
///
/// Cancellation is edge-triggered: [`fail`](JobControl::fail) stores the
/// first error and drops the sentinel sender, which disconnects `done`
/// and makes every pending [`send`](JobControl::send) or
/// [`recv`](JobControl::recv) return immediately. There is nothing to
/// reset; a control lives for exactly one job.
#[derive(Clone)]
pub(crate) struct JobControl {
    done: Receiver<Infallible>,
    gate: Arc<Mutex<Gate>>,
}

struct Gate {
    sentinel: Option<Sender<Infallible>>,
    first_error: Option<Error>,
}

impl JobControl {
    pub(crate) fn new() -> Self {
        let (sentinel, done) = crossbeam_channel::bounded(0);
        Self {
            done,
            gate: Arc::new(Mutex::new(Gate {
                sentinel: Some(sentinel),
                first_error: None,
            })),
        }
    }

    /// Record `error` if it is the first, and trip cancellation.
    pub(crate) fn fail(&self, error: Error) {
        let mut gate = self.gate.lock().expect("job gate poisoned");
        if gate.first_error.is_none() {
            gate.first_error = Some(error);
        }
        gate.sentinel.take();
    }

    /// Whether cancellation has tripped.
    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Send on `queue`, racing cancellation. Returns false when the job
    /// is winding down, either cancelled or with every receiver gone.
    pub(crate) fn send<T>(&self, queue: &Sender<T>, value: T) -> bool {
        select! {
            send(queue, value) -> sent => sent.is_ok(),
            recv(self.done) -> _ => false,
        }
    }

    /// Receive from `queue`, racing cancellation. Returns `None` when
    /// the queue is drained and closed, or the job is winding down.
    pub(crate) fn recv<T>(&self, queue: &Receiver<T>) -> Option<T> {
        select! {
            recv(queue) -> received => received.ok(),
            recv(self.done) -> _ => None,
        }
    }

    /// The job outcome: the first recorded error, if any.
    pub(crate) fn finish(self) -> Result<()> {
        let mut gate = self.gate.lock().expect("job gate poisoned");
        match gate.first_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn clean_control_finishes_ok() {
        let ctl = JobControl::new();
        assert!(!ctl.is_cancelled());
        assert!(ctl.finish().is_ok());
    }

    #[test]
    fn fail_trips_cancellation_and_reports() {
        let ctl = JobControl::new();
        ctl.fail(Error::InvalidHeaderChecksum);
        assert!(ctl.is_cancelled());
        assert!(matches!(ctl.finish(), Err(Error::InvalidHeaderChecksum)));
    }

    #[test]
    fn first_error_wins() {
        let ctl = JobControl::new();
        ctl.fail(Error::InvalidHeaderChecksum);
        ctl.fail(Error::InvalidPayloadChecksum);
        assert!(matches!(ctl.finish(), Err(Error::InvalidHeaderChecksum)));
    }

    #[test]
    fn fail_unblocks_a_pending_recv() {
        let ctl = JobControl::new();
        let (tx, rx) = bounded::<u32>(1);

        let waiter = {
            let ctl = ctl.clone();
            thread::spawn(move || ctl.recv(&rx))
        };
        thread::sleep(Duration::from_millis(20));
        ctl.fail(Error::InvalidHeaderChecksum);

        assert_eq!(waiter.join().unwrap(), None);
        drop(tx);
    }

    #[test]
    fn fail_unblocks_a_pending_send() {
        let ctl = JobControl::new();
        // Zero capacity: the send can only complete via cancellation.
        let (tx, rx) = bounded::<u32>(0);

        let sender = {
            let ctl = ctl.clone();
            thread::spawn(move || ctl.send(&tx, 7))
        };
        thread::sleep(Duration::from_millis(20));
        ctl.fail(Error::InvalidHeaderChecksum);

        assert!(!sender.join().unwrap());
        drop(rx);
    }

    #[test]
    fn recv_drains_then_reports_closed() {
        let ctl = JobControl::new();
        let (tx, rx) = bounded::<u32>(2);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        assert_eq!(ctl.recv(&rx), Some(1));
        assert_eq!(ctl.recv(&rx), Some(2));
        assert_eq!(ctl.recv(&rx), None);
    }

    #[test]
    fn send_reports_closed_queue() {
        let ctl = JobControl::new();
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);
        assert!(!ctl.send(&tx, 7));
    }

    #[test]
    fn thread_count_defaults_to_cores() {
        assert!(thread_count(0) >= 1);
        assert_eq!(thread_count(3), 3);
    }
}
