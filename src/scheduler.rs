// Copyright (c) WSS Monitor Contributors
// SPDX-License-Identifier: MIT

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    },
    thread,
    time::{Duration, Instant},
};

/// What the timer was doing when it was told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStatus {
    /// The timer was waiting for its next deadline.
    Idle,
    /// A firing was in progress, cancel waited for it to drain.
    Busy,
}

/// Periodic timer on a dedicated thread, driven by monotonic deadlines.
///
/// The callback runs on the timer thread and must be bounded, it must
/// not sleep or block indefinitely. The next deadline is taken as
/// "now + interval" when a firing starts, so a callback that overruns
/// the interval makes the next firing happen immediately after it.
pub struct Scheduler {
    cancel_tx: Sender<()>,
    firing: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

impl Scheduler {
    /// Arms the timer. The first firing happens one full `interval`
    /// from now.
    pub fn start<F>(interval: Duration, on_fire: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = mpsc::channel();
        let firing = Arc::new(AtomicBool::new(false));
        let thread = thread::spawn({
            let firing = firing.clone();
            move || run(interval, cancel_rx, firing, on_fire)
        });
        Scheduler {
            cancel_tx,
            firing,
            thread,
        }
    }

    /// Stops the timer and joins its thread, so a firing still in
    /// progress fully drains before this returns. No firing happens
    /// afterwards. Reports whether the stop found one in progress.
    pub fn cancel(self) -> CancelStatus {
        let status = if self.firing.load(Ordering::SeqCst) {
            CancelStatus::Busy
        } else {
            CancelStatus::Idle
        };
        let _ = self.cancel_tx.send(());
        self.thread.join().unwrap();
        status
    }
}

fn run<F>(interval: Duration, cancel_rx: Receiver<()>, firing: Arc<AtomicBool>, mut on_fire: F)
where
    F: FnMut(),
{
    let mut deadline = Instant::now() + interval;
    loop {
        let now = Instant::now();
        if now < deadline {
            match cancel_rx.recv_timeout(deadline - now) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => (),
            }
        } else {
            match cancel_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => (),
            }
        }
        deadline = Instant::now() + interval;
        firing.store(true, Ordering::SeqCst);
        on_fire();
        firing.store(false, Ordering::SeqCst);
    }
}
