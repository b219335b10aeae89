//! Designated execution context for observer events
//!
//! Native callbacks only enqueue. Everything that touches stream state or
//! user code runs here, one event at a time, in the order the engine raised
//! them. One FIFO queue serves every stream of a context, which keeps
//! per-stream ordering without any per-stream bookkeeping.

use crate::config::{BridgeConfig, DispatchMode};
use crate::events::NativeEvent;
use crate::observer::{EventSink, ObserverBridge};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

/// Message on the dispatcher queue
pub(crate) enum Envelope {
    Event(NativeEvent),
    Barrier(Barrier),
    Shutdown,
}

/// Signalled once every envelope queued before it has been handled
pub(crate) enum Barrier {
    Blocking(SyncSender<()>),
    Async(oneshot::Sender<()>),
}

impl Barrier {
    fn release(self) {
        match self {
            Barrier::Blocking(done) => {
                let _ = done.send(());
            }
            Barrier::Async(done) => {
                let _ = done.send(());
            }
        }
    }
}

enum Worker {
    Thread(std::thread::JoinHandle<()>),
    Task(tokio::task::JoinHandle<()>),
    Manual,
}

/// Owns the event queue and whatever drains it
pub(crate) struct Dispatcher {
    mode: DispatchMode,
    tx: mpsc::UnboundedSender<Envelope>,
    /// Queue receiver in manual mode; `None` once shut down
    manual_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    worker: Mutex<Option<Worker>>,
    /// Set before the worker is told to stop; queued events are then dropped
    stopped: Arc<AtomicBool>,
    bridge: ObserverBridge,
    flush_timeout: Duration,
}

impl Dispatcher {
    /// Create the queue and start draining it according to `config`
    ///
    /// # Errors
    ///
    /// - `IoError` if the dispatcher thread cannot be spawned
    /// - `InvalidConfig` for tokio mode outside a tokio runtime
    pub fn start(bridge: ObserverBridge, config: &BridgeConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));

        let (worker, manual_rx) = match config.dispatch_mode {
            DispatchMode::Thread => {
                let worker_bridge = bridge.clone();
                let worker_stopped = stopped.clone();
                let handle = std::thread::Builder::new()
                    .name(config.dispatcher_thread_name.clone())
                    .spawn(move || run_blocking(rx, worker_bridge, worker_stopped))?;
                (Worker::Thread(handle), None)
            }
            DispatchMode::Tokio => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                    Error::InvalidConfig(
                        "tokio dispatch mode requires a running tokio runtime".to_string(),
                    )
                })?;
                let worker_bridge = bridge.clone();
                let task = runtime.spawn(run_async(rx, worker_bridge, stopped.clone()));
                (Worker::Task(task), None)
            }
            DispatchMode::Manual => (Worker::Manual, Some(rx)),
        };

        info!("Started event dispatcher ({:?} mode)", config.dispatch_mode);

        Ok(Self {
            mode: config.dispatch_mode,
            tx,
            manual_rx: Mutex::new(manual_rx),
            worker: Mutex::new(Some(worker)),
            stopped,
            bridge,
            flush_timeout: config.flush_timeout(),
        })
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Entry point handed to the engine for native callbacks
    pub fn sink(&self) -> EventSink {
        EventSink::new(self.tx.clone())
    }

    /// Deliver every queued event on the calling thread (manual mode)
    ///
    /// Returns the number of events delivered. Always 0 in the other modes.
    /// The queue lock is released before each delivery, so callbacks may
    /// call this again.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            let envelope = {
                let mut guard = self.manual_rx.lock();
                let Some(rx) = guard.as_mut() else {
                    break;
                };
                match rx.try_recv() {
                    Ok(envelope) => envelope,
                    Err(_) => break,
                }
            };
            match envelope {
                Envelope::Event(event) => {
                    deliver_guarded(&self.bridge, event);
                    delivered += 1;
                }
                Envelope::Barrier(barrier) => barrier.release(),
                Envelope::Shutdown => break,
            }
        }
        delivered
    }

    /// Block until every event queued before this call has been delivered
    ///
    /// In manual mode the queue is drained inline. Must not be called from
    /// a callback running on the dispatcher thread: it would wait on itself
    /// until the flush timeout.
    pub fn flush(&self) -> Result<()> {
        if self.mode == DispatchMode::Manual {
            self.dispatch_pending();
            return Ok(());
        }

        let (done_tx, done_rx) = sync_channel(1);
        if self
            .tx
            .send(Envelope::Barrier(Barrier::Blocking(done_tx)))
            .is_err()
        {
            // Dispatcher gone: nothing left that could be delivered
            return Ok(());
        }

        match done_rx.recv_timeout(self.flush_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(Error::OperationTimeout(format!(
                "dispatcher flush did not complete within {:?}",
                self.flush_timeout
            ))),
        }
    }

    /// Async counterpart of [`flush`](Self::flush)
    pub async fn flush_async(&self) -> Result<()> {
        if self.mode == DispatchMode::Manual {
            self.dispatch_pending();
            return Ok(());
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self
            .tx
            .send(Envelope::Barrier(Barrier::Async(done_tx)))
            .is_err()
        {
            return Ok(());
        }

        tokio::time::timeout(self.flush_timeout, done_rx)
            .await
            .map(|_| ())
            .map_err(|_| {
                Error::OperationTimeout(format!(
                    "dispatcher flush did not complete within {:?}",
                    self.flush_timeout
                ))
            })
    }

    /// Stop draining; events still queued are dropped. Idempotent.
    ///
    /// A callback already running when this is called completes; in thread
    /// mode this call waits for it.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        // A delivery already running finishes; nothing queued behind it starts
        self.stopped.store(true, Ordering::SeqCst);

        match worker {
            Worker::Thread(handle) => {
                let _ = self.tx.send(Envelope::Shutdown);
                if handle.thread().id() == std::thread::current().id() {
                    // Last context reference dropped inside a delivery
                    debug!("Dispatcher shut down from its own thread, not joining");
                } else if handle.join().is_err() {
                    warn!("Dispatcher thread terminated with a panic");
                }
            }
            Worker::Task(_task) => {
                let _ = self.tx.send(Envelope::Shutdown);
            }
            Worker::Manual => {
                if let Some(mut rx) = self.manual_rx.lock().take() {
                    rx.close();
                    let mut dropped = 0usize;
                    while let Ok(envelope) = rx.try_recv() {
                        if let Envelope::Event(_) = envelope {
                            dropped += 1;
                        }
                    }
                    if dropped > 0 {
                        debug!("Dropped {} undelivered events at shutdown", dropped);
                    }
                }
            }
        }

        info!("Stopped event dispatcher ({:?} mode)", self.mode);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_blocking(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    bridge: ObserverBridge,
    stopped: Arc<AtomicBool>,
) {
    while let Some(envelope) = rx.blocking_recv() {
        if !handle_envelope(&bridge, &stopped, envelope) {
            break;
        }
    }
    debug!("Dispatcher thread exiting");
}

async fn run_async(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    bridge: ObserverBridge,
    stopped: Arc<AtomicBool>,
) {
    while let Some(envelope) = rx.recv().await {
        if !handle_envelope(&bridge, &stopped, envelope) {
            break;
        }
    }
    debug!("Dispatcher task exiting");
}

/// Returns `false` once the worker should stop
fn handle_envelope(bridge: &ObserverBridge, stopped: &AtomicBool, envelope: Envelope) -> bool {
    match envelope {
        Envelope::Event(event) if stopped.load(Ordering::SeqCst) => {
            trace!(
                "Dispatcher stopped, dropping {:?} of track {} on stream {}",
                event.kind, event.track, event.stream
            );
            true
        }
        Envelope::Event(event) => {
            deliver_guarded(bridge, event);
            true
        }
        Envelope::Barrier(barrier) => {
            barrier.release();
            true
        }
        Envelope::Shutdown => false,
    }
}

/// A panicking user callback must not take the dispatcher down with it
fn deliver_guarded(bridge: &ObserverBridge, event: NativeEvent) {
    if catch_unwind(AssertUnwindSafe(|| bridge.deliver(event))).is_err() {
        error!(
            "Callback panicked while delivering {:?} of track {} on stream {}",
            event.kind, event.track, event.stream
        );
    }
}
