//! Single-owner state threads and coalesced notifications.
//!
//! [`Dispatcher`] replaces shared-state locking with message passing: one
//! thread owns a state value outright and everyone else sends it closures.
//! [`AsyncUpdater`] rides on top of a dispatcher to turn bursts of
//! notifications (typically from the audio thread) into a single queued
//! delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::{Error, Result};

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Task(Task<S>),
    Quit,
}

/// A thread that owns a state value and executes closures against it.
///
/// Tasks run strictly in submission order. Dropping the dispatcher stops
/// the thread after the tasks already queued have run; handles that
/// outlive it get [`Error::DispatcherGone`] from then on.
pub struct Dispatcher<S: Send + 'static> {
    handle: DispatcherHandle<S>,
    thread: Option<JoinHandle<()>>,
}

/// Cloneable submission handle to a [`Dispatcher`].
pub struct DispatcherHandle<S> {
    sender: Sender<Message<S>>,
    thread_id: ThreadId,
}

impl<S> Clone for DispatcherHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            thread_id: self.thread_id,
        }
    }
}

impl<S: Send + 'static> Dispatcher<S> {
    /// Spawns a named dispatcher thread owning `state`.
    pub fn spawn(name: &str, mut state: S) -> Result<Self> {
        let (sender, receiver): (Sender<Message<S>>, Receiver<Message<S>>) = unbounded();
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Task(task) => task(&mut state),
                        Message::Quit => break,
                    }
                }
            })?;
        let thread_id = thread.thread().id();
        Ok(Self {
            handle: DispatcherHandle { sender, thread_id },
            thread: Some(thread),
        })
    }

    /// A cloneable handle for submitting work from other owners.
    pub fn handle(&self) -> DispatcherHandle<S> {
        self.handle.clone()
    }

    /// Queues a closure to run against the state.
    pub fn post(&self, task: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        self.handle.post(task)
    }

    /// Runs a closure against the state and waits for its result.
    pub fn call<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R> {
        self.handle.call(task)
    }
}

impl<S: Send + 'static> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        let _ = self.handle.sender.send(Message::Quit);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl<S: Send + 'static> DispatcherHandle<S> {
    /// Queues a closure to run against the state.
    pub fn post(&self, task: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        self.sender
            .send(Message::Task(Box::new(task)))
            .map_err(|_| Error::DispatcherGone)
    }

    /// True when the calling thread is the dispatcher's own thread.
    pub fn is_dispatcher_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Asserts the calling thread is the dispatcher's thread.
    ///
    /// For code guarding thread-affine state: mutation of anything a
    /// dispatcher task reaches must happen only from its tasks.
    pub fn assert_dispatcher_thread(&self) {
        assert!(self.is_dispatcher_thread(), "not on the dispatcher thread");
    }

    /// Runs a closure against the state and waits for its result.
    ///
    /// # Panics
    ///
    /// Panics when invoked from the dispatcher's own thread; a task that
    /// already holds the state must not wait for itself. Code running on
    /// the dispatcher already has `&mut S` and should use it directly.
    pub fn call<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R> {
        assert!(
            !self.is_dispatcher_thread(),
            "synchronous call from the dispatcher's own thread"
        );
        let (reply, result) = bounded(1);
        self.post(move |state| {
            let _ = reply.send(task(state));
        })?;
        result.recv().map_err(|_| Error::DispatcherGone)
    }
}

/// Coalesces bursts of triggers into single deliveries.
///
/// [`trigger`](Self::trigger) is callable from any thread. The first
/// trigger queues the callback on the dispatcher; further triggers before
/// the callback runs are absorbed. The pending flag resets at the start of
/// delivery, so a trigger arriving while the callback runs queues a fresh
/// delivery instead of being lost.
pub struct AsyncUpdater<S: Send + 'static> {
    handle: DispatcherHandle<S>,
    pending: Arc<AtomicBool>,
    callback: Arc<dyn Fn(&mut S) + Send + Sync>,
}

impl<S: Send + 'static> AsyncUpdater<S> {
    /// Creates an updater delivering `callback` on `handle`'s thread.
    pub fn new(handle: DispatcherHandle<S>, callback: impl Fn(&mut S) + Send + Sync + 'static) -> Self {
        Self {
            handle,
            pending: Arc::new(AtomicBool::new(false)),
            callback: Arc::new(callback),
        }
    }

    /// Requests a delivery; returns whether one was newly queued.
    ///
    /// Submission failure (dispatcher gone) silently clears the request.
    pub fn trigger(&self) -> bool {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let pending = Arc::clone(&self.pending);
        let callback = Arc::clone(&self.callback);
        let queued = self.handle.post(move |state| {
            if pending.swap(false, Ordering::AcqRel) {
                callback(state);
            }
        });
        if queued.is_err() {
            self.pending.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Withdraws a queued delivery, if any.
    pub fn cancel_pending(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Whether a delivery is queued and not yet started.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Delivers the callback right now, withdrawing any queued delivery.
    ///
    /// Must be invoked from a dispatcher task, which is the only place
    /// `&mut S` exists.
    pub fn handle_now(&self, state: &mut S) {
        self.handle.assert_dispatcher_thread();
        self.pending.store(false, Ordering::Release);
        (self.callback)(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_submission_order() {
        let dispatcher = Dispatcher::spawn("test-order", Vec::new()).unwrap();
        for i in 0..10 {
            dispatcher.post(move |log: &mut Vec<usize>| log.push(i)).unwrap();
        }
        let log = dispatcher.call(|log| log.clone()).unwrap();
        assert_eq!(log, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn call_returns_task_results() {
        let dispatcher = Dispatcher::spawn("test-call", 41i32).unwrap();
        let answer = dispatcher
            .call(|state| {
                *state += 1;
                *state
            })
            .unwrap();
        assert_eq!(answer, 42);
    }

    #[test]
    fn handles_survive_across_threads() {
        let dispatcher = Dispatcher::spawn("test-handle", 0usize).unwrap();
        let handle = dispatcher.handle();
        let worker = thread::spawn(move || {
            for _ in 0..100 {
                handle.post(|count| *count += 1).unwrap();
            }
        });
        worker.join().unwrap();
        assert_eq!(dispatcher.call(|count| *count).unwrap(), 100);
    }

    #[test]
    fn call_from_own_thread_panics() {
        let dispatcher = Dispatcher::spawn("test-reenter", ()).unwrap();
        let handle = dispatcher.handle();
        let caught = dispatcher
            .call(move |_| {
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let _ = handle.call(|_| ());
                }))
                .is_err()
            })
            .unwrap();
        assert!(caught);
    }

    #[test]
    fn post_after_shutdown_errors() {
        let dispatcher = Dispatcher::spawn("test-shutdown", ()).unwrap();
        let handle = dispatcher.handle();
        drop(dispatcher);
        assert!(matches!(handle.post(|_| ()), Err(Error::DispatcherGone)));
    }

    #[test]
    fn updater_coalesces_triggers() {
        let dispatcher = Dispatcher::spawn("test-updater", 0usize).unwrap();
        let updater = AsyncUpdater::new(dispatcher.handle(), |count| *count += 1);

        // Hold the dispatcher so all four triggers land before delivery.
        let (gate_tx, gate_rx) = bounded::<()>(0);
        dispatcher
            .post(move |_| {
                gate_rx.recv().unwrap();
            })
            .unwrap();

        assert!(updater.trigger());
        assert!(!updater.trigger());
        assert!(!updater.trigger());
        assert!(!updater.trigger());
        assert!(updater.is_pending());
        gate_tx.send(()).unwrap();

        assert_eq!(dispatcher.call(|count| *count).unwrap(), 1);

        // A trigger after delivery queues a fresh one.
        assert!(updater.trigger());
        assert_eq!(dispatcher.call(|count| *count).unwrap(), 2);
    }

    #[test]
    fn cancelled_update_is_not_delivered() {
        let dispatcher = Dispatcher::spawn("test-cancel", 0usize).unwrap();
        let updater = AsyncUpdater::new(dispatcher.handle(), |count| *count += 1);

        let (gate_tx, gate_rx) = bounded::<()>(0);
        dispatcher
            .post(move |_| {
                gate_rx.recv().unwrap();
            })
            .unwrap();

        assert!(updater.trigger());
        updater.cancel_pending();
        gate_tx.send(()).unwrap();

        assert_eq!(dispatcher.call(|count| *count).unwrap(), 0);
    }

    #[test]
    fn handle_now_delivers_and_withdraws_the_queued_one() {
        let dispatcher = Dispatcher::spawn("test-now", 0usize).unwrap();
        let updater = AsyncUpdater::new(dispatcher.handle(), |count| *count += 1);

        dispatcher
            .call(move |count| {
                // Queues a delivery behind this task, then preempts it.
                assert!(updater.trigger());
                updater.handle_now(count);
            })
            .unwrap();

        // The queued delivery found the pending flag already cleared.
        assert_eq!(dispatcher.call(|count| *count).unwrap(), 1);
    }

    #[test]
    fn thread_identity_is_visible_to_tasks() {
        let dispatcher = Dispatcher::spawn("test-identity", ()).unwrap();
        let handle = dispatcher.handle();
        assert!(!handle.is_dispatcher_thread());
        let inner = handle.clone();
        let on_thread = dispatcher
            .call(move |_| {
                inner.assert_dispatcher_thread();
                inner.is_dispatcher_thread()
            })
            .unwrap();
        assert!(on_thread);
    }
}
