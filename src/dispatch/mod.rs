// Hand-off queue between producer threads (network listener, HTTP control
// handlers) and the single consumer loop that owns playback state.
//
// Producers never block. The consumer drains the whole queue once per tick,
// running each action in FIFO order against its own state.

use std::fmt;
use tokio::sync::mpsc;

/// Deferred action executed on the consumer against its state `C`.
pub type Action<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

/// The consumer side has been dropped; nothing will run enqueued actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchClosed;

impl fmt::Display for DispatchClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch queue consumer is gone")
    }
}

impl std::error::Error for DispatchClosed {}

/// Create a connected producer/consumer pair.
pub fn channel<C>() -> (Dispatcher<C>, DispatchQueue<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, DispatchQueue { rx })
}

/// Producer handle. Cheap to clone and safe to move to other threads.
pub struct Dispatcher<C> {
    tx: mpsc::UnboundedSender<Action<C>>,
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> Dispatcher<C> {
    /// Queue `action` for the consumer without waiting on it.
    pub fn enqueue<F>(&self, action: F) -> Result<(), DispatchClosed>
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.tx.send(Box::new(action)).map_err(|_| DispatchClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer end, owned by the loop that owns `C`.
pub struct DispatchQueue<C> {
    rx: mpsc::UnboundedReceiver<Action<C>>,
}

impl<C> DispatchQueue<C> {
    /// Run every queued action in arrival order. Never blocks.
    ///
    /// Returns the number of actions executed.
    pub fn drain(&mut self, state: &mut C) -> usize {
        let mut executed = 0;
        while let Ok(action) = self.rx.try_recv() {
            action(state);
            executed += 1;
        }
        executed
    }
}
