use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};

/// Why an item was handed back by [`SlotQueue::try_push`].
#[derive(Debug)]
pub(crate) enum PushError<T> {
    Full(T),
    Closed(T),
}

impl<T> PushError<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Closed(item) => item,
        }
    }
}

/// Fixed-capacity FIFO of idle connections.
///
/// Both ends are non-blocking. Once closed, pushes are refused; whatever is
/// still queued stays there until someone drains it.
pub(crate) struct SlotQueue<T> {
    slots: ArrayQueue<T>,
    closed: AtomicBool,
}

impl<T> SlotQueue<T> {
    /// `capacity` must be non-zero.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn try_pop(&self) -> Option<T> {
        self.slots.pop()
    }

    pub(crate) fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        if self.is_closed() {
            return Err(PushError::Closed(item));
        }
        self.slots.push(item).map_err(PushError::Full)
    }

    /// Marks the queue closed. Returns `false` if it already was.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn drain(&self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.slots.len());
        while let Some(item) = self.slots.pop() {
            drained.push(item);
        }
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}
