//! Work queue shared by the sync workers
//!
//! Insertion always goes to the front and removal takes from the front, so the
//! most recently queued unit comes out first. A re-queued artifact is therefore
//! retried before untouched ones are drained.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    name: String,
    max_size: Option<usize>,
    items: VecDeque<T>,
}

impl<T> WorkQueue<T> {
    /// Unbounded queue
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_size: None,
            items: VecDeque::new(),
        }
    }

    /// Queue that silently drops units once it holds `max_size` of them
    pub fn bounded(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            name: name.into(),
            max_size: Some(max_size),
            items: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_room(&self) -> bool {
        match self.max_size {
            Some(max) => self.items.len() < max,
            None => true,
        }
    }

    /// Put one unit at the front. Returns false when the queue was full and
    /// the unit was dropped.
    pub fn enqueue(&mut self, unit: T) -> bool {
        if self.has_room() {
            self.items.push_front(unit);
            true
        } else {
            false
        }
    }

    /// Put every unit at the front in iteration order, so the last one ends up
    /// first. An empty iterator (or `None`) is a no-op.
    pub fn enqueue_all<I>(&mut self, units: I)
    where
        I: IntoIterator<Item = T>,
    {
        for unit in units {
            self.enqueue(unit);
        }
    }

    /// Remove the most recently queued unit
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// The unit [`dequeue`](Self::dequeue) would return
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// Units from next-out to last-out
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> WorkQueue<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
