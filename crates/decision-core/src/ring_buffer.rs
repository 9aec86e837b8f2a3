use std::collections::vec_deque::{Iter, VecDeque};

use serde::{Deserialize, Serialize};

use crate::DecisionError;

/// Fixed-capacity FIFO history. Pushing past capacity evicts the oldest
/// entry; it never fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
    evicted: u64,
}

impl<T> ExperienceBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self, DecisionError> {
        if capacity == 0 {
            return Err(DecisionError::invalid_config(
                "experience buffer capacity must be positive",
            ));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        })
    }

    /// Append an entry, returning the evicted one when full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.evicted += 1;
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted since construction
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    /// Oldest to newest
    pub fn iter(&self) -> Iter<'_, T> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ExperienceBuffer::<u32>::new(0).is_err());
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut buffer = ExperienceBuffer::new(3).unwrap();
        assert_eq!(buffer.push(1), None);
        assert_eq!(buffer.push(2), None);
        assert_eq!(buffer.push(3), None);
        assert!(buffer.is_full());

        assert_eq!(buffer.push(4), Some(1));
        assert_eq!(buffer.push(5), Some(2));

        let items: Vec<_> = buffer.iter().copied().collect();
        assert_eq!(items, vec![3, 4, 5]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.evicted_count(), 2);
    }
}
