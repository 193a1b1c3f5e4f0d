//! Small sorted set of variable indices.
//!
//! Linear scans everywhere: the sets hold tens to hundreds of indices, and
//! iteration order (ascending) decides which variable wins a tie in both
//! algorithm phases. Any faster layout must keep that order.

use std::fmt;

use crate::error::{ClaError, ClaResult};

/// Fixed-capacity set of indices kept in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedIndexSet {
    items: Vec<usize>,
    capacity: usize,
}

impl OrderedIndexSet {
    /// Create an empty set that can hold up to `capacity` indices.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Element at position `pos` (ascending order).
    #[inline]
    pub fn at(&self, pos: usize) -> usize {
        self.items[pos]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().copied()
    }

    pub fn contains(&self, value: usize) -> bool {
        self.items.contains(&value)
    }

    /// Insert `value`, shifting larger elements one slot to the right.
    pub fn insert(&mut self, value: usize) -> ClaResult<()> {
        if self.items.len() >= self.capacity {
            return Err(ClaError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        debug_assert!(!self.contains(value), "duplicate index {value}");

        // Scan from the back, same as the shift loop it replaces.
        let mut pos = self.items.len();
        while pos > 0 && value <= self.items[pos - 1] {
            pos -= 1;
        }
        self.items.insert(pos, value);
        Ok(())
    }

    /// Position of `value`, or [`ClaError::IndexNotFound`].
    pub fn position_of(&self, value: usize) -> ClaResult<usize> {
        self.items
            .iter()
            .position(|&v| v == value)
            .ok_or(ClaError::IndexNotFound { value })
    }

    /// Remove the element at position `pos`.
    pub fn delete_at(&mut self, pos: usize) -> usize {
        self.items.remove(pos)
    }

    /// Remove `value`, failing if it is not a member.
    pub fn delete(&mut self, value: usize) -> ClaResult<()> {
        let pos = self.position_of(value)?;
        self.delete_at(pos);
        Ok(())
    }

    /// Change the capacity. Existing members are kept; shrinking below the
    /// current length truncates the largest ones.
    pub fn resize(&mut self, capacity: usize) {
        self.items.truncate(capacity);
        self.items.reserve(capacity.saturating_sub(self.items.len()));
        self.capacity = capacity;
    }
}

impl fmt::Display for OrderedIndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderedIndexSet: count={} [", self.items.len())?;
        for v in &self.items {
            write!(f, "{} ", v)?;
        }
        write!(f, "]")
    }
}
