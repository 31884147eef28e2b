use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Value paired with its weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weighted<V> {
    pub value: V,
    pub weight: f64,
}

/// Small priority queue of distinct values ordered by decreasing weight.
///
/// Entries are kept sorted, so the heaviest value is always at the front.
/// Equal weights are ordered by increasing value, which makes [`WeightQueue::peek`]
/// deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightQueue<V> {
    entry_vec: Vec<Weighted<V>>,
}

impl<V: Ord + Copy> WeightQueue<V> {
    pub fn new() -> Self {
        Self {
            entry_vec: Vec::new(),
        }
    }

    /// Insert `value` with `weight`, or set its weight if already present.
    pub fn insert(&mut self, value: V, weight: f64) {
        self.remove(value);
        let entry = Weighted { value, weight };
        let i_entry = self
            .entry_vec
            .partition_point(|other| cmp_entries(other, &entry) == Ordering::Less);
        self.entry_vec.insert(i_entry, entry);
    }

    /// Set the weight of `value`. Returns `false` if it is not present.
    pub fn set_weight(&mut self, value: V, weight: f64) -> bool {
        if !self.contains(value) {
            return false;
        }
        self.insert(value, weight);
        true
    }

    pub fn remove(&mut self, value: V) -> bool {
        match self.position(value) {
            Some(i_entry) => {
                self.entry_vec.remove(i_entry);
                true
            }
            None => false,
        }
    }

    pub fn weight(&self, value: V) -> Option<f64> {
        self.position(value)
            .map(|i_entry| self.entry_vec[i_entry].weight)
    }

    pub fn contains(&self, value: V) -> bool {
        self.position(value).is_some()
    }

    /// Heaviest value.
    pub fn peek(&self) -> Option<V> {
        self.entry_vec.first().map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entry_vec.len()
    }

    /// Entries from heaviest to lightest.
    pub fn iter(&self) -> impl Iterator<Item = &Weighted<V>> {
        self.entry_vec.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.entry_vec.iter().map(|entry| entry.value)
    }

    fn position(&self, value: V) -> Option<usize> {
        self.entry_vec.iter().position(|entry| entry.value == value)
    }
}

impl<V: Ord + Copy> Default for WeightQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn cmp_entries<V: Ord>(a: &Weighted<V>, b: &Weighted<V>) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.value.cmp(&b.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_returns_heaviest_value() {
        let mut queue = WeightQueue::new();
        queue.insert(10, 1.0);
        queue.insert(20, 2.5);
        queue.insert(30, 0.5);
        assert_eq!(queue.peek(), Some(20));

        queue.set_weight(30, 3.0);
        assert_eq!(queue.peek(), Some(30));

        let order: Vec<_> = queue.values().collect();
        assert_eq!(order, vec![30, 20, 10]);
    }

    #[test]
    fn insert_existing_value_updates_weight() {
        let mut queue = WeightQueue::new();
        queue.insert(1, 1.0);
        queue.insert(1, 2.0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.weight(1), Some(2.0));
    }

    #[test]
    fn ties_are_broken_by_lowest_value() {
        let mut queue = WeightQueue::new();
        queue.insert(7, 1.0);
        queue.insert(3, 1.0);
        queue.insert(5, 1.0);
        assert_eq!(queue.peek(), Some(3));
    }

    #[test]
    fn missing_values_are_reported() {
        let mut queue: WeightQueue<u32> = WeightQueue::new();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.peek(), None);
        assert!(!queue.set_weight(4, 1.0));
        assert!(!queue.remove(4));
        assert_eq!(queue.weight(4), None);
    }
}
