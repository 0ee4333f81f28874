//! Fixed-capacity binary min-heap that keeps the largest items it is fed.
//!
//! Scanning the whole board every ply only needs the best `k` cells, so
//! instead of sorting all of them the scan streams them through a heap
//! whose root is the worst item retained. Anything not better than the root
//! is dropped in O(1); total cost is O(n log k).

use std::fmt;

pub struct BoundedHeap<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Ord> BoundedHeap<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Offer an item; it is kept only if the heap has room or it beats the
    /// current minimum.
    pub fn add(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
            self.sift_up(self.items.len() - 1);
            return;
        }
        match self.items.first() {
            Some(min) if *min < item => {
                self.items[0] = item;
                self.sift_down(0);
            }
            _ => {}
        }
    }

    /// The worst retained item.
    #[inline]
    pub fn peek_min(&self) -> Option<&T> {
        self.items.first()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Retained items in heap order (not sorted).
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Retained items, best first.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        self.items.sort_by(|a, b| b.cmp(a));
        self.items
    }

    /// Check the heap property. Returns the index of the first item that is
    /// smaller than its parent.
    pub fn validate(&self) -> Result<(), usize> {
        for i in 1..self.items.len() {
            if self.items[i] < self.items[(i - 1) / 2] {
                return Err(i);
            }
        }
        Ok(())
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.items[idx] >= self.items[parent] {
                break;
            }
            self.items.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;
            if left < len && self.items[left] < self.items[smallest] {
                smallest = left;
            }
            if right < len && self.items[right] < self.items[smallest] {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.items.swap(idx, smallest);
            idx = smallest;
        }
    }
}

impl<'a, T> IntoIterator for &'a BoundedHeap<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedHeap")
            .field("capacity", &self.capacity)
            .field("items", &self.items)
            .finish()
    }
}
