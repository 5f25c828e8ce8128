use std::mem;

const HASH_SCAL: usize = 107;
const MIN_TABLE_SIZE: usize = 16;
const EMPTY: usize = usize::MAX;

/// Linear probing set of column indices, reused across the rows of one worker.
///
/// Only `slots[..upper_bound]` is in use, so a table sized for the longest row
/// can be shrunk cheaply for short rows.
pub(crate) struct ColSet {
    slots: Vec<usize>,
    upper_bound: usize,
    items: usize,
}

fn table_size(capacity: usize) -> usize {
    capacity
        .checked_next_power_of_two()
        .expect("next power of 2 doesn't fit a usize")
        .checked_mul(2)
        .expect("multiplication by 2 overflows a usize")
        .max(MIN_TABLE_SIZE)
}

impl ColSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let upper_bound = table_size(capacity);
        ColSet {
            slots: vec![EMPTY; upper_bound],
            upper_bound,
            items: 0,
        }
    }

    pub fn shrink_to(&mut self, capacity: usize) {
        debug_assert!(self.is_empty());
        self.upper_bound = table_size(capacity).min(self.slots.len());
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn len(&self) -> usize {
        self.items
    }

    pub fn clear(&mut self) {
        self.slots[..self.upper_bound].fill(EMPTY);
        self.items = 0;
    }

    pub fn insert(&mut self, key: usize) -> bool {
        debug_assert_ne!(key, EMPTY);
        let inserted = insert_raw(&mut self.slots[..self.upper_bound], key);
        if inserted {
            self.items += 1;
            if self.items > self.upper_bound / 2 {
                self.grow();
            }
        }
        inserted
    }

    /// Moves the keys into the front of `out` in increasing order and empties the
    /// set. Returns the number of keys written.
    pub fn drain_sorted_into(&mut self, out: &mut [usize]) -> usize {
        let mut n = 0;
        for slot in &mut self.slots[..self.upper_bound] {
            if *slot != EMPTY {
                out[n] = mem::replace(slot, EMPTY);
                n += 1;
            }
        }
        self.items = 0;
        out[..n].sort_unstable();
        n
    }

    fn grow(&mut self) {
        if self.upper_bound == self.slots.len() {
            let len = self
                .slots
                .len()
                .checked_mul(2)
                .expect("multiplication by 2 overflows a usize");
            self.slots.resize(len, EMPTY);
        }
        let keys: Vec<_> = self.slots[..self.upper_bound]
            .iter_mut()
            .filter(|key| **key != EMPTY)
            .map(|key| mem::replace(key, EMPTY))
            .collect();
        self.upper_bound *= 2;
        for key in keys {
            insert_raw(&mut self.slots[..self.upper_bound], key);
        }
    }
}

fn insert_raw(slots: &mut [usize], key: usize) -> bool {
    let mask = slots.len() - 1;
    let mut index = key.wrapping_mul(HASH_SCAL) & mask;
    loop {
        let curr = &mut slots[index];
        if *curr == key {
            break false;
        } else if *curr == EMPTY {
            *curr = key;
            break true;
        }
        index = (index + 1) & mask;
    }
}

#[cfg(test)]
mod tests {
    use super::ColSet;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn matches_btree_set(keys in proptest::collection::vec(0..200usize, 0..100), capacity in 0..8usize) {
            let mut set = ColSet::with_capacity(capacity);
            let mut expected = BTreeSet::new();
            for &k in &keys {
                prop_assert_eq!(set.insert(k), expected.insert(k));
            }
            prop_assert_eq!(set.len(), expected.len());
            let mut out = vec![0; keys.len()];
            let n = set.drain_sorted_into(&mut out);
            prop_assert!(set.is_empty());
            prop_assert!(out[..n].iter().eq(expected.iter()));
        }
    }

    #[test]
    fn shrink_and_reuse() {
        let mut set = ColSet::with_capacity(64);
        for k in 0..40 {
            set.insert(k * 3);
        }
        assert_eq!(set.len(), 40);
        set.clear();
        set.shrink_to(2);
        for k in [5, 1, 5, 9] {
            set.insert(k);
        }
        let mut out = [0; 4];
        assert_eq!(set.drain_sorted_into(&mut out), 3);
        assert_eq!(&out[..3], &[1, 5, 9]);
    }
}
