//! Time-indexed ring buffer with O(1) append and allocation-free range
//! queries (§4.3). Overwrites the oldest entry once full; callers must not
//! assume history beyond `capacity` samples survives.

/// Result of a [`TimeRing::range`] query: zero, one, or two contiguous
/// slices (two only when the logical window straddles the physical wrap
/// point), mirroring `VecDeque::as_slices`.
pub struct RingRange<'a, T> {
    first: &'a [T],
    second: &'a [T],
}

impl<'a, T> RingRange<'a, T> {
    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }

    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a T> {
        self.first.iter().chain(self.second.iter())
    }
}

pub struct TimeRing<T> {
    timestamps: Vec<i64>,
    values: Vec<T>,
    capacity: usize,
    head: usize,
    len: usize,
}

impl<T: Clone + Default> TimeRing<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        Self {
            timestamps: vec![0; capacity],
            values: vec![T::default(); capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one sample. O(1); overwrites the oldest sample when full.
    pub fn push(&mut self, ts_us: i64, value: T) {
        let physical = if self.len < self.capacity {
            let idx = (self.head + self.len) % self.capacity;
            self.len += 1;
            idx
        } else {
            let idx = self.head;
            self.head = (self.head + 1) % self.capacity;
            idx
        };
        self.timestamps[physical] = ts_us;
        self.values[physical] = value;
    }

    fn physical_of(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity
    }

    fn ts_at_logical(&self, logical: usize) -> i64 {
        self.timestamps[self.physical_of(logical)]
    }

    /// Logical index of the first element with ts >= start_us.
    fn lower_bound(&self, start_us: i64) -> usize {
        let mut lo = 0usize;
        let mut hi = self.len;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.ts_at_logical(mid) < start_us {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Logical index one past the last element with ts <= end_us.
    fn upper_bound(&self, end_us: i64) -> usize {
        let mut lo = 0usize;
        let mut hi = self.len;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.ts_at_logical(mid) <= end_us {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Every sample with timestamp in `[start_us, end_us]`, clipped to what
    /// the ring still holds. Timestamps in the ring are assumed
    /// non-decreasing (the acquisition path's own monotonicity invariant).
    pub fn range(&self, start_us: i64, end_us: i64) -> RingRange<'_, T> {
        if self.len == 0 || start_us > end_us {
            return RingRange { first: &[], second: &[] };
        }

        let lo = self.lower_bound(start_us);
        let hi = self.upper_bound(end_us);
        if lo >= hi {
            return RingRange { first: &[], second: &[] };
        }

        let phys_lo = self.physical_of(lo);
        // Does [lo, hi) wrap past the physical end of the backing array?
        let last_logical = hi - 1;
        let phys_last = self.physical_of(last_logical);

        if phys_last >= phys_lo {
            RingRange {
                first: &self.values[phys_lo..=phys_last],
                second: &[],
            }
        } else {
            RingRange {
                first: &self.values[phys_lo..self.capacity],
                second: &self.values[0..=phys_last],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_query_within_capacity() {
        let mut ring: TimeRing<f64> = TimeRing::with_capacity(8);
        for i in 0..5 {
            ring.push(i * 100, i as f64);
        }
        let window = ring.range(100, 300);
        let got: Vec<f64> = window.iter().copied().collect();
        assert_eq!(got, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut ring: TimeRing<f64> = TimeRing::with_capacity(4);
        for i in 0..6 {
            ring.push(i * 10, i as f64);
        }
        assert_eq!(ring.len(), 4);
        let all = ring.range(0, 1_000);
        let got: Vec<f64> = all.iter().copied().collect();
        assert_eq!(got, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraps_around_physically_without_losing_order() {
        let mut ring: TimeRing<i32> = TimeRing::with_capacity(4);
        for i in 0..4 {
            ring.push(i, i); // head=0, fills [0,1,2,3]
        }
        ring.push(4, 4); // evicts ts=0, head moves to 1
        ring.push(5, 5); // evicts ts=1, head moves to 2

        let all = ring.range(0, 100);
        let got: Vec<i32> = all.iter().copied().collect();
        assert_eq!(got, vec![2, 3, 4, 5]);
    }

    #[test]
    fn empty_range_outside_window() {
        let mut ring: TimeRing<i32> = TimeRing::with_capacity(4);
        ring.push(10, 1);
        ring.push(20, 2);
        assert!(ring.range(100, 200).is_empty());
        assert!(ring.range(-50, -10).is_empty());
    }

    proptest::proptest! {
        /// For any sequence of strictly increasing timestamps pushed past
        /// a ring of arbitrary capacity, `range` must agree with a plain
        /// Vec model that keeps only the most recent `capacity` entries.
        #[test]
        fn range_matches_reference_model(
            capacity in 1usize..16,
            deltas in proptest::collection::vec(1i64..50, 0..40),
            start in 0i64..2000,
            span in 0i64..500,
        ) {
            let mut ring: TimeRing<i64> = TimeRing::with_capacity(capacity);
            let mut reference: Vec<i64> = Vec::new();
            let mut ts = 0i64;
            for delta in deltas {
                ts += delta;
                ring.push(ts, ts);
                reference.push(ts);
                if reference.len() > capacity {
                    reference.remove(0);
                }
            }

            let end = start + span;
            let expected: Vec<i64> = reference
                .into_iter()
                .filter(|t| *t >= start && *t <= end)
                .collect();
            let got: Vec<i64> = ring.range(start, end).iter().copied().collect();
            proptest::prop_assert_eq!(got, expected);
        }
    }
}
