use bitvec::prelude::*;

/// Bitset with a rotating allocation cursor
#[derive(Debug, Clone)]
pub(crate) struct RotatingPool {
    used: BitVec,
    cursor: usize,
    in_use: usize,
}

impl RotatingPool {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            used: bitvec![0; size],
            cursor: 0,
            in_use: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.used.len()
    }

    pub(crate) fn in_use(&self) -> usize {
        self.in_use
    }

    pub(crate) fn available(&self) -> usize {
        self.capacity() - self.in_use
    }

    /// Take the first free slot at or after the cursor
    pub(crate) fn allocate(&mut self) -> Option<usize> {
        let size = self.capacity();
        if self.in_use == size {
            return None;
        }
        let start = self.cursor;
        let index = self.used[start..]
            .first_zero()
            .map(|i| start + i)
            .or_else(|| self.used[..start].first_zero())?;

        self.used.set(index, true);
        self.in_use += 1;
        self.cursor = (index + 1) % size;
        Some(index)
    }

    /// Clear a slot. Returns false if it was not allocated.
    pub(crate) fn release(&mut self, index: usize) -> bool {
        if !self.is_allocated(index) {
            return false;
        }
        self.used.set(index, false);
        self.in_use -= 1;
        true
    }

    pub(crate) fn is_allocated(&self, index: usize) -> bool {
        self.used.get(index).map(|bit| *bit).unwrap_or(false)
    }
}
