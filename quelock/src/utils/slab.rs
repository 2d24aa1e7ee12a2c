use parking_lot::Mutex;
use std::sync::OnceLock;

/// Number of slots in the first segment. Segment `k` holds `BASE << k` slots.
const BASE: usize = 32;

/// Maximum number of segments, which keeps every index below `u32::MAX`.
const SEGMENTS: usize = 26;

/// A concurrent slab of stable slots.
///
/// A `Slab` hands out small `u32` indices into storage that never moves and
/// is never freed before the slab itself. Storage grows by appending
/// segments of doubling size, so an index obtained once always refers to the
/// same memory and can be read without taking any lock.
///
/// Internally, it keeps track of:
/// - the allocated segments, published once through [`OnceLock`],
/// - a stack of free indices,
/// - how many slots are currently handed out.
///
/// Only [`insert`](Self::insert) and [`remove`](Self::remove) take the
/// internal mutex. Slots are reused after removal, so the caller is
/// responsible for not removing an index another thread may still read.
pub(crate) struct Slab<T> {
    /// Segment storage, lazily allocated.
    segments: [OnceLock<Box<[T]>>; SEGMENTS],
    /// Free indices and counters.
    free: Mutex<FreeList>,
}

struct FreeList {
    /// Stack of free indices that can be reused.
    indices: Vec<u32>,
    /// Total number of slots across allocated segments.
    capacity: usize,
    /// Number of slots currently handed out.
    used: usize,
}

/// Maps a flat index to `(segment, offset)`.
fn locate(index: usize) -> (usize, usize) {
    let bucket = index / BASE + 1;
    let segment = (usize::BITS - 1 - bucket.leading_zeros()) as usize;
    let start = BASE * ((1 << segment) - 1);

    (segment, index - start)
}

impl<T: Default> Slab<T> {
    /// Creates a new `Slab` with room for at least `size` slots.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let slab = Slab::<Node>::new(16);
    /// ```
    pub(crate) fn new(size: usize) -> Self {
        let slab = Self {
            segments: std::array::from_fn(|_| OnceLock::new()),
            free: Mutex::new(FreeList {
                indices: Vec::new(),
                capacity: 0,
                used: 0,
            }),
        };

        {
            let mut free = slab.free.lock();
            while free.capacity < size {
                slab.grow(&mut free);
            }
        }

        slab
    }

    /// Takes a free slot and returns its index.
    ///
    /// If no slot is free, a new segment twice the size of the previous one
    /// is allocated. The slot keeps whatever value it had when it was
    /// removed; callers reset it.
    pub(crate) fn insert(&self) -> u32 {
        let mut free = self.free.lock();

        loop {
            if let Some(index) = free.indices.pop() {
                free.used += 1;
                return index;
            }

            self.grow(&mut free);
        }
    }

    /// Returns the slot at `index` to the free stack.
    pub(crate) fn remove(&self, index: u32) {
        let mut free = self.free.lock();

        assert!((index as usize) < free.capacity, "Index out of range");

        free.indices.push(index);
        free.used -= 1;
    }

    /// Returns a reference to the slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was never handed out by this slab.
    pub(crate) fn get(&self, index: u32) -> &T {
        let (segment, offset) = locate(index as usize);

        match self.segments.get(segment).and_then(OnceLock::get) {
            Some(slots) => &slots[offset],
            None => panic!("slot {index} is not allocated"),
        }
    }

    /// Number of slots across all allocated segments.
    pub(crate) fn capacity(&self) -> usize {
        self.free.lock().capacity
    }

    /// Number of slots currently handed out.
    pub(crate) fn len(&self) -> usize {
        self.free.lock().used
    }

    fn grow(&self, free: &mut FreeList) {
        let start = free.capacity;
        let (segment, _) = locate(start);

        assert!(segment < SEGMENTS, "slab exhausted");

        let len = BASE << segment;
        let slots: Box<[T]> = (0..len).map(|_| T::default()).collect();
        let _ = self.segments[segment].set(slots);

        // Lowest indices are popped first.
        free.indices.extend((start..start + len).rev().map(|i| i as u32));
        free.capacity = start + len;
    }
}
