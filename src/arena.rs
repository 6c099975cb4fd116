// arena.rs - Bump pool for backtrack frames.
//
// One interpret() call keeps all of its backtrack state in a single pool.
// Frames are runs of slots addressed by a handle plus a frame location.
// The pool is reset wholesale at the start of every call; the only other
// release is `dealloc`, which rewinds the bump pointer to a frame and drops
// everything allocated after it.

/// Handle to the first slot of a frame in an [`ArenaPool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub(crate) u32);

impl FrameHandle {
    #[inline]
    pub fn base(self) -> usize {
        self.0 as usize
    }
}

/// The pool refused to grow past its slot limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArenaExhausted;

/// Typed bump pool. `T::default()` is the state of a freshly allocated slot.
#[derive(Debug)]
pub struct ArenaPool<T> {
    slots: Vec<T>,
    limit: usize,
}

impl<T: Default> ArenaPool<T> {
    /// Create an empty pool that will hold at most `limit` slots.
    pub fn new(limit: usize) -> Self {
        ArenaPool {
            slots: Vec::new(),
            limit,
        }
    }

    pub fn reset(&mut self) {
        self.slots.clear();
    }

    /// Number of slots currently allocated.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Make room for `n` more slots, growing the backing storage if needed.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<(), ArenaExhausted> {
        let needed = self.slots.len().checked_add(n).ok_or(ArenaExhausted)?;
        if needed > self.limit || needed > u32::MAX as usize {
            return Err(ArenaExhausted);
        }
        self.slots.try_reserve(n).map_err(|_| ArenaExhausted)
    }

    /// Allocate a frame of `n` default slots.
    pub fn alloc(&mut self, n: usize) -> Result<FrameHandle, ArenaExhausted> {
        self.ensure_capacity(n)?;
        let base = self.slots.len();
        self.slots.resize_with(base + n, T::default);
        Ok(FrameHandle(base as u32))
    }

    /// Release `frame` and everything allocated after it.
    pub fn dealloc(&mut self, frame: FrameHandle) {
        debug_assert!(frame.base() <= self.slots.len());
        self.slots.truncate(frame.base());
    }

    #[inline]
    pub fn slot(&self, frame: FrameHandle, location: usize) -> &T {
        &self.slots[frame.base() + location]
    }

    #[inline]
    pub fn slot_mut(&mut self, frame: FrameHandle, location: usize) -> &mut T {
        &mut self.slots[frame.base() + location]
    }
}
