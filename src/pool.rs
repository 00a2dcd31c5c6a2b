//! Fixed-capacity slab allocator with O(1) alloc/free via a free list.
//!
//! The pool materializes every slot up front and never reallocates, so an
//! index handed out by `alloc` addresses the same slot until the matching
//! `free`. Price levels, queue chunks, and the links between them are all
//! expressed as indices into these pools, which is what makes order handles
//! stable across arbitrary other operations.

/// Index into a pool's slab - a compressed stable pointer.
///
/// Using u32 instead of a machine pointer halves link metadata, so more of
/// the chain fits in cache.
pub type PoolIndex = u32;

/// Sentinel value representing a null/invalid index (like nullptr).
pub const NULL_INDEX: PoolIndex = u32::MAX;

struct Slot<T> {
    value: T,
    /// Next slot in the free list; `NULL_INDEX` while allocated.
    next_free: PoolIndex,
    #[cfg(debug_assertions)]
    is_free: bool,
}

/// Pre-allocated object pool with O(1) allocation and deallocation.
///
/// `alloc` pops the free-list head and returns its index; the caller
/// initializes the payload in place through `get_mut`. Debug builds track a
/// per-slot free flag and assert on double-free and use-after-free.
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    /// Head of the free list.
    free_head: PoolIndex,
    /// Number of currently allocated slots.
    allocated: u32,
}

impl<T: Default> Pool<T> {
    /// Create a pool with `capacity` slots, all initially free.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or would collide with `NULL_INDEX`.
    pub fn new(capacity: u32) -> Self {
        assert!(
            capacity > 0 && capacity < NULL_INDEX,
            "pool capacity out of range"
        );
        let slots = (0..capacity)
            .map(|i| Slot {
                value: T::default(),
                next_free: if i + 1 < capacity { i + 1 } else { NULL_INDEX },
                #[cfg(debug_assertions)]
                is_free: true,
            })
            .collect();
        Self {
            slots,
            free_head: 0,
            allocated: 0,
        }
    }
}

impl<T> Pool<T> {
    /// Allocate a slot and return its index. The payload retains whatever
    /// the slot last held; the caller initializes it through `get_mut`.
    ///
    /// Capacities are sized from domain maxima at construction, so running
    /// out is a configuration error and fails hard in every build.
    #[inline]
    pub fn alloc(&mut self) -> PoolIndex {
        assert!(self.free_head != NULL_INDEX, "memory pool exhausted");
        let index = self.free_head;
        let slot = &mut self.slots[index as usize];
        #[cfg(debug_assertions)]
        {
            debug_assert!(slot.is_free, "allocating a live slot");
            slot.is_free = false;
        }
        self.free_head = slot.next_free;
        slot.next_free = NULL_INDEX;
        self.allocated += 1;
        index
    }

    /// Return a slot to the free list.
    #[inline]
    pub fn free(&mut self, index: PoolIndex) {
        debug_assert!((index as usize) < self.slots.len(), "index out of bounds");
        debug_assert!(self.allocated > 0, "free on an empty pool");
        let slot = &mut self.slots[index as usize];
        #[cfg(debug_assertions)]
        {
            debug_assert!(!slot.is_free, "double free");
            slot.is_free = true;
        }
        slot.next_free = self.free_head;
        self.free_head = index;
        self.allocated -= 1;
    }

    /// Immutable access to an allocated slot.
    #[inline]
    pub fn get(&self, index: PoolIndex) -> &T {
        debug_assert!((index as usize) < self.slots.len(), "index out of bounds");
        let slot = &self.slots[index as usize];
        #[cfg(debug_assertions)]
        debug_assert!(!slot.is_free, "access to a freed slot");
        &slot.value
    }

    /// Mutable access to an allocated slot.
    #[inline]
    pub fn get_mut(&mut self, index: PoolIndex) -> &mut T {
        debug_assert!((index as usize) < self.slots.len(), "index out of bounds");
        let slot = &mut self.slots[index as usize];
        #[cfg(debug_assertions)]
        debug_assert!(!slot.is_free, "access to a freed slot");
        &mut slot.value
    }

    /// Number of currently allocated slots.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Total slot count.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// True if no slots are allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// True if every slot is allocated.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NULL_INDEX
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("allocated", &self.allocated)
            .field("free_head", &self.free_head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool: Pool<u64> = Pool::new(100);
        assert_eq!(pool.capacity(), 100);
        assert_eq!(pool.allocated(), 0);
        assert!(pool.is_empty());
        assert!(!pool.is_full());
    }

    #[test]
    fn test_alloc_free_reuse() {
        let mut pool: Pool<u64> = Pool::new(3);

        let a = pool.alloc();
        let b = pool.alloc();
        let c = pool.alloc();
        assert_eq!(pool.allocated(), 3);
        assert!(pool.is_full());

        pool.free(b);
        assert_eq!(pool.allocated(), 2);
        assert!(!pool.is_full());

        // Free list is LIFO: the freed slot comes straight back.
        let d = pool.alloc();
        assert_eq!(d, b);

        pool.free(a);
        pool.free(c);
        pool.free(d);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_get_set() {
        let mut pool: Pool<u64> = Pool::new(10);
        let idx = pool.alloc();
        *pool.get_mut(idx) = 12345;
        assert_eq!(*pool.get(idx), 12345);
    }

    #[test]
    fn test_slot_contents_survive_other_frees() {
        let mut pool: Pool<u64> = Pool::new(10);
        let a = pool.alloc();
        let b = pool.alloc();
        *pool.get_mut(a) = 7;
        *pool.get_mut(b) = 9;
        pool.free(a);
        assert_eq!(*pool.get(b), 9);
    }

    #[test]
    #[should_panic(expected = "memory pool exhausted")]
    fn test_exhaustion_panics() {
        let mut pool: Pool<u64> = Pool::new(2);
        pool.alloc();
        pool.alloc();
        pool.alloc();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "double free")]
    fn test_double_free_asserts() {
        let mut pool: Pool<u64> = Pool::new(2);
        let idx = pool.alloc();
        let _live = pool.alloc();
        pool.free(idx);
        pool.free(idx);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "access to a freed slot")]
    fn test_use_after_free_asserts() {
        let mut pool: Pool<u64> = Pool::new(2);
        let idx = pool.alloc();
        pool.free(idx);
        let _ = pool.get(idx);
    }
}
