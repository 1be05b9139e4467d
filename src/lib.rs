//! # sorted-chain-map
//!
//! An ordered map kept as a sorted singly-linked chain of nodes, headed by a
//! permanent sentinel node.
//!
//! Every operation walks the chain, so lookups and updates are O(n). In
//! exchange the structure is tiny, predictable and completely driven by a
//! [`Capabilities`] set: keys and values are copied into the map when stored,
//! released through the same capabilities when they leave, and ordered by a
//! caller-supplied comparison.
//!
//! ## Example
//!
//! ```rust
//! use sorted_chain_map::{MapError, OrderedMap};
//!
//! let mut map: OrderedMap<i32, String> = OrderedMap::new();
//! map.put(&3, &"c".to_string()).unwrap();
//! map.put(&1, &"a".to_string()).unwrap();
//! map.put(&2, &"b".to_string()).unwrap();
//!
//! assert_eq!(map.get(&2).map(String::as_str), Some("b"));
//! assert_eq!(map.remove(&5), Err(MapError::ItemNotFound));
//!
//! // Cursor-style enumeration.
//! let (mut cursor, first) = map.get_first().unwrap();
//! assert_eq!(*first, 1);
//! assert_eq!(map.get_next(&mut cursor), Some(&2));
//! assert_eq!(map.get_next(&mut cursor), Some(&3));
//! assert_eq!(map.get_next(&mut cursor), None);
//! ```

#![forbid(unsafe_code)]

use std::cell::Cell;
use std::cmp::Ordering;
use std::iter::FusedIterator;

/// Structured event, compiled out without the `tracing` feature.
macro_rules! emit {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::$level!($($arg)+);
    };
}

mod capabilities;
mod error;

pub use capabilities::{Capabilities, CapabilitiesBuilder, FnCapabilities, Natural};
pub use error::{MapError, Result};

// =============================================================================
// Link type
// =============================================================================

/// Index of a slot in the node arena.
///
/// Slot 0 is always the sentinel. `NULL` terminates both the live chain and
/// the free list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Link(u32);

impl Link {
    const SENTINEL: Link = Link(0);
    const NULL: Link = Link(u32::MAX);

    #[inline]
    fn is_null(self) -> bool {
        self == Self::NULL
    }

    #[inline]
    fn idx(self) -> usize {
        debug_assert!(!self.is_null());
        self.0 as usize
    }
}

/// A node of the chain. The sentinel and free slots carry no entry.
struct Slot<K, V> {
    next: Link,
    entry: Option<(K, V)>,
}

impl<K, V> Slot<K, V> {
    #[inline]
    fn vacant() -> Self {
        Self {
            next: Link::NULL,
            entry: None,
        }
    }
}

/// Result of the positional search. Both variants carry the predecessor of
/// the key's position, which may be the sentinel.
enum Position {
    Found(Link),
    Vacant(Link),
}

// =============================================================================
// Cursor
// =============================================================================

/// Enumeration position handed out by [`OrderedMap::get_first`].
///
/// A cursor remembers the map generation it was created under. Any structural
/// change to the map (put, remove, clear, copy) moves the generation on, after
/// which [`OrderedMap::get_next`] returns `None` for the stale cursor. A cursor
/// that has returned `None` once stays exhausted.
///
/// A cursor is only meaningful for the map that produced it.
#[derive(Debug, Clone)]
pub struct Cursor {
    at: Link,
    generation: u64,
}

// =============================================================================
// OrderedMap
// =============================================================================

/// An ordered map over a sentinel-headed sorted singly-linked chain.
///
/// - Node arena with an intrusive free list; slot 0 is the sentinel
/// - Keys kept strictly increasing under `C::compare_keys`
/// - Entries are copies made through `C` and released through `C`
/// - Generation-checked [`Cursor`] enumeration plus borrowing iterators
pub struct OrderedMap<K, V, C: Capabilities<K, V> = Natural> {
    slots: Vec<Slot<K, V>>,
    /// Head of the free-slot list, threaded through `Slot::next`.
    free_head: Link,
    count: usize,
    /// Bumped on every structural event; `Cell` so `try_copy(&self)` can bump it.
    generation: Cell<u64>,
    caps: C,
}

impl<K: Ord + Clone, V: Clone> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a map whose arena can hold `capacity` entries before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.saturating_add(1));
        slots.push(Slot::vacant());
        Self::from_parts(slots, Natural)
    }
}

impl<K, V> OrderedMap<K, V, FnCapabilities<K, V>> {
    /// Builds the capabilities and the map in one step. Fails with
    /// [`MapError::InvalidArgument`] if the builder is missing a closure.
    pub fn from_fns(builder: CapabilitiesBuilder<K, V>) -> Result<Self> {
        Self::with_capabilities(builder.build()?)
    }
}

impl<K, V, C: Capabilities<K, V>> OrderedMap<K, V, C> {
    pub fn with_capabilities(caps: C) -> Result<Self> {
        Self::with_capacity_and_capabilities(0, caps)
    }

    pub fn with_capacity_and_capabilities(capacity: usize, caps: C) -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve(capacity.saturating_add(1))?;
        slots.push(Slot::vacant());
        Ok(Self::from_parts(slots, caps))
    }

    fn from_parts(slots: Vec<Slot<K, V>>, caps: C) -> Self {
        debug_assert_eq!(slots.len(), 1);
        Self {
            slots,
            free_head: Link::NULL,
            count: 0,
            generation: Cell::new(0),
            caps,
        }
    }

    #[inline]
    pub fn capabilities(&self) -> &C {
        &self.caps
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn invalidate(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    #[inline]
    fn next_of(&self, link: Link) -> Link {
        self.slots[link.idx()].next
    }

    #[inline]
    fn entry(&self, link: Link) -> &(K, V) {
        self.slots[link.idx()]
            .entry
            .as_ref()
            .expect("linked slot must hold an entry")
    }

    #[inline]
    fn entry_mut(&mut self, link: Link) -> &mut (K, V) {
        self.slots[link.idx()]
            .entry
            .as_mut()
            .expect("linked slot must hold an entry")
    }

    /// Walks from the sentinel to the predecessor of `key`'s position.
    fn locate(&self, key: &K) -> Position {
        let mut current = Link::SENTINEL;
        loop {
            let next = self.next_of(current);
            if next.is_null() {
                return Position::Vacant(current);
            }
            match self.caps.compare_keys(key, &self.entry(next).0) {
                Ordering::Equal => return Position::Found(current),
                Ordering::Less => return Position::Vacant(current),
                Ordering::Greater => current = next,
            }
        }
    }

    /// Takes a slot off the free list, or grows the arena by one.
    fn alloc_slot(&mut self) -> Result<Link> {
        if !self.free_head.is_null() {
            let link = self.free_head;
            self.free_head = self.next_of(link);
            self.slots[link.idx()].next = Link::NULL;
            return Ok(link);
        }

        let idx = self.slots.len();
        if idx >= Link::NULL.0 as usize {
            return Err(MapError::OutOfMemory);
        }
        self.slots.try_reserve(1)?;
        self.slots.push(Slot::vacant());
        Ok(Link(idx as u32))
    }

    /// Returns an unlinked slot to the free list, handing back its entry.
    fn release_slot(&mut self, link: Link) -> Option<(K, V)> {
        debug_assert_ne!(link, Link::SENTINEL);
        let slot = &mut self.slots[link.idx()];
        slot.next = self.free_head;
        self.free_head = link;
        slot.entry.take()
    }

    pub fn contains(&self, key: &K) -> bool {
        matches!(self.locate(key), Position::Found(_))
    }

    /// Returns the map's own copy of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.locate(key) {
            Position::Found(prev) => Some(&self.entry(self.next_of(prev)).1),
            Position::Vacant(_) => None,
        }
    }

    /// Stores copies of `key` and `value`.
    ///
    /// If the key is already present only the value is replaced: the new copy
    /// is made first, and the old value is released only once that succeeded.
    /// On [`MapError::OutOfMemory`] the map is left exactly as it was.
    pub fn put(&mut self, key: &K, value: &V) -> Result<()> {
        match self.locate(key) {
            Position::Found(prev) => {
                let node = self.next_of(prev);
                let Some(fresh) = self.caps.copy_value(value) else {
                    emit!(debug, size = self.count, "value copy failed, existing value kept");
                    return Err(MapError::OutOfMemory);
                };
                let old = std::mem::replace(&mut self.entry_mut(node).1, fresh);
                self.caps.free_value(old);
                emit!(trace, size = self.count, "put replaced value");
            }
            Position::Vacant(prev) => {
                let link = self.alloc_slot()?;
                let Some(k) = self.caps.copy_key(key) else {
                    self.release_slot(link);
                    emit!(debug, size = self.count, "key copy failed, put rolled back");
                    return Err(MapError::OutOfMemory);
                };
                let Some(v) = self.caps.copy_value(value) else {
                    self.caps.free_key(k);
                    self.release_slot(link);
                    emit!(debug, size = self.count, "value copy failed, put rolled back");
                    return Err(MapError::OutOfMemory);
                };

                let after = self.next_of(prev);
                let slot = &mut self.slots[link.idx()];
                slot.entry = Some((k, v));
                slot.next = after;
                self.slots[prev.idx()].next = link;
                self.count += 1;
                emit!(trace, size = self.count, "put inserted entry");
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Unlinks the entry for `key` and releases its key and value.
    pub fn remove(&mut self, key: &K) -> Result<()> {
        let Position::Found(prev) = self.locate(key) else {
            return Err(MapError::ItemNotFound);
        };

        let node = self.next_of(prev);
        self.slots[prev.idx()].next = self.next_of(node);
        if let Some((k, v)) = self.release_slot(node) {
            self.caps.free_key(k);
            self.caps.free_value(v);
        }
        self.count -= 1;
        self.invalidate();
        emit!(trace, size = self.count, "removed entry");
        Ok(())
    }

    /// Releases every entry. The map stays usable and keeps its arena capacity.
    pub fn clear(&mut self) {
        let mut current = std::mem::replace(&mut self.slots[Link::SENTINEL.idx()].next, Link::NULL);
        while !current.is_null() {
            let slot = &mut self.slots[current.idx()];
            current = slot.next;
            if let Some((k, v)) = slot.entry.take() {
                self.caps.free_key(k);
                self.caps.free_value(v);
            }
        }

        emit!(trace, released = self.count, "cleared map");
        self.slots.truncate(1);
        self.free_head = Link::NULL;
        self.count = 0;
        self.invalidate();
    }

    /// Duplicates the map through its capabilities.
    ///
    /// The copy owns its own copies of every key and value and shares the
    /// capability set. If any single copy fails, everything duplicated so far
    /// is released again and [`MapError::OutOfMemory`] is returned.
    ///
    /// Cursors of this map are invalidated, as for any structural event.
    pub fn try_copy(&self) -> Result<Self>
    where
        C: Clone,
    {
        self.invalidate();

        let mut copy = Self::with_capacity_and_capabilities(self.count, self.caps.clone())?;
        copy.generation.set(self.generation.get());

        let mut tail = Link::SENTINEL;
        let mut current = self.next_of(Link::SENTINEL);
        while !current.is_null() {
            let (key, value) = self.entry(current);
            let Some(k) = self.caps.copy_key(key) else {
                emit!(debug, copied = copy.count, "key copy failed, releasing partial copy");
                return Err(MapError::OutOfMemory);
            };
            let Some(v) = self.caps.copy_value(value) else {
                self.caps.free_key(k);
                emit!(debug, copied = copy.count, "value copy failed, releasing partial copy");
                return Err(MapError::OutOfMemory);
            };

            // Capacity was reserved up front, so this push never reallocates.
            let link = Link(copy.slots.len() as u32);
            copy.slots.push(Slot {
                next: Link::NULL,
                entry: Some((k, v)),
            });
            copy.slots[tail.idx()].next = link;
            copy.count += 1;
            tail = link;
            current = self.next_of(current);
        }

        debug_assert_eq!(copy.count, self.count);
        emit!(trace, size = copy.count, "copied map");
        Ok(copy)
    }

    /// Begins an enumeration pass at the smallest key.
    pub fn get_first(&self) -> Option<(Cursor, &K)> {
        let first = self.next_of(Link::SENTINEL);
        if first.is_null() {
            return None;
        }
        let cursor = Cursor {
            at: first,
            generation: self.generation.get(),
        };
        Some((cursor, &self.entry(first).0))
    }

    /// Advances `cursor` and returns the next key in order.
    ///
    /// Returns `None` at the end of the chain, or if the map changed
    /// structurally since the cursor was created.
    pub fn get_next(&self, cursor: &mut Cursor) -> Option<&K> {
        if cursor.at.is_null() {
            return None;
        }
        if cursor.generation != self.generation.get() {
            cursor.at = Link::NULL;
            return None;
        }

        let next = self.slots.get(cursor.at.idx())?.next;
        cursor.at = next;
        if next.is_null() {
            return None;
        }
        self.slots[next.idx()].entry.as_ref().map(|(k, _)| k)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            at: self.next_of(Link::SENTINEL),
            remaining: self.count,
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
}

impl<K: Ord + Clone, V: Clone> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: Capabilities<K, V>> Drop for OrderedMap<K, V, C> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug, C: Capabilities<K, V>> std::fmt::Debug
    for OrderedMap<K, V, C>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, C: Capabilities<K, V>> IntoIterator for &'a OrderedMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Borrowing iterator over entries in key order.
pub struct Iter<'a, K, V> {
    slots: &'a [Slot<K, V>],
    at: Link,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at.is_null() {
            return None;
        }
        let slot = &self.slots[self.at.idx()];
        self.at = slot.next;
        self.remaining -= 1;
        slot.entry.as_ref().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots,
            at: self.at,
            remaining: self.remaining,
        }
    }
}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}


#[cfg(test)]
mod proptests;
