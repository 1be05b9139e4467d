//! Key/value capabilities consumed by [`OrderedMap`](crate::OrderedMap).
//!
//! A map never touches its keys and values directly except through a
//! [`Capabilities`] implementation: copies are taken when an entry is stored,
//! released when it leaves the map, and keys are ordered by `compare_keys`.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::{MapError, Result};

/// The five operations a map needs from its key and value types.
///
/// `copy_key`/`copy_value` return `None` to signal an allocation failure,
/// which the map reports as [`MapError::OutOfMemory`]. `compare_keys` must be
/// a total order; `Ordering::Equal` means "same key".
pub trait Capabilities<K, V> {
    fn copy_key(&self, key: &K) -> Option<K>;

    fn copy_value(&self, value: &V) -> Option<V>;

    /// Releases a key previously produced by `copy_key`.
    fn free_key(&self, key: K) {
        drop(key);
    }

    /// Releases a value previously produced by `copy_value`.
    fn free_value(&self, value: V) {
        drop(value);
    }

    fn compare_keys(&self, a: &K, b: &K) -> Ordering;
}

/// `Clone` to copy, `Drop` to free, `Ord` to compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Natural;

impl<K: Ord + Clone, V: Clone> Capabilities<K, V> for Natural {
    #[inline]
    fn copy_key(&self, key: &K) -> Option<K> {
        Some(key.clone())
    }

    #[inline]
    fn copy_value(&self, value: &V) -> Option<V> {
        Some(value.clone())
    }

    #[inline]
    fn compare_keys(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

// =============================================================================
// Closure-backed capabilities
// =============================================================================

type CopyFn<T> = Rc<dyn Fn(&T) -> Option<T>>;
type FreeFn<T> = Rc<dyn Fn(T)>;
type CompareFn<K> = Rc<dyn Fn(&K, &K) -> Ordering>;

/// Capabilities assembled from five caller-supplied closures.
///
/// The closures are shared, so cloning is cheap and a copied map calls the
/// very same functions as its source.
///
/// ```rust
/// use sorted_chain_map::{FnCapabilities, OrderedMap};
///
/// let caps = FnCapabilities::<i32, String>::builder()
///     .copy_key(|k| Some(*k))
///     .copy_value(|v| Some(v.clone()))
///     .free_key(drop)
///     .free_value(drop)
///     .compare_keys(|a, b| b.cmp(a)) // descending
///     .build()
///     .unwrap();
///
/// let mut map = OrderedMap::with_capabilities(caps).unwrap();
/// map.put(&1, &"one".to_string()).unwrap();
/// map.put(&2, &"two".to_string()).unwrap();
/// assert_eq!(map.keys().copied().collect::<Vec<_>>(), [2, 1]);
/// ```
pub struct FnCapabilities<K, V> {
    copy_key: CopyFn<K>,
    copy_value: CopyFn<V>,
    free_key: FreeFn<K>,
    free_value: FreeFn<V>,
    compare_keys: CompareFn<K>,
}

impl<K, V> FnCapabilities<K, V> {
    pub fn builder() -> CapabilitiesBuilder<K, V> {
        CapabilitiesBuilder::default()
    }
}

impl<K, V> Clone for FnCapabilities<K, V> {
    fn clone(&self) -> Self {
        Self {
            copy_key: Rc::clone(&self.copy_key),
            copy_value: Rc::clone(&self.copy_value),
            free_key: Rc::clone(&self.free_key),
            free_value: Rc::clone(&self.free_value),
            compare_keys: Rc::clone(&self.compare_keys),
        }
    }
}

impl<K, V> std::fmt::Debug for FnCapabilities<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCapabilities").finish_non_exhaustive()
    }
}

impl<K, V> Capabilities<K, V> for FnCapabilities<K, V> {
    #[inline]
    fn copy_key(&self, key: &K) -> Option<K> {
        (self.copy_key)(key)
    }

    #[inline]
    fn copy_value(&self, value: &V) -> Option<V> {
        (self.copy_value)(value)
    }

    #[inline]
    fn free_key(&self, key: K) {
        (self.free_key)(key)
    }

    #[inline]
    fn free_value(&self, value: V) {
        (self.free_value)(value)
    }

    #[inline]
    fn compare_keys(&self, a: &K, b: &K) -> Ordering {
        (self.compare_keys)(a, b)
    }
}

/// Collects the five closures for [`FnCapabilities`].
///
/// [`build`](Self::build) fails with [`MapError::InvalidArgument`] if any of
/// them was never supplied.
pub struct CapabilitiesBuilder<K, V> {
    copy_key: Option<CopyFn<K>>,
    copy_value: Option<CopyFn<V>>,
    free_key: Option<FreeFn<K>>,
    free_value: Option<FreeFn<V>>,
    compare_keys: Option<CompareFn<K>>,
}

impl<K, V> Default for CapabilitiesBuilder<K, V> {
    fn default() -> Self {
        Self {
            copy_key: None,
            copy_value: None,
            free_key: None,
            free_value: None,
            compare_keys: None,
        }
    }
}

impl<K, V> CapabilitiesBuilder<K, V> {
    pub fn copy_key(mut self, f: impl Fn(&K) -> Option<K> + 'static) -> Self {
        self.copy_key = Some(Rc::new(f));
        self
    }

    pub fn copy_value(mut self, f: impl Fn(&V) -> Option<V> + 'static) -> Self {
        self.copy_value = Some(Rc::new(f));
        self
    }

    pub fn free_key(mut self, f: impl Fn(K) + 'static) -> Self {
        self.free_key = Some(Rc::new(f));
        self
    }

    pub fn free_value(mut self, f: impl Fn(V) + 'static) -> Self {
        self.free_value = Some(Rc::new(f));
        self
    }

    pub fn compare_keys(mut self, f: impl Fn(&K, &K) -> Ordering + 'static) -> Self {
        self.compare_keys = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> Result<FnCapabilities<K, V>> {
        Ok(FnCapabilities {
            copy_value: self
                .copy_value
                .ok_or(MapError::InvalidArgument("copy_value"))?,
            copy_key: self.copy_key.ok_or(MapError::InvalidArgument("copy_key"))?,
            free_value: self
                .free_value
                .ok_or(MapError::InvalidArgument("free_value"))?,
            free_key: self.free_key.ok_or(MapError::InvalidArgument("free_key"))?,
            compare_keys: self
                .compare_keys
                .ok_or(MapError::InvalidArgument("compare_keys"))?,
        })
    }
}
