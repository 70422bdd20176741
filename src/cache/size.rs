//! Size Estimator Module
//!
//! Approximates the memory footprint of a cached result and everything it
//! owns, on top of `deepsize`.
//!
//! One estimate shares a single [`Context`], so an `Arc`/`Rc` allocation
//! reached twice is counted once and reference cycles terminate.

pub use deepsize::{Context, DeepSizeOf};

// == Estimate ==
/// Estimates the total footprint of `value` in bytes.
pub fn estimate<T: DeepSizeOf + ?Sized>(value: &T) -> usize {
    value.deep_size_of()
}

// == Lock helpers ==
// `deepsize` has no impls for parking_lot cells. Types holding them call
// these from a manual `deep_size_of_children`; a cell held elsewhere is
// skipped rather than waited on.

/// Children of the value behind `mutex`, or 0 if it is locked.
pub fn try_lock_children<T: DeepSizeOf>(
    mutex: &parking_lot::Mutex<T>,
    context: &mut Context,
) -> usize {
    mutex
        .try_lock()
        .map_or(0, |inner| inner.deep_size_of_children(context))
}

/// Children of the value behind `lock`, or 0 if it is write-locked.
pub fn try_read_children<T: DeepSizeOf>(
    lock: &parking_lot::RwLock<T>,
    context: &mut Context,
) -> usize {
    lock.try_read()
        .map_or(0, |inner| inner.deep_size_of_children(context))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Mutex, RwLock};
    use std::collections::HashMap;
    use std::mem::size_of;
    use std::sync::Arc;

    // `Context::new` is private in deepsize; a fresh context is only
    // reachable through `deep_size_of`.
    fn with_context(f: impl Fn(&mut Context) -> usize) -> usize {
        struct Probe<F>(F);
        impl<F: Fn(&mut Context) -> usize> DeepSizeOf for Probe<F> {
            fn deep_size_of_children(&self, context: &mut Context) -> usize {
                (self.0)(context)
            }
        }
        let probe = Probe(f);
        probe.deep_size_of() - std::mem::size_of_val(&probe)
    }

    struct Node {
        _id: u64,
        next: Mutex<Option<Arc<Node>>>,
    }

    impl DeepSizeOf for Node {
        fn deep_size_of_children(&self, context: &mut Context) -> usize {
            try_lock_children(&self.next, context)
        }
    }

    fn node(id: u64) -> Arc<Node> {
        Arc::new(Node {
            _id: id,
            next: Mutex::new(None),
        })
    }

    #[test]
    fn test_primitives() {
        assert_eq!(estimate(&7u64), 8);
        assert_eq!(estimate(&true), 1);
    }

    #[test]
    fn test_owned_buffers() {
        let s = String::with_capacity(100);
        assert_eq!(estimate(&s), size_of::<String>() + 100);

        let v: Vec<u32> = Vec::with_capacity(10);
        assert_eq!(estimate(&v), size_of::<Vec<u32>>() + 40);
    }

    #[test]
    fn test_mapping_counts_keys_and_values() {
        let mut map = HashMap::new();
        map.insert("key".to_string(), vec![0u8; 64]);
        assert!(estimate(&map) > 64 + 3);
    }

    #[test]
    fn test_shared_counted_once() {
        let shared = Arc::new(vec![0u8; 1000]);
        let one = estimate(&vec![Arc::clone(&shared)]);
        let two = estimate(&vec![Arc::clone(&shared), Arc::clone(&shared)]);
        assert_eq!(two, one + size_of::<Arc<Vec<u8>>>());
    }

    #[test]
    fn test_cycle_terminates_and_counts_each_node_once() {
        let a = node(1);
        let b = node(2);
        *a.next.lock() = Some(Arc::clone(&b));
        let chain = estimate(&a);

        // Closing the loop adds an edge, not a node
        *b.next.lock() = Some(Arc::clone(&a));
        assert_eq!(estimate(&a), chain);
        assert_eq!(estimate(&b), chain);

        *b.next.lock() = None;
    }

    #[test]
    fn test_locked_cells_are_skipped() {
        let mutex = Mutex::new(vec![0u8; 512]);
        let lock = RwLock::new(vec![0u8; 512]);
        assert_eq!(with_context(|cx| try_lock_children(&mutex, cx)), 512);
        assert_eq!(with_context(|cx| try_read_children(&lock, cx)), 512);

        let _held = mutex.lock();
        let _writer = lock.write();
        assert_eq!(with_context(|cx| try_lock_children(&mutex, cx)), 0);
        assert_eq!(with_context(|cx| try_read_children(&lock, cx)), 0);
    }
}
