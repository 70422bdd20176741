//! Call Key Module
//!
//! Builds the fingerprint of one call: the identity of the memoized function
//! plus its arguments bound into a canonical form.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::canonical::to_canonical;
use crate::error::{CacheError, Result};

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

// == Function Id ==
/// Identity of a memoized function, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FunctionId(u64);

impl FunctionId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

// == Call Key ==
/// Canonical fingerprint of a function identity plus its bound arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallKey {
    function: FunctionId,
    arguments: String,
}

impl CallKey {
    // == Bind ==
    /// Binds `arguments` for `function`.
    ///
    /// Arguments are serialized to canonical JSON: tuples bind positionally,
    /// structs and maps bind by name with keys sorted, so named arguments are
    /// order-independent, and hash sets bind sorted. NaN and infinite floats,
    /// maps with non-scalar keys and types whose `Serialize` impl fails are
    /// unhashable.
    pub fn bind<A: Serialize + ?Sized>(function: FunctionId, arguments: &A) -> Result<Self> {
        let bound =
            to_canonical(arguments).map_err(|err| CacheError::Unhashable(err.to_string()))?;

        Ok(Self {
            function,
            arguments: bound.to_string(),
        })
    }

    /// Function this key belongs to.
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Canonical bound arguments.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// Bytes held by the key.
    pub fn footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.arguments.capacity()
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}{}", self.function.get(), self.arguments)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serializer;
    use std::collections::{HashMap, HashSet};

    #[derive(Serialize)]
    struct Named {
        width: u32,
        height: u32,
    }

    struct Refuses;

    impl Serialize for Refuses {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot fingerprint a socket"))
        }
    }

    #[test]
    fn test_same_arguments_same_key() {
        let f = FunctionId::next();
        assert_eq!(
            CallKey::bind(f, &(2, "x")).unwrap(),
            CallKey::bind(f, &(2, "x")).unwrap()
        );
    }

    #[test]
    fn test_function_identity_is_part_of_key() {
        let f = FunctionId::next();
        let g = FunctionId::next();
        assert_ne!(f, g);
        assert_ne!(CallKey::bind(f, &1).unwrap(), CallKey::bind(g, &1).unwrap());
    }

    #[test]
    fn test_named_arguments_are_order_independent() {
        let f = FunctionId::next();
        let mut forward = HashMap::new();
        forward.insert("a", 1);
        forward.insert("b", 2);
        let mut backward = HashMap::new();
        backward.insert("b", 2);
        backward.insert("a", 1);

        assert_eq!(
            CallKey::bind(f, &forward).unwrap(),
            CallKey::bind(f, &backward).unwrap()
        );
        let named = CallKey::bind(f, &Named { width: 3, height: 4 }).unwrap();
        assert_eq!(named.arguments(), r#"{"height":4,"width":3}"#);
    }

    #[test]
    fn test_positional_arguments_are_ordered() {
        let f = FunctionId::next();
        assert_ne!(
            CallKey::bind(f, &(1, 2)).unwrap(),
            CallKey::bind(f, &(2, 1)).unwrap()
        );
    }

    #[test]
    fn test_unhashable_arguments() {
        let f = FunctionId::next();
        let mut tuple_keys = HashMap::new();
        tuple_keys.insert((1, 2), "pair");

        assert!(matches!(
            CallKey::bind(f, &tuple_keys),
            Err(CacheError::Unhashable(_))
        ));
        assert!(matches!(
            CallKey::bind(f, &Refuses),
            Err(CacheError::Unhashable(_))
        ));
    }

    #[test]
    fn test_non_finite_floats_are_unhashable() {
        let f = FunctionId::next();
        for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                CallKey::bind(f, &x),
                Err(CacheError::Unhashable(_))
            ));
            assert!(CallKey::bind(f, &(1, Some(x))).is_err());
        }
        assert_eq!(CallKey::bind(f, &1.5).unwrap().arguments(), "1.5");
    }

    #[test]
    fn test_equal_sets_share_a_key() {
        let f = FunctionId::next();
        let forward: HashSet<u32> = (0..64).collect();
        let backward: HashSet<u32> = (0..64).rev().collect();

        assert_eq!(
            CallKey::bind(f, &forward).unwrap(),
            CallKey::bind(f, &backward).unwrap()
        );
        assert_ne!(
            CallKey::bind(f, &forward).unwrap(),
            CallKey::bind(f, &(0..63).collect::<HashSet<u32>>()).unwrap()
        );
    }

    #[test]
    fn test_display() {
        let f = FunctionId::next();
        let key = CallKey::bind(f, &(2, "x")).unwrap();
        assert_eq!(key.to_string(), format!("fn#{}[2,\"x\"]", f.get()));
    }
}
