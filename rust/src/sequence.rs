//! Sequential identifiers and id generators.
//!
//! Graph builders never invent ids on their own: callers hand in generators
//! for edge and node ids. `SequentialId` gives every id type a successor and
//! predecessor so a generator can be derived from the last id in use.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// An opaque, totally ordered id with a notion of "next" and "previous".
pub trait SequentialId: Copy + Ord + Hash + Debug + Send + Sync + 'static {
    /// The id immediately after this one.
    fn next(self) -> Self;
    /// The id immediately before this one.
    fn previous(self) -> Self;
}

macro_rules! impl_sequential_id {
    ($($t:ty),*) => {
        $(
            impl SequentialId for $t {
                #[inline]
                fn next(self) -> Self {
                    self.wrapping_add(1)
                }

                #[inline]
                fn previous(self) -> Self {
                    self.wrapping_sub(1)
                }
            }
        )*
    };
}

impl_sequential_id!(i32, i64, u32, u64, usize, u128);

#[cfg(feature = "uuid")]
impl SequentialId for uuid::Uuid {
    fn next(self) -> Self {
        uuid::Uuid::from_u128(self.as_u128().wrapping_add(1))
    }

    fn previous(self) -> Self {
        uuid::Uuid::from_u128(self.as_u128().wrapping_sub(1))
    }
}

/// Shared id generator. Cloned builders share the same generator.
pub type IdGenerator<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Build a generator yielding `last.next()`, `last.next().next()`, ...
pub fn sequential_generator<T: SequentialId>(last: T) -> IdGenerator<T> {
    let state = Mutex::new(last);
    Arc::new(move || {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        *current = current.next();
        *current
    })
}

/// Build a generator that continues after the largest of `ids` (or `floor`).
pub fn generator_after<T: SequentialId>(ids: impl IntoIterator<Item = T>, floor: T) -> IdGenerator<T> {
    let last = ids.into_iter().fold(floor, Ord::max);
    sequential_generator(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_next_previous() {
        assert_eq!(5_i32.next(), 6);
        assert_eq!(5_i32.previous(), 4);
        assert_eq!(0_u64.previous(), u64::MAX);
    }

    #[test]
    fn test_sequential_generator() {
        let generator = sequential_generator(10_i32);
        assert_eq!(generator(), 11);
        assert_eq!(generator(), 12);

        let shared = Arc::clone(&generator);
        assert_eq!(shared(), 13);
        assert_eq!(generator(), 14);
    }

    #[test]
    fn test_generator_after() {
        let generator = generator_after(vec![3_i64, 42, 7], 0);
        assert_eq!(generator(), 43);

        let empty = generator_after(Vec::<i64>::new(), 100);
        assert_eq!(empty(), 101);
    }

    #[cfg(feature = "uuid")]
    #[test]
    fn test_uuid_next() {
        let id = uuid::Uuid::from_u128(41);
        assert_eq!(id.next(), uuid::Uuid::from_u128(42));
        assert_eq!(id.previous(), uuid::Uuid::from_u128(40));
    }
}
