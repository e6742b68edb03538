//! Lock-free counter primitives.
//!
//! Every operation is `SeqCst` and wraps on overflow, so a shared counter
//! behaves like the full-barrier `__sync_*` builtins: each thread observes a
//! single total order of updates.

use std::sync::atomic::{
    fence, AtomicI32, AtomicI64, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};

pub trait AtomicCounter {
    type Value: Copy + Eq;

    /// Add `delta`, returning the value before the add.
    fn add_fetch_old(&self, delta: Self::Value) -> Self::Value;
    /// Add `delta`, returning the value after the add.
    fn add_fetch_new(&self, delta: Self::Value) -> Self::Value;
    fn sub_fetch_old(&self, delta: Self::Value) -> Self::Value;
    fn sub_fetch_new(&self, delta: Self::Value) -> Self::Value;

    fn inc_old(&self) -> Self::Value;
    fn inc_new(&self) -> Self::Value;
    fn dec_old(&self) -> Self::Value;
    fn dec_new(&self) -> Self::Value;

    /// Compare-and-swap: store `new` iff the current value is `expected`.
    fn cas(&self, expected: Self::Value, new: Self::Value) -> bool;
    /// Like [`AtomicCounter::cas`], but return the value seen before the attempt.
    fn cas_value(&self, expected: Self::Value, new: Self::Value) -> Self::Value;
}

macro_rules! impl_atomic_counter {
    ($($atomic:ty => $int:ty),* $(,)?) => {
        $(
            impl AtomicCounter for $atomic {
                type Value = $int;

                #[inline]
                fn add_fetch_old(&self, delta: $int) -> $int {
                    self.fetch_add(delta, Ordering::SeqCst)
                }

                #[inline]
                fn add_fetch_new(&self, delta: $int) -> $int {
                    self.fetch_add(delta, Ordering::SeqCst).wrapping_add(delta)
                }

                #[inline]
                fn sub_fetch_old(&self, delta: $int) -> $int {
                    self.fetch_sub(delta, Ordering::SeqCst)
                }

                #[inline]
                fn sub_fetch_new(&self, delta: $int) -> $int {
                    self.fetch_sub(delta, Ordering::SeqCst).wrapping_sub(delta)
                }

                #[inline]
                fn inc_old(&self) -> $int {
                    self.add_fetch_old(1)
                }

                #[inline]
                fn inc_new(&self) -> $int {
                    self.add_fetch_new(1)
                }

                #[inline]
                fn dec_old(&self) -> $int {
                    self.sub_fetch_old(1)
                }

                #[inline]
                fn dec_new(&self) -> $int {
                    self.sub_fetch_new(1)
                }

                #[inline]
                fn cas(&self, expected: $int, new: $int) -> bool {
                    self.compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                }

                #[inline]
                fn cas_value(&self, expected: $int, new: $int) -> $int {
                    match self.compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(old) | Err(old) => old,
                    }
                }
            }
        )*
    };
}

impl_atomic_counter! {
    AtomicI32 => i32,
    AtomicI64 => i64,
    AtomicIsize => isize,
    AtomicU32 => u32,
    AtomicU64 => u64,
    AtomicUsize => usize,
}

/// Full memory barrier.
#[inline]
pub fn memory_barrier() {
    fence(Ordering::SeqCst);
}
