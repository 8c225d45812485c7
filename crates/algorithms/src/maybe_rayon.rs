/// Parallel or sequential iteration behind one import.
///
/// With the `parallel` feature this is rayon's prelude. Without it, the
/// `into_par_iter()` entry point falls back to `into_iter()` so the rest of
/// the chain (`.map()`, `.collect()`) resolves to plain `Iterator` methods and
/// produces the same results in the same order.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`.
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
