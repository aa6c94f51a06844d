//! Per-position sweep helpers. With the `threading` feature they run on
//! rayon's pool; otherwise they are plain sequential loops.
#[cfg(feature = "threading")]
use rayon::prelude::*;

/// Evaluate `f` for every offset in `0..len`, collecting results in order.
pub(crate) fn map_offsets<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "threading")]
    {
        (0..len).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "threading"))]
    {
        (0..len).map(f).collect()
    }
}

/// Apply `f` to every element of `items` together with its offset.
pub(crate) fn for_each_mut<T, F>(items: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(feature = "threading")]
    {
        items.par_iter_mut().enumerate().for_each(|(i, item)| f(i, item));
    }
    #[cfg(not(feature = "threading"))]
    {
        items.iter_mut().enumerate().for_each(|(i, item)| f(i, item));
    }
}
