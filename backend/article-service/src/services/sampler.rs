//! Randomness used by the read path.
//!
//! Everything random goes through `ArticleSampler` so the deterministic core
//! stays testable. Samplers work on indices to keep the trait object-safe;
//! `sample` and `shuffle` apply those indices to real items.

use rand::seq::{index, SliceRandom};

pub trait ArticleSampler: Send + Sync {
    /// `min(amount, len)` distinct indices in `0..len`, in random order
    fn sample_indices(&self, len: usize, amount: usize) -> Vec<usize>;

    /// A permutation of `0..len`
    fn permutation(&self, len: usize) -> Vec<usize>;
}

/// Up to `amount` random items from `items`
pub fn sample<T: Clone>(sampler: &dyn ArticleSampler, items: &[T], amount: usize) -> Vec<T> {
    sampler
        .sample_indices(items.len(), amount)
        .into_iter()
        .filter_map(|i| items.get(i).cloned())
        .collect()
}

/// `items` in a random order
pub fn shuffle<T>(sampler: &dyn ArticleSampler, items: Vec<T>) -> Vec<T> {
    let order = sampler.permutation(items.len());
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

/// Production sampler backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl ArticleSampler for ThreadRngSampler {
    fn sample_indices(&self, len: usize, amount: usize) -> Vec<usize> {
        let mut rng = rand::thread_rng();
        index::sample(&mut rng, len, amount.min(len)).into_vec()
    }

    fn permutation(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }
}

/// Deterministic sampler: first `amount` items, identity permutation
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedSampler;

impl ArticleSampler for OrderedSampler {
    fn sample_indices(&self, len: usize, amount: usize) -> Vec<usize> {
        (0..amount.min(len)).collect()
    }

    fn permutation(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}

/// Deterministic sampler that reverses, handy to prove order changed
#[derive(Debug, Default, Clone, Copy)]
pub struct ReversedSampler;

impl ArticleSampler for ReversedSampler {
    fn sample_indices(&self, len: usize, amount: usize) -> Vec<usize> {
        (0..len).rev().take(amount).collect()
    }

    fn permutation(&self, len: usize) -> Vec<usize> {
        (0..len).rev().collect()
    }
}
