//! Merge policies
//!
//! A merge combines the items accumulated so far with a freshly fetched
//! page. Every policy here keeps the previous items in their relative order
//! and only appends; when an item already accumulated shows up again the
//! first occurrence wins.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

/// Shared merge function: `(accumulated, page) -> new accumulation`
pub type MergeFn<T> = Arc<dyn Fn(&[T], Vec<T>) -> Vec<T> + Send + Sync>;

/// Append the page as-is
pub fn concat<T: Clone>(previous: &[T], page: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(previous.len() + page.len());
    merged.extend_from_slice(previous);
    merged.extend(page);
    merged
}

/// Append the page, dropping items equal to one already present
///
/// Duplicates inside the page itself are dropped as well. Each item is
/// compared against everything kept so far, so a feed of `n` items costs
/// O(n²); long feeds should use [`concat_distinct_by_key`].
pub fn concat_distinct<T: Clone + PartialEq>(previous: &[T], page: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(previous.len() + page.len());
    for item in previous.iter().cloned().chain(page) {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    merged
}

/// Build a merge that treats items with equal keys as the same item
pub fn concat_distinct_by_key<T, K, F>(key: F) -> impl Fn(&[T], Vec<T>) -> Vec<T> + Send + Sync
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K + Send + Sync,
{
    move |previous: &[T], page: Vec<T>| {
        let mut seen = HashSet::with_capacity(previous.len() + page.len());
        let mut merged = Vec::with_capacity(previous.len() + page.len());
        for item in previous.iter().cloned().chain(page) {
            if seen.insert(key(&item)) {
                merged.push(item);
            }
        }
        merged
    }
}

/// Keep only the new page
pub fn replace<T>(_previous: &[T], page: Vec<T>) -> Vec<T> {
    page
}

/// Wrap a merge function for storage in a paginator
pub fn shared<T, F>(f: F) -> MergeFn<T>
where
    F: Fn(&[T], Vec<T>) -> Vec<T> + Send + Sync + 'static,
{
    Arc::new(f)
}
