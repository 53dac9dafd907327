//! Bounded worker pool over OS threads.
//!
//! The pipeline parallelizes exactly three stages (digesting, extraction,
//! diagram rendering) and every one of them reassembles results in input
//! order, so completion order never reaches an artifact.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Map `f` over `items` with up to `workers` threads, returning results in
/// input order.
pub fn map_indexed<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let worker_count = workers.clamp(1, items.len());
    if worker_count == 1 {
        return items.iter().map(|item| f(item)).collect();
    }

    let next = AtomicUsize::new(0);
    let mut collected: Vec<(usize, R)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= items.len() {
                            break;
                        }
                        local.push((index, f(&items[index])));
                    }
                    local
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(local) => local,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    collected.sort_by_key(|(index, _)| *index);
    collected.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_input_order() {
        let items: Vec<u64> = (0..100).collect();
        let results = map_indexed(&items, 8, |n| n * 2);
        assert_eq!(results, (0..100).map(|n| n * 2).collect::<Vec<u64>>());
    }

    #[test]
    fn single_worker_and_empty_inputs_work() {
        assert_eq!(map_indexed(&[1, 2, 3], 1, |n| n + 1), vec![2, 3, 4]);
        assert!(map_indexed(&[] as &[u32], 4, |n| n + 1).is_empty());
    }

    #[test]
    fn worker_count_larger_than_items_is_clamped() {
        assert_eq!(map_indexed(&[5], 64, |n| n * n), vec![25]);
    }
}
