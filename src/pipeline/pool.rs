/// Execution pools for independent units of work
///
/// Both strategies return results in input order; callers never need to know
/// which one is active.
use crossbeam_channel::unbounded;
use std::thread;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    /// Run every item on the caller's thread, in order.
    Sequential,
    /// Run items on `procs` scoped worker threads.
    Concurrent { procs: usize },
}

impl Pool {
    /// A single worker degrades to the sequential pool.
    pub fn new(procs: usize) -> Self {
        if procs <= 1 {
            Pool::Sequential
        } else {
            Pool::Concurrent { procs }
        }
    }

    pub fn procs(&self) -> usize {
        match self {
            Pool::Sequential => 1,
            Pool::Concurrent { procs } => *procs,
        }
    }

    /// Apply `f` to every item, returning results in the order of `items`.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        match *self {
            Pool::Sequential => items.into_iter().map(f).collect(),
            Pool::Concurrent { procs } => map_concurrent(procs, items, &f),
        }
    }
}

fn map_concurrent<T, R, F>(procs: usize, items: Vec<T>, f: &F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    let workers = procs.min(total);
    if workers == 0 {
        return Vec::new();
    }

    let (work_sender, work_receiver) = unbounded::<(usize, T)>();
    let (result_sender, result_receiver) = unbounded::<(usize, R)>();

    for item in items.into_iter().enumerate() {
        // The receiver is alive in this scope, so the queue cannot be disconnected
        if work_sender.send(item).is_err() {
            break;
        }
    }
    drop(work_sender);

    thread::scope(|scope| {
        for worker in 0..workers {
            let work_receiver = work_receiver.clone();
            let result_sender = result_sender.clone();
            scope.spawn(move || {
                debug!(worker, "pool worker started");
                for (index, item) in work_receiver.iter() {
                    if result_sender.send((index, f(item))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_sender);

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    for (index, result) in result_receiver.try_iter() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_new_selects_strategy() {
        assert_eq!(Pool::new(0), Pool::Sequential);
        assert_eq!(Pool::new(1), Pool::Sequential);
        assert_eq!(Pool::new(4), Pool::Concurrent { procs: 4 });
        assert_eq!(Pool::new(4).procs(), 4);
    }

    #[test]
    fn test_sequential_preserves_order() {
        let results = Pool::Sequential.map(vec!["a", "b", "c"], |s| s.to_uppercase());
        assert_eq!(results, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_concurrent_preserves_order_despite_completion_order() {
        // Earlier items sleep longer so they finish last
        let items: Vec<u64> = (0..6).collect();
        let results = Pool::new(3).map(items, |i| {
            thread::sleep(Duration::from_millis(10 * (6 - i)));
            i * 10
        });

        assert_eq!(results, vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_concurrent_uses_multiple_threads() {
        let threads = Mutex::new(HashSet::new());
        let results = Pool::new(2).map(vec![1, 2, 3, 4], |i| {
            threads.lock().unwrap().insert(thread::current().id());
            thread::sleep(Duration::from_millis(20));
            i
        });

        assert_eq!(results, vec![1, 2, 3, 4]);
        let threads = threads.into_inner().unwrap();
        assert!(threads.len() <= 2);
        assert!(!threads.contains(&thread::current().id()));
    }

    #[test]
    fn test_empty_input() {
        let results: Vec<i32> = Pool::new(4).map(Vec::<i32>::new(), |i| i);
        assert!(results.is_empty());
    }
}
