//! Bounded-concurrency wave scheduler.
//!
//! Items are split into waves of at most `wave_size`. Every task in a wave is
//! spawned at once; the next wave starts only after all of them settle.

use std::future::Future;

use tokio::task::JoinError;

/// One input item with its task outcome. `Err` only if the task panicked.
#[derive(Debug)]
pub struct Settled<T, R> {
    pub item: T,
    pub outcome: Result<R, JoinError>,
}

/// Run `task` over `items`, at most `wave_size` at a time, in sequential waves.
///
/// Results come back in input order regardless of completion order.
pub async fn run_in_waves<T, R, F, Fut>(
    items: Vec<T>,
    wave_size: usize,
    task: F,
) -> Vec<Settled<T, R>>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let wave_size = wave_size.max(1);
    let mut settled = Vec::with_capacity(items.len());

    for (wave_index, wave) in items.chunks(wave_size).enumerate() {
        log::debug!("waves: starting wave {} ({} tasks)", wave_index + 1, wave.len());

        let handles: Vec<_> = wave
            .iter()
            .map(|item| (item.clone(), tokio::spawn(task(item.clone()))))
            .collect();

        // Whole wave is already running; awaiting in spawn order only fixes
        // the order results are collected in.
        for (item, handle) in handles {
            settled.push(Settled {
                item,
                outcome: handle.await,
            });
        }
    }

    settled
}
