use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use glam::{Vec2, Vec3};

/// Default motion sampling period.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/// Single-writer/single-reader cell holding the most recent value.
///
/// Writers overwrite, readers copy; there is no queue and no backpressure.
#[derive(Debug)]
pub struct LatestValue<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for LatestValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for LatestValue<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Copy> LatestValue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, value: T) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn load(&self) -> Option<T> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Externally owned 2D position (pointer, touch) fed straight to the light resolver.
pub type PositionCell = LatestValue<Vec2>;

/// Latest gravity reading produced by a [`MotionSubscription`].
pub type MotionCell = LatestValue<Vec3>;

/// Anything that can be polled for an `(x, y, z)` gravity sample.
pub trait MotionSource: Send + 'static {
    fn read(&mut self) -> Option<Vec3>;
}

impl<F> MotionSource for F
where
    F: FnMut() -> Option<Vec3> + Send + 'static,
{
    fn read(&mut self) -> Option<Vec3> {
        self()
    }
}

/// Replays a fixed list of samples in a loop.
#[derive(Debug, Clone)]
pub struct ScriptedMotion {
    samples: Vec<Vec3>,
    cursor: usize,
}

impl ScriptedMotion {
    pub fn new(samples: Vec<Vec3>) -> Self {
        Self { samples, cursor: 0 }
    }
}

impl MotionSource for ScriptedMotion {
    fn read(&mut self) -> Option<Vec3> {
        if self.samples.is_empty() {
            return None;
        }
        let sample = self.samples[self.cursor % self.samples.len()];
        self.cursor = self.cursor.wrapping_add(1);
        Some(sample)
    }
}

/// Background sampler writing into a [`MotionCell`]. Dropping it stops and joins the thread.
pub struct MotionSubscription {
    stop: Option<Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl MotionSubscription {
    pub fn spawn<S: MotionSource>(
        mut source: S,
        cell: MotionCell,
        interval: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("shine-motion".into())
            .spawn(move || loop {
                if let Some(sample) = source.read() {
                    cell.store(sample);
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|err| anyhow!("failed to spawn motion sampler: {err}"))?;

        tracing::debug!(interval_ms = interval.as_millis(), "motion sampler started");
        Ok(Self {
            stop: Some(stop_tx),
            join_handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("motion sampler panicked");
            }
            tracing::debug!("motion sampler stopped");
        }
    }
}

impl Drop for MotionSubscription {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn latest_value_is_last_write_wins() {
        let cell = LatestValue::new();
        assert_eq!(cell.load(), None);
        cell.store(1);
        cell.store(2);
        assert_eq!(cell.load(), Some(2));
        cell.clear();
        assert_eq!(cell.load(), None);
    }

    #[test]
    fn scripted_motion_cycles() {
        let mut source = ScriptedMotion::new(vec![Vec3::X, Vec3::Y]);
        assert_eq!(source.read(), Some(Vec3::X));
        assert_eq!(source.read(), Some(Vec3::Y));
        assert_eq!(source.read(), Some(Vec3::X));
        assert_eq!(ScriptedMotion::new(Vec::new()).read(), None);
    }

    #[test]
    fn subscription_feeds_cell_until_unsubscribed() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let cell = MotionCell::new();
        let subscription = MotionSubscription::spawn(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Vec3::new(0.0, 0.0, 9.75))
            },
            cell.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while cell.load().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(cell.load(), Some(Vec3::new(0.0, 0.0, 9.75)));
        assert!(subscription.is_running());

        subscription.unsubscribe();
        let after_drop = reads.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(reads.load(Ordering::SeqCst), after_drop);
    }
}
