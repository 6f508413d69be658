//! Periodic removal of expired cache entries.

use std::time::Duration;

use log::info;
use parking_lot::Mutex;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::ImageCache;

/// Stops the sweep task when told to, or when dropped.
pub struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signals shutdown and waits for the task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Runs `ImageCache::sweep` on a fixed interval, using the cache's clock.
pub struct SweepScheduler {
    cache: ImageCache,
    every: Duration,
}

impl SweepScheduler {
    pub fn new(cache: ImageCache, every: Duration) -> Self {
        Self { cache, every }
    }

    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SweepHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut timer = interval(self.every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; nothing can be stale yet
        timer.tick().await;

        info!("Cache sweep scheduled every {:?}", self.every);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let now = self.cache.clock().now();
                    self.cache.sweep(now);
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Cache sweep stopped");
                        break;
                    }
                }
            }
        }
    }
}

/// Starts the sweep when Rocket lifts off and stops it on shutdown.
pub struct SweepFairing {
    every: Duration,
    handle: Mutex<Option<SweepHandle>>,
}

impl SweepFairing {
    pub fn new(every: Duration) -> Self {
        Self {
            every,
            handle: Mutex::new(None),
        }
    }
}

#[rocket::async_trait]
impl Fairing for SweepFairing {
    fn info(&self) -> Info {
        Info {
            name: "Cache sweep",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        if let Some(cache) = rocket.state::<ImageCache>() {
            let handle = SweepScheduler::new(cache.clone(), self.every).start();
            *self.handle.lock() = Some(handle);
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
