//! Async driver for the tick loop.
//!
//! [`Runtime`] shares the engine behind a `tokio` mutex and owns the task
//! that calls [`Engine::tick_at`] and sleeps for the delay it returns. The
//! task only exists while the engine is running: `pause`, `destroy` and
//! `clear` abort it, so no wake-up stays scheduled.

use std::sync::Arc;

use darker_component::{ComponentKind, EntityKind};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::LoadConfig;
use crate::engine::Engine;
use crate::error::ConfigError;

/// An engine plus the task ticking it.
pub struct Runtime<T, K> {
    engine: Arc<Mutex<Engine<T, K>>>,
    ticker: Option<JoinHandle<()>>,
}

impl<T: EntityKind, K: ComponentKind> Runtime<T, K> {
    /// Wrap an engine. Nothing ticks until [`load`](Self::load).
    #[must_use]
    pub fn new(engine: Engine<T, K>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            ticker: None,
        }
    }

    /// A shared handle to the engine.
    #[must_use]
    pub fn engine(&self) -> Arc<Mutex<Engine<T, K>>> {
        Arc::clone(&self.engine)
    }

    /// Lock the engine.
    pub async fn lock(&self) -> MutexGuard<'_, Engine<T, K>> {
        self.engine.lock().await
    }

    /// Returns `true` while the tick task is alive.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Load the engine and start ticking.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the load configuration is invalid.
    pub async fn load(&mut self, config: LoadConfig<T>) -> Result<(), ConfigError> {
        self.engine.lock().await.load(config)?;
        self.start();
        Ok(())
    }

    /// Stop ticking and pause the engine.
    pub async fn pause(&mut self) -> bool {
        let paused = self.engine.lock().await.pause();
        if paused {
            self.stop();
        }
        paused
    }

    /// Resume the engine and start ticking again.
    pub async fn resume(&mut self) -> bool {
        let resumed = self.engine.lock().await.resume();
        if resumed {
            self.start();
        }
        resumed
    }

    /// Rebuild every system's hook bindings.
    pub async fn hard_reload(&self) {
        self.engine.lock().await.hard_reload();
    }

    /// Stop ticking and destroy the engine.
    pub async fn destroy(&mut self) {
        self.stop();
        self.engine.lock().await.destroy();
    }

    /// Stop ticking and clear the engine.
    pub async fn clear(&mut self) {
        self.stop();
        self.engine.lock().await.clear();
    }

    fn start(&mut self) {
        self.stop();
        self.ticker = Some(tokio::spawn(tick_loop(Arc::clone(&self.engine))));
    }

    fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl<T, K> Drop for Runtime<T, K> {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl<T: std::fmt::Debug, K: std::fmt::Debug> std::fmt::Debug for Runtime<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("ticking", &self.ticker.is_some())
            .finish_non_exhaustive()
    }
}

async fn tick_loop<T: EntityKind, K: ComponentKind>(engine: Arc<Mutex<Engine<T, K>>>) {
    debug!("tick loop started");
    loop {
        let delay = engine.lock().await.tick_at(Instant::now());
        let Some(delay) = delay else {
            break;
        };
        tokio::time::sleep(delay).await;
    }
    debug!("tick loop stopped");
}
