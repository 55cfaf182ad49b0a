//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - A reparsed config equal to the last one forwarded is dropped; editors
//!   emit several modify events per save
//! - Parse or validation failures keep the current application running

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

/// Forwards a config only when it differs from the last one forwarded.
#[derive(Debug)]
pub struct ReloadFilter {
    last: AppConfig,
}

impl ReloadFilter {
    /// Start from the config the application was built with.
    pub fn new(current: AppConfig) -> Self {
        Self { last: current }
    }

    /// `Some(config)` if it should be applied.
    pub fn offer(&mut self, config: AppConfig) -> Option<AppConfig> {
        if config == self.last {
            return None;
        }
        self.last = config.clone();
        Some(config)
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    filter: Arc<Mutex<ReloadFilter>>,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Watch `path`, treating `current` as the config already in effect.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, current: AppConfig) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                filter: Arc::new(Mutex::new(ReloadFilter::new(current))),
                update_tx,
            },
            update_rx,
        )
    }

    /// Another sender into the same update channel. Configs sent here skip
    /// the change filter.
    pub fn sender(&self) -> mpsc::UnboundedSender<AppConfig> {
        self.update_tx.clone()
    }

    /// Reload the file once and forward it if it changed. Returns whether a
    /// config was forwarded.
    pub fn reload_now(&self) -> bool {
        reload(&self.path, &self.filter, &self.update_tx)
    }

    /// Start watching the file. Keep the returned watcher alive for as long
    /// as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let filter = Arc::clone(&self.filter);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    reload(&path, &filter, &tx);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "config watcher started");
        Ok(watcher)
    }
}

fn reload(
    path: &Path,
    filter: &Mutex<ReloadFilter>,
    tx: &mpsc::UnboundedSender<AppConfig>,
) -> bool {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to reload config; keeping current configuration");
            return false;
        }
    };

    let accepted = match filter.lock() {
        Ok(mut filter) => filter.offer(config),
        Err(poisoned) => poisoned.into_inner().offer(config),
    };
    match accepted {
        Some(config) => {
            tracing::info!(path = ?path, "config file changed, reloading");
            tx.send(config).is_ok()
        }
        None => {
            tracing::debug!(path = ?path, "config file touched without changes");
            false
        }
    }
}
