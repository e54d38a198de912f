//! Restart-on-change supervisor
//!
//! Runs the cycle driver as a task and polls the modification time of the
//! config file (plus any extra watched files). On a change the driver is
//! stopped between cycles, the config is reloaded and a fresh driver is
//! started. A reload that fails keeps the previous config.

use anyhow::Result;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::driver::CycleDriver;

/// Remembers the last seen mtime of each file. A file that appears or
/// disappears counts as a change.
pub struct FileWatcher {
    stamps: Vec<(PathBuf, Option<SystemTime>)>,
}

impl FileWatcher {
    pub fn new<I>(files: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut stamps: Vec<(PathBuf, Option<SystemTime>)> = Vec::new();
        for path in files {
            if stamps.iter().any(|(p, _)| *p == path) {
                continue;
            }
            let stamp = modified(&path);
            stamps.push((path, stamp));
        }
        Self { stamps }
    }

    /// Re-stat every file; returns the first one whose mtime moved.
    pub fn changed(&mut self) -> Option<PathBuf> {
        let mut first = None;
        for (path, stamp) in self.stamps.iter_mut() {
            let now = modified(path);
            if now != *stamp {
                *stamp = now;
                if first.is_none() {
                    first = Some(path.clone());
                }
            }
        }
        first
    }

    pub async fn wait_for_change(&mut self, poll: Duration) -> PathBuf {
        loop {
            tokio::time::sleep(poll).await;
            if let Some(path) = self.changed() {
                return path;
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub struct Supervisor<F> {
    config_path: PathBuf,
    config: Config,
    build: F,
    poll_override: Option<Duration>,
}

impl<F> Supervisor<F>
where
    F: FnMut(&Config) -> Result<CycleDriver>,
{
    pub fn new(config_path: PathBuf, config: Config, build: F) -> Self {
        Self { config_path, config, build, poll_override: None }
    }

    /// Fixed poll interval instead of `supervisor.poll_interval_secs`
    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll_override = Some(poll);
        self
    }

    fn poll_interval(&self) -> Duration {
        self.poll_override
            .unwrap_or_else(|| Duration::from_secs(self.config.supervisor.poll_interval_secs))
    }

    fn watched_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.config_path.clone()];
        files.extend(self.config.supervisor.watch_files.iter().cloned());
        files
    }

    /// Runs until `shutdown` resolves. The driver always finishes its
    /// current cycle before being replaced or stopped.
    pub async fn run<S>(mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let mut driver = (self.build)(&self.config)?;
            if self.config.cycle.cancel_all_on_startup {
                driver.cancel_all_orders().await;
            }

            let mut watcher = FileWatcher::new(self.watched_files());
            let poll = self.poll_interval();
            let (stop_tx, stop_rx) = watch::channel(false);
            let handle = tokio::spawn(async move {
                driver.run(stop_rx).await;
                driver
            });

            let restart = tokio::select! {
                path = watcher.wait_for_change(poll) => {
                    info!("[SUPERVISOR] {} changed, restarting", path.display());
                    true
                }
                _ = &mut shutdown => {
                    info!("[SUPERVISOR] shutdown requested");
                    false
                }
            };

            let _ = stop_tx.send(true);
            match handle.await {
                Ok(driver) => info!("[SUPERVISOR] driver stopped ({:?})", driver.state()),
                Err(e) => error!("[SUPERVISOR] driver task failed: {}", e),
            }

            if !restart {
                return Ok(());
            }

            match Config::load(&self.config_path) {
                Ok(config) => self.config = config,
                Err(e) => warn!("[SUPERVISOR] reload failed, keeping previous config: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverSettings;
    use crate::exchange::mock::{MockVenue, VenueCall};
    use std::fs::File;
    use std::io::Write;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    // Written aside and renamed in, so a poll never sees a half-written file.
    fn touch(path: &Path, contents: &str, bump_secs: u64) {
        let staging = path.with_extension("staging");
        let mut file = File::create(&staging).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs)).unwrap();
        drop(file);
        std::fs::rename(&staging, path).unwrap();
    }

    fn cancel_alls(venue: &MockVenue) -> usize {
        venue.calls().iter().filter(|c| **c == VenueCall::CancelAll).count()
    }

    async fn wait_until<P: Fn() -> bool>(pred: P) {
        for _ in 0..300 {
            if pred() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_watcher_sees_modify_create_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.toml");
        let later = dir.path().join("b.toml");
        touch(&existing, "x", 0);

        let mut watcher = FileWatcher::new(vec![existing.clone(), later.clone(), existing.clone()]);
        assert_eq!(watcher.stamps.len(), 2);
        assert_eq!(watcher.changed(), None);

        touch(&existing, "y", 10);
        assert_eq!(watcher.changed(), Some(existing.clone()));
        assert_eq!(watcher.changed(), None);

        touch(&later, "z", 0);
        assert_eq!(watcher.changed(), Some(later.clone()));

        std::fs::remove_file(&later).unwrap();
        assert_eq!(watcher.changed(), Some(later));
    }

    fn spawn_supervisor(
        path: PathBuf,
        venue: Arc<MockVenue>,
        builds: Arc<std::sync::atomic::AtomicUsize>,
    ) -> (oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let config = Config::load(&path).unwrap();
        let build = move |config: &Config| -> Result<CycleDriver> {
            builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(CycleDriver::new(venue.clone(), venue.clone(), DriverSettings::from(config)))
        };
        let supervisor = Supervisor::new(path, config, build).with_poll_interval(Duration::from_millis(20));
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(supervisor.run(async move {
            let _ = rx.await;
        }));
        (tx, handle)
    }

    #[tokio::test]
    async fn test_config_change_restarts_the_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        touch(&path, "[cycle]\ninterval_secs = 60\n", 0);
        let venue = Arc::new(MockVenue::new());
        let builds = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let (tx, handle) = spawn_supervisor(path.clone(), venue.clone(), builds.clone());
        wait_until(|| cancel_alls(&venue) == 1).await;

        touch(&path, "[cycle]\ninterval_secs = 61\n", 10);
        wait_until(|| cancel_alls(&venue) == 2).await;
        assert_eq!(cancel_alls(&venue), 2);
        assert_eq!(builds.load(std::sync::atomic::Ordering::SeqCst), 2);

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_broken_reload_keeps_running_on_old_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        touch(&path, "[cycle]\ninterval_secs = 60\n", 0);
        let venue = Arc::new(MockVenue::new());
        let builds = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let (tx, handle) = spawn_supervisor(path.clone(), venue.clone(), builds.clone());
        wait_until(|| cancel_alls(&venue) == 1).await;

        touch(&path, "[cycle\nthis is not toml", 10);
        wait_until(|| builds.load(std::sync::atomic::Ordering::SeqCst) == 2).await;
        assert_eq!(builds.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(!handle.is_finished());

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
