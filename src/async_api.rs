use crate::{Driver, Error, HarnessConfig, Launcher, Result, ViewportProfile};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

enum Command {
    Navigate(String, oneshot::Sender<Result<()>>),
    Evaluate(String, oneshot::Sender<Result<String>>),
    Screenshot(oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Worker threads started by `Session::open`
///
/// A dropped session's worker can still be blocked inside a driver call
/// (e.g. a navigation) and only releases its browser once that returns.
/// `settle` lets a run wait for those before the process exits.
#[derive(Clone, Default)]
pub struct Workers {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Workers {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    /// Join finished workers; returns how many are still running.
    pub fn reap(&self) -> usize {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        let (done, running): (Vec<_>, Vec<_>) =
            handles.drain(..).partition(|h| h.is_finished());
        for handle in done {
            let _ = handle.join();
        }
        *handles = running;
        handles.len()
    }

    /// Wait up to `grace` for every worker to finish. Returns the number
    /// still running when the grace period ran out.
    pub async fn settle(&self, grace: Duration) -> usize {
        let deadline = Instant::now() + grace;
        loop {
            let running = self.reap();
            if running == 0 || Instant::now() >= deadline {
                return running;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// An awaitable handle on one isolated browser context.
///
/// The context is created on, and only ever touched by, a dedicated worker
/// thread; async callers send commands and await replies. Dropping the
/// session without `close` ends the worker once its current command
/// finishes, which releases the browser.
pub struct Session {
    cmd_tx: Sender<Command>,
    label: String,
}

impl Session {
    /// Launch a driver for `viewport` on a new worker thread, registered
    /// with `workers`.
    pub async fn open<L: Launcher>(
        launcher: Arc<L>,
        viewport: ViewportProfile,
        config: HarnessConfig,
        workers: &Workers,
    ) -> Result<Self> {
        let label = viewport.name.clone();
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        let worker = thread::Builder::new()
            .name(format!("layoutprobe-{}", label))
            .spawn(move || {
                // Initialize driver on the worker thread
                let mut driver = match launcher.launch(&viewport, &config) {
                    Ok(d) => d,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                // Nobody is waiting any more: the open was cancelled or timed out
                if init_tx.send(Ok(())).is_err() {
                    let _ = driver.close();
                    return;
                }

                // Command loop
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Navigate(url, resp) => {
                            let _ = resp.send(driver.navigate(&url));
                        }
                        Command::Evaluate(script, resp) => {
                            let _ = resp.send(driver.evaluate(&script));
                        }
                        Command::Screenshot(resp) => {
                            let _ = resp.send(driver.screenshot());
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(driver.close());
                            return;
                        }
                    }
                }
                let _ = driver.close();
            })?;
        workers.track(worker);

        // Wait for the worker to report initialization success or failure
        init_rx
            .await
            .map_err(|e| Error::LaunchError(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx, label })
    }

    async fn request<T>(
        &self,
        what: &str,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| Error::Other(format!("{} worker for {} is gone", what, self.label)))?;
        rx.await
            .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?
    }

    /// Navigate and wait for load completion
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.request("Navigate", move |tx| Command::Navigate(url, tx)).await
    }

    /// Evaluate a script and return its JSON text
    pub async fn evaluate(&self, script: &str) -> Result<String> {
        let script = script.to_string();
        self.request("Evaluate", move |tx| Command::Evaluate(script, tx)).await
    }

    /// Capture a PNG of the viewport
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.request("Screenshot", Command::Screenshot).await
    }

    /// Shut the worker down and release the browser.
    pub async fn close(self) -> Result<()> {
        self.request("Close", Command::Close).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureLauncher;
    use crate::geometry::GeometryFact;

    #[tokio::test]
    async fn session_round_trips_commands_through_worker() {
        let fact = GeometryFact::new(390.0, 390.0);
        let launcher = Arc::new(FixtureLauncher::new().page("home.html", fact.clone()));
        let workers = Workers::new();
        let session = Session::open(
            launcher.clone(),
            ViewportProfile::mobile(),
            HarnessConfig::default(),
            &workers,
        )
        .await
        .unwrap();
        session.navigate("http://localhost:4173/home.html").await.unwrap();
        let raw = session.evaluate("probe").await.unwrap();
        let expected = GeometryFact {
            url: "http://localhost:4173/home.html".into(),
            ..fact
        };
        assert_eq!(crate::probe::ProbePlan::parse(&raw).unwrap(), expected);
        session.close().await.unwrap();
        assert_eq!(workers.settle(Duration::from_secs(1)).await, 0);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn dropped_session_releases_driver_after_blocked_call() {
        let launcher = Arc::new(FixtureLauncher::new().hang("slow.html", Duration::from_millis(300)));
        let workers = Workers::new();
        let session = Session::open(
            launcher.clone(),
            ViewportProfile::desktop(),
            HarnessConfig::default(),
            &workers,
        )
        .await
        .unwrap();

        let navigation = session.navigate("http://localhost:4173/slow.html");
        assert!(tokio::time::timeout(Duration::from_millis(20), navigation)
            .await
            .is_err());
        drop(session);

        assert_eq!(workers.settle(Duration::from_millis(1)).await, 1);
        assert_eq!(launcher.closes(), 0);
        assert_eq!(workers.settle(Duration::from_secs(3)).await, 0);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn launch_failure_surfaces_from_open() {
        let launcher = Arc::new(FixtureLauncher::new().fail_launch("no browser"));
        let err = Session::open(
            launcher,
            ViewportProfile::desktop(),
            HarnessConfig::default(),
            &Workers::new(),
        )
        .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::LaunchError(_)));
    }
}
