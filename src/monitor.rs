//! The long-running driver: refresh, aggregate, emit one JSON line, wait.

use anyhow::{Context, Result};
use gitbar_core::ports::SystemClock;
use gitbar_core::{
    aggregate, picker_entries, RefreshScheduler, RepositorySetScanner, StatusProbe, WidgetIcons,
    WidgetOutput,
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::adapters::{Git2Adapter, SystemAuthProbe};
use crate::config::{Config, ConfigSource};

/// Upper bound on the wait between two emitted lines.
pub const MAX_POLL: Duration = Duration::from_secs(5);

/// Builds the scanner for a configuration; swapped out in tests.
pub type ScannerFactory = Box<dyn Fn(&Config) -> Result<RepositorySetScanner> + Send + Sync>;

/// Scanner over real repositories: git2 plus the system auth helpers.
pub fn system_scanner(config: &Config) -> Result<RepositorySetScanner> {
    let probe = StatusProbe::new(
        Git2Adapter::new(),
        SystemAuthProbe::new(),
        config.auth_settings(),
        config.fetch_settings(),
    );
    Ok(RepositorySetScanner::with_parallelism(
        Arc::new(probe),
        config.advanced.parallel_checks,
    )?)
}

/// Write one output object as a single line and flush.
pub fn emit<W: Write>(out: &mut W, output: &WidgetOutput) -> io::Result<()> {
    serde_json::to_writer(&mut *out, output)?;
    out.write_all(b"\n")?;
    out.flush()
}

pub fn is_broken_pipe(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe
}

/// Scan once and emit a single line.
pub fn run_once<W: Write>(scanner: &RepositorySetScanner, config: &Config, out: &mut W) -> Result<()> {
    let results = scanner.scan(&config.repository_paths());
    let output = WidgetOutput::from_summary(&aggregate(&results), &config.widget_icons());
    ignore_broken_pipe(emit(out, &output))
}

/// Scan once and print one picker entry per line.
pub fn list_entries<W: Write>(scanner: &RepositorySetScanner, config: &Config, out: &mut W) -> Result<()> {
    let results = scanner.scan(&config.repository_paths());
    let written = picker_entries(&results)
        .iter()
        .try_for_each(|entry| writeln!(out, "{}", entry))
        .and_then(|_| out.flush());
    ignore_broken_pipe(written)
}

fn ignore_broken_pipe(result: io::Result<()>) -> Result<()> {
    match result {
        Err(e) if is_broken_pipe(&e) => {
            debug!("Output closed before all lines were written");
            Ok(())
        }
        other => Ok(other.context("Failed to write output")?),
    }
}

/// Everything derived from one configuration load.
struct Session {
    scanner: Arc<RepositorySetScanner>,
    paths: Arc<Vec<String>>,
    icons: WidgetIcons,
    poll: Duration,
}

impl Session {
    fn build(factory: &ScannerFactory, config: &Config) -> Result<Self> {
        Ok(Self {
            scanner: Arc::new(factory(config)?),
            paths: Arc::new(config.repository_paths()),
            icons: config.widget_icons(),
            poll: config.update_interval.min(MAX_POLL),
        })
    }
}

/// Cloneable control surface for signal handlers.
#[derive(Clone)]
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    scheduler: Arc<RefreshScheduler<SystemClock>>,
}

impl MonitorHandle {
    /// Drop the cache and start a new cycle now.
    pub fn refresh_now(&self) {
        info!("Manual refresh triggered");
        self.scheduler.invalidate();
        self.wake.notify_one();
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub struct Monitor<W> {
    source: Option<ConfigSource>,
    config_mtime: Option<SystemTime>,
    factory: ScannerFactory,
    session: Session,
    handle: MonitorHandle,
    out: W,
}

impl<W: Write> Monitor<W> {
    /// `source` enables hot reload; without it the configuration is fixed.
    pub fn new(
        config: &Config,
        source: Option<ConfigSource>,
        factory: ScannerFactory,
        out: W,
    ) -> Result<Self> {
        let session = Session::build(&factory, config)?;
        let scheduler = RefreshScheduler::new(SystemClock, config.refresh_policy()?);
        let config_mtime = source.as_ref().and_then(ConfigSource::modified);

        Ok(Self {
            source,
            config_mtime,
            factory,
            session,
            handle: MonitorHandle {
                running: Arc::new(AtomicBool::new(true)),
                wake: Arc::new(Notify::new()),
                scheduler: Arc::new(scheduler),
            },
            out,
        })
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Produce the output for one cycle.
    pub async fn run_cycle(&mut self) -> Result<WidgetOutput> {
        self.maybe_reload();

        let scheduler = self.handle.scheduler.clone();
        let scanner = self.session.scanner.clone();
        let paths = self.session.paths.clone();

        // Scans block on git and subprocesses
        let outcome = tokio::task::spawn_blocking(move || {
            scheduler.refresh(|| Ok(scanner.scan(paths.as_slice())))
        })
        .await
        .context("Scan task failed")?;

        let summary = aggregate(&outcome.cache().results);
        Ok(WidgetOutput::from_summary(&summary, &self.session.icons))
    }

    /// Run until stopped or until stdout goes away.
    pub async fn run(mut self) -> Result<()> {
        info!("Starting git status monitor");

        while self.handle.is_running() {
            let output = match self.run_cycle().await {
                Ok(output) => output,
                Err(e) => {
                    error!("Monitor cycle failed: {:#}", e);
                    WidgetOutput::error("Git monitor error", format!("{:#}", e))
                }
            };

            match emit(&mut self.out, &output) {
                Ok(()) => {}
                Err(e) if is_broken_pipe(&e) => {
                    info!("Output closed, stopping monitor");
                    break;
                }
                Err(e) => return Err(e).context("Failed to write status line"),
            }

            if !self.handle.is_running() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.session.poll) => {}
                _ = self.handle.wake.notified() => debug!("Woken before poll interval"),
            }
        }

        info!("Git status monitor stopped");
        Ok(())
    }

    /// Reload when the config file's mtime changed. A bad reload keeps the
    /// previous configuration.
    fn maybe_reload(&mut self) {
        let Some(source) = &self.source else {
            return;
        };
        let modified = source.modified();
        if modified == self.config_mtime {
            return;
        }
        self.config_mtime = modified;

        let reloaded = source.load().and_then(|config| {
            let policy = config.refresh_policy()?;
            let session = Session::build(&self.factory, &config)?;
            Ok((policy, session))
        });

        match reloaded {
            Ok((policy, session)) => {
                self.session = session;
                self.handle.scheduler.set_policy(policy);
                self.handle.scheduler.invalidate();
                info!("Configuration reloaded");
            }
            Err(e) => warn!("Failed to reload configuration, keeping previous: {:#}", e),
        }
    }
}

/// SIGUSR1 refreshes; SIGTERM and SIGINT stop the loop.
#[cfg(unix)]
pub fn spawn_signal_handlers(handle: MonitorHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = usr1.recv() => handle.refresh_now(),
                _ = term.recv() => {
                    info!("Received SIGTERM, shutting down");
                    handle.stop();
                    break;
                }
                _ = int.recv() => {
                    info!("Received SIGINT, shutting down");
                    handle.stop();
                    break;
                }
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_signal_handlers(handle: MonitorHandle) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            handle.stop();
        }
    });
    Ok(())
}
