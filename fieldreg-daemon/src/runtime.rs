use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use fieldreg_core::{queue, Config};
use fieldreg_sync::{
    connectivity::{ConnectivityWatcher, Edge, HttpConnectivity},
    coordinator::{DrainOutcome, DrainReport, RejectedRecord, SyncCoordinator},
    submit::{HttpSubmissionClient, SubmissionClient},
    Connectivity,
};

use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, socket_path};
use crate::protocol::{DaemonReply, DaemonRequest};

/// Shared view of the last connectivity probe.
pub type OnlineFlag = Arc<AtomicBool>;

/// Last completed drain, shown in `status` until the next pass replaces it.
pub type LastDrain = Arc<RwLock<Option<DrainSummary>>>;

struct DrainJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<DrainSummary, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrainSummary {
    pub source: String,
    pub outcome: String,
    pub attempted: usize,
    pub accepted: usize,
    pub network_errors: usize,
    pub rejected: Vec<RejectedRecord>,
    pub duration_ms: u128,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime: connectivity probe, drain processor, socket server.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let config = Config::load_at(&home)?;
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client = HttpSubmissionClient::new(config.endpoint.clone(), timeout);
    let probe = HttpConnectivity::new(config.endpoint.clone(), timeout.min(Duration::from_secs(5)));

    let coordinator = Arc::new(SyncCoordinator::new(home.clone(), client));
    let online: OnlineFlag = Arc::new(AtomicBool::new(false));
    let last_drain: LastDrain = Arc::new(RwLock::new(None));
    let started_at_unix = unix_seconds_now();

    let (sync_tx, sync_rx) = mpsc::channel::<DrainJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let connectivity_handle = {
        let shutdown = shutdown_tx.clone();
        let online = online.clone();
        let sync_tx = sync_tx.clone();
        let interval = Duration::from_secs(config.probe_interval_secs.max(1));
        tokio::spawn(async move {
            let result =
                connectivity_task(probe, online, sync_tx, interval, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let coordinator = coordinator.clone();
        let last_drain = last_drain.clone();
        tokio::spawn(async move {
            let result =
                drain_processor_task(coordinator, last_drain, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let online = online.clone();
        let last_drain = last_drain.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                online,
                last_drain,
                sync_tx,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (connectivity_result, processor_result, socket_result, signal_result) = tokio::join!(
        connectivity_handle,
        processor_handle,
        socket_handle,
        signal_handle
    );

    handle_join("connectivity", connectivity_result)?;
    handle_join("drain_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn connectivity_task(
    probe: HttpConnectivity,
    online: OnlineFlag,
    sync_tx: mpsc::Sender<DrainJob>,
    probe_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    // Edges flow through a channel so drain triggering stays proportional to
    // actual connectivity changes, never to probe count.
    let (edge_tx, mut edge_rx) = mpsc::unbounded_channel::<Edge>();
    let mut watcher = ConnectivityWatcher::new();
    watcher.subscribe(move |edge| {
        let _ = edge_tx.send(edge);
    });

    // Prime the watcher with the startup state; if already online, run one
    // explicit catch-up drain over whatever the device queued while off.
    let startup_online = probe_once(&probe).await?;
    online.store(startup_online, Ordering::SeqCst);
    watcher.observe(startup_online);
    if startup_online {
        match enqueue_drain(&sync_tx, "startup").await {
            Ok(summary) => log_drain_summary(&summary),
            Err(err) => tracing::error!(error = %err, "startup drain failed"),
        }
    }

    let mut interval = tokio::time::interval(probe_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let now_online = probe_once(&probe).await?;
                online.store(now_online, Ordering::SeqCst);
                watcher.observe(now_online);
            }
            edge = edge_rx.recv() => {
                let Some(edge) = edge else { break };
                match edge {
                    Edge::CameOnline => {
                        tracing::info!("connectivity restored, draining queue");
                        match enqueue_drain(&sync_tx, "connectivity").await {
                            Ok(summary) => log_drain_summary(&summary),
                            Err(err) => {
                                tracing::error!(error = %err, "edge-triggered drain failed");
                            }
                        }
                    }
                    Edge::WentOffline => {
                        tracing::info!("connectivity lost; registrations will queue locally");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn probe_once(probe: &HttpConnectivity) -> Result<bool, DaemonError> {
    let probe = probe.clone();
    tokio::task::spawn_blocking(move || probe.is_online())
        .await
        .map_err(|err| DaemonError::Protocol(format!("probe task join error: {err}")))
}

async fn drain_processor_task<C>(
    coordinator: Arc<SyncCoordinator<C>>,
    last_drain: LastDrain,
    mut sync_rx: mpsc::Receiver<DrainJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError>
where
    C: SubmissionClient + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let coordinator = coordinator.clone();
                let drain_result = tokio::task::spawn_blocking(move || coordinator.drain())
                    .await
                    .map_err(|err| DaemonError::Protocol(format!("drain task join error: {err}")))?;

                let outcome = match drain_result {
                    Ok(outcome) => {
                        let summary = build_drain_summary(job.source, outcome, started.elapsed());
                        *last_drain.write().await = Some(summary.clone());
                        Ok(summary)
                    }
                    Err(err) => Err(err.to_string()),
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    online: OnlineFlag,
    last_drain: LastDrain,
    sync_tx: mpsc::Sender<DrainJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let run = run_dir(&home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let online = online.clone();
                let last_drain = last_drain.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        home,
                        online,
                        last_drain,
                        sync_tx,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    online: OnlineFlag,
    last_drain: LastDrain,
    sync_tx: mpsc::Sender<DrainJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_reply(
                    &mut writer,
                    &DaemonReply::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let reply = match request {
            DaemonRequest::Status => {
                match build_status_payload(&home, &online, &last_drain, started_at_unix).await {
                    Ok(payload) => DaemonReply::ok(payload),
                    Err(err) => DaemonReply::error(err.to_string()),
                }
            }
            DaemonRequest::Sync => match enqueue_drain(&sync_tx, "socket").await {
                Ok(summary) => DaemonReply::ok(json!(summary)),
                Err(err) => DaemonReply::error(err.to_string()),
            },
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                DaemonReply::ok(json!({ "stopping": true }))
            }
        };

        write_reply(&mut writer, &reply).await?;
        if request == DaemonRequest::Stop {
            break;
        }
    }

    Ok(())
}

/// The pending count is recomputed from the store on every status call so it
/// can never drift from what is actually on the device.
async fn build_status_payload(
    home: &Path,
    online: &OnlineFlag,
    last_drain: &LastDrain,
    started_at_unix: u64,
) -> Result<Value, DaemonError> {
    let home_for_count = home.to_path_buf();
    let pending = tokio::task::spawn_blocking(move || queue::pending_count_at(&home_for_count))
        .await
        .map_err(|err| DaemonError::Protocol(format!("pending count join error: {err}")))??;

    let last = last_drain.read().await.clone();

    Ok(json!({
        "running": true,
        "online": online.load(Ordering::SeqCst),
        "pending": pending,
        "started_at_unix": started_at_unix,
        "last_drain": last,
        "socket": socket_path(home).display().to_string(),
    }))
}

async fn enqueue_drain(
    sync_tx: &mpsc::Sender<DrainJob>,
    source: &'static str,
) -> Result<DrainSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(DrainJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("drain queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("drain response"))?;
    outcome.map_err(DaemonError::Protocol)
}

fn build_drain_summary(
    source: &'static str,
    outcome: DrainOutcome,
    duration: Duration,
) -> DrainSummary {
    match outcome {
        DrainOutcome::Completed(report) => report_summary(source, report, duration),
        // The processor is the only consumer, so this is unexpected; keep it
        // visible rather than inventing numbers.
        DrainOutcome::AlreadyDraining => DrainSummary {
            source: source.to_string(),
            outcome: "skipped".to_string(),
            attempted: 0,
            accepted: 0,
            network_errors: 0,
            rejected: Vec::new(),
            duration_ms: duration.as_millis(),
        },
    }
}

fn report_summary(source: &str, report: DrainReport, duration: Duration) -> DrainSummary {
    DrainSummary {
        source: source.to_string(),
        outcome: if report.succeeded() {
            "succeeded".to_string()
        } else {
            "failed".to_string()
        },
        attempted: report.attempted,
        accepted: report.accepted,
        network_errors: report.network_errors,
        rejected: report.rejected,
        duration_ms: duration.as_millis(),
    }
}

fn log_drain_summary(summary: &DrainSummary) {
    tracing::info!(
        source = %summary.source,
        outcome = %summary.outcome,
        attempted = summary.attempted,
        accepted = summary.accepted,
        network_errors = summary.network_errors,
        rejected = summary.rejected.len(),
        duration_ms = summary.duration_ms,
        "drain pass completed",
    );
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_reply(
    writer: &mut OwnedWriteHalf,
    reply: &DaemonReply,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(reply)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
