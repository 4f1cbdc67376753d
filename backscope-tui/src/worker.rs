//! Background worker thread. All network I/O runs here.
//!
//! Communication with the TUI main thread is via `mpsc` channels. The worker
//! executes commands in order and never touches the session cache: it only
//! echoes the ticket back with the result, and the main thread decides
//! whether that result is still wanted.

use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use backscope_core::api::{AuthToken, BacktestApi, Credentials};
use backscope_core::model::{BacktestRecord, BacktestSummary};
use backscope_core::session::FetchTicket;
use backscope_core::summary::SummaryTicket;
use backscope_core::FetchError;

/// Commands sent from the TUI to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    Login {
        credentials: Credentials,
    },
    FetchSummaries {
        ticket: SummaryTicket,
        token: AuthToken,
    },
    FetchBacktest {
        ticket: FetchTicket,
        token: AuthToken,
    },
    Shutdown,
}

/// Responses sent from the worker back to the TUI.
#[derive(Debug)]
pub enum WorkerResponse {
    LoggedIn(Result<AuthToken, FetchError>),
    Summaries {
        ticket: SummaryTicket,
        result: Result<Vec<BacktestSummary>, FetchError>,
    },
    Backtest {
        ticket: FetchTicket,
        result: Box<Result<BacktestRecord, FetchError>>,
    },
}

/// Spawn the background worker thread.
pub fn spawn_worker(
    api: Arc<dyn BacktestApi>,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("backscope-worker".into())
        .spawn(move || worker_loop(api.as_ref(), rx, tx))
}

/// Ask the worker to stop. When `busy`, a request may be stalled on the
/// network, so the thread is left to finish on its own instead of joined.
/// Returns whether the thread was joined.
pub fn stop_worker(tx: &Sender<WorkerCommand>, handle: JoinHandle<()>, busy: bool) -> bool {
    if tx.send(WorkerCommand::Shutdown).is_err() {
        debug!("worker already gone");
    }
    if busy {
        warn!("request still in flight; not waiting for the worker");
        return false;
    }
    handle.join().is_ok()
}

fn worker_loop(api: &dyn BacktestApi, rx: Receiver<WorkerCommand>, tx: Sender<WorkerResponse>) {
    info!(backend = api.name(), "worker started");
    while let Ok(cmd) = rx.recv() {
        let Some(resp) = handle_command(api, cmd) else {
            break;
        };
        if tx.send(resp).is_err() {
            // UI side is gone.
            break;
        }
    }
    info!("worker stopped");
}

/// Execute one command. `None` means shut down.
fn handle_command(api: &dyn BacktestApi, cmd: WorkerCommand) -> Option<WorkerResponse> {
    let resp = match cmd {
        WorkerCommand::Login { credentials } => {
            debug!(user = %credentials.username, "login");
            WorkerResponse::LoggedIn(api.login(&credentials))
        }
        WorkerCommand::FetchSummaries { ticket, token } => WorkerResponse::Summaries {
            ticket,
            result: api.fetch_summaries(&token),
        },
        WorkerCommand::FetchBacktest { ticket, token } => {
            debug!(id = %ticket.id(), "fetch backtest");
            WorkerResponse::Backtest {
                ticket,
                result: Box::new(api.fetch_backtest(&token, ticket.id())),
            }
        }
        WorkerCommand::Shutdown => return None,
    };
    Some(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use backscope_core::model::BacktestId;

    /// Login blocks until the gate is opened.
    struct GatedApi {
        gate: Mutex<Receiver<()>>,
    }

    impl BacktestApi for GatedApi {
        fn name(&self) -> &str {
            "gated"
        }

        fn login(&self, _: &Credentials) -> Result<AuthToken, FetchError> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(AuthToken::new("t"))
        }

        fn fetch_summaries(&self, _: &AuthToken) -> Result<Vec<BacktestSummary>, FetchError> {
            Ok(Vec::new())
        }

        fn fetch_backtest(
            &self,
            _: &AuthToken,
            id: BacktestId,
        ) -> Result<BacktestRecord, FetchError> {
            Err(FetchError::NotFound { id })
        }
    }

    fn gated() -> (Sender<()>, Sender<WorkerCommand>, Receiver<WorkerResponse>, JoinHandle<()>) {
        let (gate_tx, gate_rx) = mpsc::channel();
        let api = Arc::new(GatedApi {
            gate: Mutex::new(gate_rx),
        });
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_worker(api, cmd_rx, resp_tx).unwrap();
        (gate_tx, cmd_tx, resp_rx, handle)
    }

    #[test]
    fn idle_worker_is_joined() {
        let (_gate, cmd_tx, _resp_rx, handle) = gated();
        assert!(stop_worker(&cmd_tx, handle, false));
    }

    #[test]
    fn busy_worker_is_not_waited_for() {
        let (gate, cmd_tx, resp_rx, handle) = gated();
        cmd_tx
            .send(WorkerCommand::Login {
                credentials: Credentials::new("analyst", "pw"),
            })
            .unwrap();

        let started = Instant::now();
        assert!(!stop_worker(&cmd_tx, handle, true));
        assert!(started.elapsed() < Duration::from_secs(1));

        // Once released, the stalled request still completes and the thread exits.
        gate.send(()).unwrap();
        let resp = resp_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(resp, WorkerResponse::LoggedIn(Ok(_))));
    }
}
