//! Listening socket, accept loop and liveness sweep.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                 Listener                   │
//! │  accept loop ──spawn──► JoinSet<Session>   │
//! │  sweep task  ──every sweep_interval──►     │
//! │               Registry::sweep_stale        │
//! │  shutdown: watch<bool> (all tasks)         │
//! └────────────────────────────────────────────┘
//! ```
//!
//! [`Listener::shutdown`] flips the watch channel, waits for every session
//! task to finish and drops the socket before returning.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::PlayerId;

use super::session::{Session, SessionContext};

// ============================================================================
// SweepSettings
// ============================================================================

/// Liveness sweep timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepSettings {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Silence after which a session is evicted.
    pub liveness_timeout: Duration,
}

// ============================================================================
// Listener
// ============================================================================

/// A bound listener with its background tasks.
pub(crate) struct Listener {
    port: u16,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
}

impl Listener {
    /// Binds `ip:port` and starts accepting.
    ///
    /// # Errors
    ///
    /// - [`Error::PortInUse`] if the address is taken
    /// - [`Error::Io`] for other bind failures
    pub(crate) async fn bind(
        ip: IpAddr,
        port: u16,
        ctx: Arc<SessionContext>,
        sweep: SweepSettings,
    ) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::bind(port, e))?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "WebSocket server bound");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&ctx),
            shutdown_rx.clone(),
        ));
        let sweep_task = tokio::spawn(sweep_loop(ctx, sweep, shutdown_rx));

        info!(port = actual_port, "Listener started");

        Ok(Self {
            port: actual_port,
            shutdown_tx,
            accept_task,
            sweep_task,
        })
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Stops accepting, closes every session and waits for them.
    pub(crate) async fn shutdown(self) {
        info!(port = self.port, "Listener shutting down");
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.accept_task.await {
            error!(error = %e, "Accept loop panicked");
        }
        if let Err(e) = self.sweep_task.await {
            error!(error = %e, "Sweep task panicked");
        }

        info!(port = self.port, "Listener shutdown complete");
    }
}

// ============================================================================
// Background Tasks
// ============================================================================

/// Accepts connections until shutdown, then drains every session.
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Accept loop started");
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Accept loop shutting down");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => spawn_session(&mut sessions, stream, addr, &ctx, &shutdown),
                Err(e) => warn!(error = %e, "Accept failed"),
            },

            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Session task panicked");
                }
            }
        }
    }

    // release the port before waiting on sessions
    drop(listener);

    while let Some(joined) = sessions.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Session task panicked");
        }
    }

    // sessions that died without unregistering
    for id in ctx.registry.ids() {
        ctx.registry.unregister(id);
    }

    debug!("Accept loop terminated");
}

fn spawn_session(
    sessions: &mut JoinSet<()>,
    stream: TcpStream,
    addr: SocketAddr,
    ctx: &Arc<SessionContext>,
    shutdown: &watch::Receiver<bool>,
) {
    let id = PlayerId::next();
    debug!(player_id = %id, %addr, "New TCP connection");

    let session = Session::new(id, addr, Arc::clone(ctx));
    sessions.spawn(session.run(stream, shutdown.clone()));
}

/// Periodically evicts silent sessions and re-evaluates the active player.
async fn sweep_loop(
    ctx: Arc<SessionContext>,
    sweep: SweepSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(sweep.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            _ = ticker.tick() => {
                let evicted = ctx.registry.sweep_stale(Instant::now(), sweep.liveness_timeout);
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "Liveness sweep evicted players");
                }
                ctx.registry.refresh_active();
            }
        }
    }

    debug!("Sweep task terminated");
}
