//! Structures to keep the process alive until some event occurs

use std::fmt;
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, error, warn};

/// Reason why the heart stopped beating
#[derive(Debug, Clone, PartialEq)]
pub enum DeathReason {
    /// Internal kill signal has been sent
    Killed(String),
    /// SIGINT or other process-external cause
    Terminated,
}

impl fmt::Display for DeathReason {
    fn fmt(&self, w: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeathReason::Killed(reason) => write!(w, "Killed ({})", reason),
            DeathReason::Terminated => write!(w, "Terminated due to external signal"),
        }
    }
}

/// Lifecycle management struct that can be used to keep the application alive
pub struct Heart {
    rx: Receiver<String>,
    /// Keeps the channel open when no stone has been handed out
    _stone: Option<HeartStone>,
}

impl Heart {
    /// Creates a new heart and linked stone
    pub fn new() -> (Self, HeartStone) {
        let (tx, rx) = channel(2);
        let heart = Self { rx, _stone: None };

        (heart, HeartStone { remote: tx })
    }

    /// Creates a new heart which only dies from external signals
    pub fn without_heart_stone() -> Self {
        let (mut heart, stone) = Heart::new();
        heart._stone = Some(stone);
        heart
    }

    /// Future that waits until the heart dies for the returned reason
    pub async fn death(&mut self) -> DeathReason {
        debug!("Heart starts beating");

        tokio::select! {
            reason = self.rx.recv() => match reason {
                Some(reason) => DeathReason::Killed(reason),
                None => DeathReason::Killed("all heart stones dropped".into()),
            },
            () = Heart::termination_signal() => DeathReason::Terminated,
        }
    }

    async fn termination_signal() {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = ctrl_c() => {},
                }
            }
            Err(error) => {
                warn!(%error, "Unable to listen for SIGTERM, only watching for ctrl-c");
                if let Err(error) = ctrl_c().await {
                    error!(%error, "Unable to listen for ctrl-c");
                    futures::future::pending::<()>().await;
                }
            }
        }
    }
}

/// Remote controller for the heart
#[derive(Clone)]
pub struct HeartStone {
    remote: Sender<String>,
}

impl HeartStone {
    /// Kill the associated heart
    pub async fn kill(&mut self, reason: String) {
        if let Err(e) = self.remote.send(reason).await {
            error!("Failed to interact with Heart: {}", e);
        }
    }
}
