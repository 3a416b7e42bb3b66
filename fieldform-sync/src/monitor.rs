//! Connectivity tracking.
//!
//! The platform feeds connectivity callbacks into `report`; everything else
//! observes through listeners. A listener sees the current state the moment
//! it subscribes, and an Offline→Online transition wakes it exactly once —
//! repeated Online reports from a polling platform signal are absorbed.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Device connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Online,
    Offline,
}

impl ConnectionState {
    /// Whether this state allows network calls.
    #[must_use]
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Connectivity state shared between the platform callback and listeners.
#[derive(Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl NetworkMonitor {
    /// Creates a monitor with the given initial state. Mobile apps start
    /// `Offline` and let the first platform callback correct it.
    #[must_use]
    pub fn new(initial: ConnectionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Feeds a platform connectivity signal. Returns whether the state
    /// actually changed; duplicate reports notify nobody.
    pub fn report(&self, state: ConnectionState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            info!(?state, "connectivity changed");
        }
        changed
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Whether the device is currently online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Registers a listener. Dropping the handle unregisters it.
    #[must_use]
    pub fn subscribe(&self) -> NetworkListener {
        NetworkListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// A registered connectivity listener.
pub struct NetworkListener {
    rx: watch::Receiver<ConnectionState>,
}

impl NetworkListener {
    /// The current state — available immediately on subscription, no
    /// transition required.
    #[must_use]
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    /// Waits for the next state transition and returns the new state.
    pub async fn next_transition(&mut self) -> SyncResult<ConnectionState> {
        self.rx
            .changed()
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Waits until the device transitions to `Online`.
    ///
    /// Fires once per Offline→Online edge: rapid flaps that settle back
    /// Offline before this task wakes are not reconnects.
    pub async fn reconnected(&mut self) -> SyncResult<()> {
        loop {
            if self.next_transition().await?.is_online() {
                return Ok(());
            }
        }
    }
}
