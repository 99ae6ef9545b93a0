//! Replication layer for the combat server.
//!
//! Combatants publish events without ever blocking the simulation. A
//! background task encodes every event and fans the frames out to all
//! subscribed observers (renderer, UI popups, remote clients).

use std::sync::{Mutex, PoisonError};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use skirmish_shared::CombatEvent;

/// Receiver of combat events
pub trait EventSink: Send + Sync {
    fn publish(&self, event: CombatEvent);
}

/// Commands sent to the replication background task
#[derive(Debug)]
pub enum ReplicationCommand {
    /// Encode an event and forward it to observers
    Publish(CombatEvent),
    /// Log how much has been replicated so far
    Flush,
    /// Stop the replication task
    Shutdown,
}

/// Handle for sending events to the replication task
#[derive(Clone)]
pub struct ReplicationHandle {
    sender: mpsc::Sender<ReplicationCommand>,
}

impl ReplicationHandle {
    /// Request a progress report
    pub fn flush(&self) {
        let _ = self.sender.try_send(ReplicationCommand::Flush);
    }

    /// Stop the task once everything queued before this call is replicated
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ReplicationCommand::Shutdown).await;
    }
}

impl EventSink for ReplicationHandle {
    /// Never blocks a tick. When the queue is full, lifecycle events are
    /// handed to a task that waits for room; anything else is dropped.
    fn publish(&self, event: CombatEvent) {
        let cmd = match self.sender.try_send(ReplicationCommand::Publish(event)) {
            Ok(()) => return,
            Err(TrySendError::Closed(_)) => {
                warn!("Dropped replication event: replication task stopped");
                return;
            }
            Err(TrySendError::Full(cmd)) => cmd,
        };

        let lifecycle = matches!(&cmd, ReplicationCommand::Publish(event) if event.is_lifecycle());
        match Handle::try_current() {
            Ok(runtime) if lifecycle => {
                let sender = self.sender.clone();
                runtime.spawn(async move {
                    if sender.send(cmd).await.is_err() {
                        warn!("Dropped lifecycle event: replication task stopped");
                    }
                });
            }
            _ => warn!("Dropped replication event: queue full"),
        }
    }
}

/// A started replication task
pub struct Replication {
    pub handle: ReplicationHandle,
    /// Encoded events. Use `resubscribe()` for additional observers.
    pub frames: broadcast::Receiver<Vec<u8>>,
    pub task: JoinHandle<()>,
}

/// Spawn the replication task with room for `buffer` queued events
pub fn init(buffer: usize) -> Replication {
    let buffer = buffer.max(1);
    let (tx, rx) = mpsc::channel(buffer);
    let (frames_tx, frames) = broadcast::channel(buffer);

    let task = tokio::spawn(replication_task(rx, frames_tx));
    info!("Replication background task started");

    Replication {
        handle: ReplicationHandle { sender: tx },
        frames,
        task,
    }
}

/// Background task that encodes and broadcasts events
async fn replication_task(
    mut rx: mpsc::Receiver<ReplicationCommand>,
    frames: broadcast::Sender<Vec<u8>>,
) {
    info!("Replication task running");
    let mut replicated: u64 = 0;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            ReplicationCommand::Publish(event) => match event.serialize() {
                Ok(frame) => {
                    debug!(
                        "Replicating event for entity {} ({} bytes)",
                        event.entity_id(),
                        frame.len()
                    );
                    replicated += 1;
                    // No observers is not an error
                    let _ = frames.send(frame);
                }
                Err(e) => {
                    error!("Failed to encode event for entity {}: {}", event.entity_id(), e);
                }
            },

            ReplicationCommand::Flush => {
                info!("{} events replicated so far", replicated);
            }

            ReplicationCommand::Shutdown => {
                info!("Replication task shutting down");
                break;
            }
        }
    }

    info!("Replication task stopped after {} events", replicated);
}

/// In-process sink that keeps every event, for embedding without a task
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CombatEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<CombatEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drain(&self) -> Vec<CombatEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: CombatEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
