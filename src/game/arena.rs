//! Arena task: the fixed-rate authoritative tick loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_duration, unix_millis, Timer};

use super::snapshot::SnapshotBuilder;
use super::world::{TickReport, World};
use super::{CommandKind, PlayerCommand};

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub command_tx: mpsc::Sender<PlayerCommand>,
    pub snapshot_tx: broadcast::Sender<Arc<str>>,
    pub player_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    /// Number of players in the live set as of the last tick
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.snapshot_tx.subscribe()
    }

    /// Queue a command for the next tick. Returns false once the arena has stopped.
    pub async fn send(&self, player_id: Uuid, kind: CommandKind) -> bool {
        let command = PlayerCommand {
            player_id,
            kind,
            received_at: unix_millis(),
        };
        self.command_tx.send(command).await.is_ok()
    }
}

/// The authoritative arena
pub struct Arena {
    world: World,
    command_rx: mpsc::Receiver<PlayerCommand>,
    snapshot_tx: broadcast::Sender<Arc<str>>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
}

impl Arena {
    pub fn new(world: World) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let arena = Self {
            world,
            command_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(),
            player_count,
        };

        (arena, handle)
    }

    /// Run the tick loop until every handle has been dropped
    pub async fn run(mut self) {
        info!(tick_micros = tick_duration().as_micros() as u64, "Arena started");

        let mut tick_interval = interval(tick_duration());
        // Late ticks are dropped, never replayed in a burst
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                break;
            }

            let timer = Timer::new();
            self.step();

            let elapsed = timer.elapsed();
            if elapsed > tick_duration() {
                warn!(
                    tick = self.world.tick_count(),
                    elapsed_micros = elapsed.as_micros() as u64,
                    "Tick overran its budget"
                );
            }
        }

        let stats = self.snapshot_builder.stats();
        info!(
            ticks = self.world.tick_count(),
            snapshots = stats.total_snapshots,
            bytes = stats.total_bytes,
            "Arena stopped"
        );
    }

    /// Advance the world one tick and broadcast the resulting snapshot
    pub fn step(&mut self) -> TickReport {
        let report = self.world.tick();
        log_report(&report);
        self.player_count
            .store(self.world.players().len(), Ordering::Relaxed);

        match self.snapshot_builder.encode(&self.world) {
            Ok(json) => {
                // No receivers is fine
                let _ = self.snapshot_tx.send(json);
            }
            Err(e) => warn!(error = %e, "Failed to encode snapshot"),
        }
        report
    }

    /// Apply every queued command. Returns false when all senders are gone.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: PlayerCommand) {
        let id = command.player_id;
        let queued_ms = command.age_ms(unix_millis());
        match command.kind {
            CommandKind::Connect => self.world.connect(id),
            CommandKind::Disconnect => {
                self.world.disconnect(id);
            }
            CommandKind::Join { name } => self.world.set_name(id, name),
            CommandKind::Input { orientation, keys } => {
                self.world.apply_input(id, orientation, keys);
            }
            CommandKind::Shoot => {
                if let Err(e) = self.world.fire(id) {
                    debug!(player_id = %id, reason = %e, queued_ms, "Shot refused");
                }
            }
            CommandKind::Reload => {
                if !self.world.reload(id) {
                    debug!(player_id = %id, queued_ms, "Reload refused");
                }
            }
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}

/// Per-tick events not already logged by the world
fn log_report(report: &TickReport) {
    for hit in &report.hits {
        debug!(
            tick = report.tick,
            shooter_id = %hit.shooter_id,
            target_id = %hit.target_id,
            damage = hit.damage,
            position = ?hit.position,
            "Projectile hit"
        );
    }
    for id in &report.reloads_completed {
        debug!(tick = report.tick, player_id = %id, "Reload complete");
    }
    for (pickup_id, healed) in &report.pickups_claimed {
        info!(tick = report.tick, pickup_id = %pickup_id, healed = healed.len(), "Pickup claimed");
    }
    if !report.respawned.is_empty() {
        debug!(tick = report.tick, count = report.respawned.len(), "Respawn sweep");
    }
}
