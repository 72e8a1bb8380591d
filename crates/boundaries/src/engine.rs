use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::Polygon;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use layers::LayerId;
use runtime::{CancelToken, ViewportWatch};
use streaming::{BoxFuture, FeatureSource, FetchOutcome, FetchPipeline, RecordMapper, Ticket};
use tokio::sync::{mpsc, watch};

use crate::config::SyncConfig;
use crate::scheduler::Schedule;
use crate::sync::{SyncCore, SyncEvent, SyncSnapshot};

/// User action delivered to a running engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleSurrounding,
    Reset,
    Unmount,
}

impl From<Command> for SyncEvent {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::ToggleSurrounding => SyncEvent::ToggleSurrounding,
            Command::Reset => SyncEvent::Reset,
            Command::Unmount => SyncEvent::Unmount,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineClosed;

impl std::fmt::Display for EngineClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("sync engine is no longer running")
    }
}

impl std::error::Error for EngineClosed {}

/// Caller side of a running engine: commands in, snapshots out.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SyncSnapshot>,
}

impl SyncHandle {
    pub fn send(&self, command: Command) -> Result<(), EngineClosed> {
        self.commands.send(command).map_err(|_| EngineClosed)
    }

    pub fn toggle_surrounding(&self) -> Result<(), EngineClosed> {
        self.send(Command::ToggleSurrounding)
    }

    pub fn reset(&self) -> Result<(), EngineClosed> {
        self.send(Command::Reset)
    }

    pub fn unmount(&self) -> Result<(), EngineClosed> {
        self.send(Command::Unmount)
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshots.clone()
    }
}

/// Engine side of the channels created by [`SyncEngine::controls`].
#[derive(Debug)]
pub struct SyncControls {
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<SyncSnapshot>,
}

type InFlight = FuturesUnordered<BoxFuture<'static, (Ticket, FetchOutcome)>>;

/// Async driver for one feature type.
///
/// Fetch futures are polled from the engine's own task through a
/// `FuturesUnordered`; nothing is spawned. Cancelling a ticket fires its
/// token, which makes the pipeline drop the request.
pub struct SyncEngine<S: ?Sized, M: ?Sized> {
    core: SyncCore,
    pipeline: FetchPipeline<S, M>,
    in_flight: InFlight,
    tokens: BTreeMap<Ticket, CancelToken>,
}

enum Step {
    Completed(Ticket, FetchOutcome),
    Viewport(Option<runtime::ViewportState>),
    BoundaryChanged(bool),
    Command(Option<Command>),
}

impl<S, M> SyncEngine<S, M>
where
    S: FeatureSource + ?Sized + 'static,
    M: RecordMapper + ?Sized + 'static,
{
    pub fn new(layer_id: LayerId, config: SyncConfig, pipeline: FetchPipeline<S, M>) -> Self {
        let key_fields = pipeline.mapper().key_fields().to_vec();
        Self {
            core: SyncCore::new(layer_id, key_fields, config),
            pipeline,
            in_flight: FuturesUnordered::new(),
            tokens: BTreeMap::new(),
        }
    }

    pub fn core(&self) -> &SyncCore {
        &self.core
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.core.snapshot()
    }

    /// Fetches started and not yet collected, including cancelled ones that
    /// have not resolved yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn controls(&self) -> (SyncHandle, SyncControls) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snap_tx, snap_rx) = watch::channel(self.core.snapshot());
        (
            SyncHandle {
                commands: cmd_tx,
                snapshots: snap_rx,
            },
            SyncControls {
                commands: cmd_rx,
                snapshots: snap_tx,
            },
        )
    }

    pub fn handle(&mut self, event: SyncEvent) {
        let schedule = self.core.handle(event);
        self.dispatch(schedule);
    }

    fn dispatch(&mut self, schedule: Schedule) {
        for ticket in schedule.cancel {
            if let Some(token) = self.tokens.remove(&ticket) {
                token.cancel();
            }
        }
        for plan in schedule.start {
            let token = CancelToken::new();
            let fetch = self.pipeline.fetch(&plan.query, &token);
            let ticket = plan.ticket;
            self.tokens.insert(ticket, token);
            self.in_flight
                .push(Box::pin(async move { (ticket, fetch.await) }));
        }
    }

    fn collect(&mut self, ticket: Ticket, outcome: FetchOutcome) -> bool {
        self.tokens.remove(&ticket);
        self.core.complete(ticket, outcome)
    }

    /// Wait for the next fetch to resolve and apply it. `None` when nothing
    /// is in flight.
    pub async fn next_completion(&mut self) -> Option<(Ticket, bool)> {
        let (ticket, outcome) = self.in_flight.next().await?;
        let applied = self.collect(ticket, outcome);
        Some((ticket, applied))
    }

    /// Drive every in-flight fetch to completion.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    /// Event loop: reacts to stationary viewports, boundary changes and
    /// commands, publishing a snapshot after each step.
    ///
    /// Returns the final core after an `Unmount` command or once every
    /// [`SyncHandle`] is dropped.
    pub async fn run(
        mut self,
        mut viewport: ViewportWatch,
        mut boundary: watch::Receiver<Option<Arc<Polygon>>>,
        mut controls: SyncControls,
    ) -> SyncCore {
        let initial = boundary.borrow_and_update().clone();
        if initial.is_some() {
            self.handle(SyncEvent::Boundary(initial));
        }
        if let Some(current) = viewport.current().filter(|v| v.stationary) {
            self.handle(SyncEvent::Viewport(current));
        }
        controls.snapshots.send_replace(self.core.snapshot());

        let mut viewport_open = true;
        let mut boundary_open = true;
        loop {
            let step = tokio::select! {
                Some((ticket, outcome)) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    Step::Completed(ticket, outcome)
                }
                vp = viewport.next_stationary(), if viewport_open => Step::Viewport(vp),
                changed = boundary.changed(), if boundary_open => {
                    Step::BoundaryChanged(changed.is_ok())
                }
                cmd = controls.commands.recv() => Step::Command(cmd),
            };

            let mut stop = false;
            match step {
                Step::Completed(ticket, outcome) => {
                    self.collect(ticket, outcome);
                }
                Step::Viewport(Some(vp)) => self.handle(SyncEvent::Viewport(vp)),
                Step::Viewport(None) => {
                    tracing::debug!("viewport publisher closed");
                    viewport_open = false;
                }
                Step::BoundaryChanged(true) => {
                    let current = boundary.borrow_and_update().clone();
                    self.handle(SyncEvent::Boundary(current));
                }
                Step::BoundaryChanged(false) => {
                    tracing::debug!("boundary provider closed");
                    boundary_open = false;
                }
                Step::Command(Some(cmd)) => {
                    stop = cmd == Command::Unmount;
                    self.handle(cmd.into());
                }
                Step::Command(None) => stop = true,
            }

            controls.snapshots.send_replace(self.core.snapshot());
            if stop {
                tracing::info!("sync engine stopped");
                return self.core;
            }
        }
    }
}
