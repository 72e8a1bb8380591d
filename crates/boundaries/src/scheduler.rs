//! Decides which fetches to start and cancel in response to boundary,
//! viewport, and visibility changes.
//!
//! The scheduler never performs I/O. Every decision comes back as a
//! [`Schedule`] naming the tickets to cancel and the queries to start; the
//! caller owns the actual fetch futures. At most one fetch per kind is live,
//! and a completion is only accepted for the live ticket.

use std::sync::Arc;

use foundation::{Extent, InvalidGeometry, Polygon, SpatialReference};
use layers::SurroundingVisibility;
use runtime::ViewportState;
use serde::{Deserialize, Serialize};
use streaming::{BoundaryQuery, DataSetKind, FetchStatus, Ticket};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerState {
    Idle,
    AwaitingStationary,
    FetchingLocal,
    FetchingSurrounding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub ticket: Ticket,
    pub kind: DataSetKind,
    pub query: BoundaryQuery,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    pub cancel: Vec<Ticket>,
    pub start: Vec<FetchPlan>,
    /// Inputs that could not be turned into a query; no fetch was started.
    pub rejected: Vec<(DataSetKind, InvalidGeometry)>,
}

impl Schedule {
    pub fn is_empty(&self) -> bool {
        self.cancel.is_empty() && self.start.is_empty() && self.rejected.is_empty()
    }

    pub fn extend(&mut self, other: Schedule) {
        self.cancel.extend(other.cancel);
        self.start.extend(other.start);
        self.rejected.extend(other.rejected);
    }
}

#[derive(Debug)]
struct LiveLocal {
    ticket: Ticket,
    boundary: Arc<Polygon>,
}

#[derive(Debug)]
pub struct UpdateScheduler {
    scale_threshold: f64,
    query_sr: SpatialReference,
    next_ticket: u64,
    boundary: Option<Arc<Polygon>>,
    live_local: Option<LiveLocal>,
    /// Last finished local fetch and the boundary it was for.
    settled_local: Option<(Arc<Polygon>, FetchStatus)>,
    rejected_boundary: Option<Arc<Polygon>>,
    live_surrounding: Option<Ticket>,
    last_surrounding_extent: Option<Arc<Extent>>,
    last_viewport: Option<ViewportState>,
}

impl UpdateScheduler {
    pub fn new(scale_threshold: f64, query_sr: SpatialReference) -> Self {
        Self {
            scale_threshold,
            query_sr,
            next_ticket: 0,
            boundary: None,
            live_local: None,
            settled_local: None,
            rejected_boundary: None,
            live_surrounding: None,
            last_surrounding_extent: None,
            last_viewport: None,
        }
    }

    pub fn boundary(&self) -> Option<&Arc<Polygon>> {
        self.boundary.as_ref()
    }

    /// Most recent stationary viewport.
    pub fn last_viewport(&self) -> Option<&ViewportState> {
        self.last_viewport.as_ref()
    }

    pub fn live_ticket(&self, kind: DataSetKind) -> Option<Ticket> {
        match kind {
            DataSetKind::Local => self.live_local.as_ref().map(|l| l.ticket),
            DataSetKind::Surrounding => self.live_surrounding,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.live_surrounding.is_some() {
            SchedulerState::FetchingSurrounding
        } else if self.live_local.is_some() {
            SchedulerState::FetchingLocal
        } else if self.boundary.is_some() {
            SchedulerState::AwaitingStationary
        } else {
            SchedulerState::Idle
        }
    }

    /// `None` when `boundary` is the one already known (same allocation).
    pub fn on_boundary(&mut self, boundary: Option<Arc<Polygon>>) -> Option<Schedule> {
        let unchanged = match (&self.boundary, &boundary) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return None;
        }

        let mut schedule = Schedule::default();
        if let Some(live) = self.live_local.take() {
            schedule.cancel.push(live.ticket);
        }
        self.settled_local = None;
        self.rejected_boundary = None;
        self.boundary = boundary;
        self.ensure_local(&mut schedule);
        Some(schedule)
    }

    pub fn on_viewport(
        &mut self,
        viewport: ViewportState,
        visibility: SurroundingVisibility,
    ) -> Schedule {
        let mut schedule = Schedule::default();
        if !viewport.stationary {
            return schedule;
        }
        let extent = Arc::clone(&viewport.extent);
        let zoomed_out = viewport.scale >= self.scale_threshold;
        self.last_viewport = Some(viewport);

        self.ensure_local(&mut schedule);
        if zoomed_out || visibility == SurroundingVisibility::Hidden {
            self.cancel_surrounding(&mut schedule);
            return schedule;
        }

        let repeat = self
            .last_surrounding_extent
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, &extent));
        if repeat {
            tracing::debug!("viewport extent unchanged; surrounding fetch skipped");
        } else {
            self.start_surrounding(extent, &mut schedule);
        }
        schedule
    }

    /// Surroundings were just shown: refresh them for the last stationary
    /// viewport, even if that extent was fetched before.
    pub fn on_shown(&mut self) -> Schedule {
        let mut schedule = Schedule::default();
        if let Some(extent) = self.last_viewport.as_ref().map(|v| Arc::clone(&v.extent)) {
            self.start_surrounding(extent, &mut schedule);
        }
        schedule
    }

    pub fn reset(&mut self) -> Schedule {
        let mut schedule = Schedule::default();
        self.cancel_surrounding(&mut schedule);
        self.last_surrounding_extent = None;
        schedule
    }

    /// Cancel everything and forget the boundary and viewport.
    pub fn unmount(&mut self) -> Schedule {
        let mut schedule = self.reset();
        if let Some(live) = self.live_local.take() {
            schedule.cancel.push(live.ticket);
        }
        self.boundary = None;
        self.settled_local = None;
        self.rejected_boundary = None;
        self.last_viewport = None;
        schedule
    }

    /// Retire `ticket`. Returns the data set its result belongs to, or `None`
    /// for a superseded ticket or a cancelled fetch.
    pub fn complete(&mut self, ticket: Ticket, status: Option<FetchStatus>) -> Option<DataSetKind> {
        if self.live_local.as_ref().is_some_and(|l| l.ticket == ticket) {
            let live = self.live_local.take()?;
            let status = status?;
            self.settled_local = Some((live.boundary, status));
            return Some(DataSetKind::Local);
        }
        if self.live_surrounding == Some(ticket) {
            self.live_surrounding = None;
            status?;
            return Some(DataSetKind::Surrounding);
        }
        None
    }

    fn issue(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    /// Start a local fetch unless one for the current boundary is live or has
    /// already succeeded. A failed one is retried.
    fn ensure_local(&mut self, schedule: &mut Schedule) {
        let Some(boundary) = self.boundary.clone() else {
            return;
        };
        if self
            .live_local
            .as_ref()
            .is_some_and(|l| Arc::ptr_eq(&l.boundary, &boundary))
        {
            return;
        }
        if self
            .settled_local
            .as_ref()
            .is_some_and(|(b, s)| Arc::ptr_eq(b, &boundary) && *s == FetchStatus::Success)
        {
            return;
        }
        if self
            .rejected_boundary
            .as_ref()
            .is_some_and(|b| Arc::ptr_eq(b, &boundary))
        {
            return;
        }

        match BoundaryQuery::local(&boundary) {
            Ok(query) => {
                let ticket = self.issue();
                self.live_local = Some(LiveLocal { ticket, boundary });
                schedule.start.push(FetchPlan {
                    ticket,
                    kind: DataSetKind::Local,
                    query,
                });
            }
            Err(e) => {
                tracing::warn!("local boundary rejected: {e}");
                self.rejected_boundary = Some(boundary);
                schedule.rejected.push((DataSetKind::Local, e));
            }
        }
    }

    fn start_surrounding(&mut self, extent: Arc<Extent>, schedule: &mut Schedule) {
        if let Some(ticket) = self.live_surrounding.take() {
            schedule.cancel.push(ticket);
        }
        let query = BoundaryQuery::viewport(&extent, self.query_sr);
        self.last_surrounding_extent = Some(extent);
        match query {
            Ok(query) => {
                let ticket = self.issue();
                self.live_surrounding = Some(ticket);
                schedule.start.push(FetchPlan {
                    ticket,
                    kind: DataSetKind::Surrounding,
                    query,
                });
            }
            Err(e) => {
                tracing::warn!("viewport extent rejected: {e}");
                schedule.rejected.push((DataSetKind::Surrounding, e));
            }
        }
    }

    /// Cancel a live surrounding fetch that nothing replaces; its extent is
    /// forgotten so the same view can be fetched again later.
    fn cancel_surrounding(&mut self, schedule: &mut Schedule) {
        if let Some(ticket) = self.live_surrounding.take() {
            schedule.cancel.push(ticket);
            self.last_surrounding_extent = None;
        }
    }
}
