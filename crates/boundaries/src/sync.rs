use std::sync::Arc;

use foundation::Polygon;
use layers::{BoundariesToggleLayer, LayerId, LayerNode, SurroundingVisibility};
use runtime::{EventBus, ViewportState};
use serde::{Deserialize, Serialize};
use streaming::{
    DataSet, DataSetKind, FeatureRecord, FetchOutcome, FetchStatus, Ticket, difference,
};

use crate::config::SyncConfig;
use crate::scheduler::{Schedule, SchedulerState, UpdateScheduler};

/// Input to the engine core.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The resolved local boundary changed (or went away).
    Boundary(Option<Arc<Polygon>>),
    Viewport(ViewportState),
    ToggleSurrounding,
    Reset,
    Unmount,
}

/// Point-in-time view of one engine, for list/table display and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub local: DataSet,
    /// Surrounding records with local duplicates removed.
    pub surrounding: DataSet,
    pub visibility: SurroundingVisibility,
    pub surrounding_opacity: f64,
    pub scheduler: SchedulerState,
    pub layer: LayerNode,
}

/// Synchronization state for one feature type, free of I/O.
///
/// Events go in through [`handle`](Self::handle) and come back as a
/// [`Schedule`] for the driver to execute; fetch results come back through
/// [`complete`](Self::complete). Neither ever fails: bad input is logged and
/// recorded on the event bus.
#[derive(Debug)]
pub struct SyncCore {
    pub(crate) config: SyncConfig,
    pub(crate) scheduler: UpdateScheduler,
    pub(crate) layer: BoundariesToggleLayer,
    pub(crate) local: DataSet,
    /// Surrounding result as fetched, before removing local duplicates.
    pub(crate) surrounding_raw: DataSet,
    pub(crate) surrounding: DataSet,
    /// Status each data set had before its current fetch made it `Pending`.
    settled_local: FetchStatus,
    settled_surrounding: FetchStatus,
    key_fields: Vec<String>,
    pub(crate) events: EventBus,
}

impl SyncCore {
    pub fn new(layer_id: LayerId, key_fields: Vec<String>, config: SyncConfig) -> Self {
        Self {
            scheduler: UpdateScheduler::new(config.scale_threshold, config.query_sr()),
            layer: BoundariesToggleLayer::new(layer_id, config.visible_opacity),
            local: DataSet::default(),
            surrounding_raw: DataSet::default(),
            surrounding: DataSet::default(),
            settled_local: FetchStatus::Idle,
            settled_surrounding: FetchStatus::Idle,
            key_fields,
            events: EventBus::new(),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn local(&self) -> &DataSet {
        &self.local
    }

    pub fn surrounding(&self) -> &DataSet {
        &self.surrounding
    }

    pub fn layer(&self) -> &BoundariesToggleLayer {
        &self.layer
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            local: self.local.clone(),
            surrounding: self.surrounding.clone(),
            visibility: self.layer.visibility(),
            surrounding_opacity: self.layer.surrounding_opacity(),
            scheduler: self.scheduler.state(),
            layer: self.layer.tree(),
        }
    }

    pub fn handle(&mut self, event: SyncEvent) -> Schedule {
        match event {
            SyncEvent::Boundary(boundary) => self.set_boundary(boundary),
            SyncEvent::Viewport(viewport) => {
                let schedule = self
                    .scheduler
                    .on_viewport(viewport, self.layer.visibility());
                self.begin(&schedule);
                schedule
            }
            SyncEvent::ToggleSurrounding => self.toggle_surrounding(),
            SyncEvent::Reset => self.reset(),
            SyncEvent::Unmount => self.unmount(),
        }
    }

    /// Apply the outcome of `ticket`. Returns `true` when it changed a data
    /// set; superseded tickets and cancellations are discarded.
    pub fn complete(&mut self, ticket: Ticket, outcome: FetchOutcome) -> bool {
        let status = match &outcome {
            FetchOutcome::Completed(result) => Some(result.status),
            FetchOutcome::Cancelled => None,
        };
        let kind = self.scheduler.complete(ticket, status);
        let (Some(kind), FetchOutcome::Completed(result)) = (kind, outcome) else {
            tracing::debug!(%ticket, "stale or cancelled fetch discarded");
            self.events.emit("fetch-discard", ticket.to_string());
            self.settle_orphaned();
            return false;
        };

        tracing::debug!(
            %ticket,
            kind = kind.as_str(),
            status = ?result.status,
            records = result.len(),
            "fetch applied"
        );
        self.events.emit(
            "fetch-apply",
            format!("{ticket} {} {:?} {}", kind.as_str(), result.status, result.len()),
        );
        match kind {
            DataSetKind::Local => self.local.merge(result),
            DataSetKind::Surrounding => self.surrounding_raw.merge(result),
        }
        self.recompose();
        true
    }

    fn set_boundary(&mut self, boundary: Option<Arc<Polygon>>) -> Schedule {
        let Some(schedule) = self.scheduler.on_boundary(boundary.clone()) else {
            return Schedule::default();
        };
        // A rejected boundary leaves the previous mask in place so the
        // records it kept stay drawn.
        let rejected = schedule
            .rejected
            .iter()
            .any(|(kind, _)| *kind == DataSetKind::Local);
        if !rejected {
            self.layer
                .set_always_visible_boundary(boundary.as_deref().cloned());
        }
        if boundary.is_none() {
            tracing::info!("local boundary removed");
            self.local = DataSet::success(Vec::new());
            self.recompose();
        }
        self.begin(&schedule);
        schedule
    }

    /// Record what `schedule` does: cancelled tickets, data sets entering
    /// `Pending`, rejected geometry.
    ///
    /// Rejected input marks its data set `Failure` with records retained. A
    /// data set whose fetch was cancelled with no replacement returns to the
    /// status it had before.
    pub(crate) fn begin(&mut self, schedule: &Schedule) {
        for ticket in &schedule.cancel {
            tracing::debug!(%ticket, "fetch cancelled");
            self.events.emit("fetch-cancel", ticket.to_string());
        }
        for plan in &schedule.start {
            tracing::debug!(ticket = %plan.ticket, kind = plan.kind.as_str(), "fetch scheduled");
            self.events
                .emit("fetch-start", format!("{} {}", plan.ticket, plan.kind.as_str()));
            match plan.kind {
                DataSetKind::Local => {
                    if self.local.status != FetchStatus::Pending {
                        self.settled_local = self.local.status;
                    }
                    self.local.mark_pending();
                }
                DataSetKind::Surrounding => {
                    if self.surrounding_raw.status != FetchStatus::Pending {
                        self.settled_surrounding = self.surrounding_raw.status;
                    }
                    self.surrounding_raw.mark_pending();
                    self.surrounding.mark_pending();
                }
            }
        }
        for (kind, err) in &schedule.rejected {
            self.events
                .emit("geometry-rejected", format!("{} {err}", kind.as_str()));
            match kind {
                DataSetKind::Local => self.local.status = FetchStatus::Failure,
                DataSetKind::Surrounding => {
                    self.surrounding_raw.status = FetchStatus::Failure;
                    self.surrounding.status = FetchStatus::Failure;
                }
            }
        }
        self.settle_orphaned();
    }

    /// `Pending` only holds while a fetch for that data set is live.
    fn settle_orphaned(&mut self) {
        if self.local.status == FetchStatus::Pending
            && self.scheduler.live_ticket(DataSetKind::Local).is_none()
        {
            tracing::debug!(
                status = ?self.settled_local,
                "local fetch cancelled without replacement"
            );
            self.local.status = self.settled_local;
        }
        if self.surrounding_raw.status == FetchStatus::Pending
            && self.scheduler.live_ticket(DataSetKind::Surrounding).is_none()
        {
            tracing::debug!(
                status = ?self.settled_surrounding,
                "surrounding fetch cancelled without replacement"
            );
            self.surrounding_raw.status = self.settled_surrounding;
            self.surrounding.status = self.settled_surrounding;
        }
    }

    /// Re-derive the deduplicated surrounding set and push everything into
    /// the feature layer.
    pub(crate) fn recompose(&mut self) {
        let records = difference(
            &self.surrounding_raw.records,
            &self.local.records,
            &self.key_fields,
        );
        self.surrounding = DataSet {
            status: self.surrounding_raw.status,
            records,
        };

        let mut all: Vec<FeatureRecord> =
            Vec::with_capacity(self.local.len() + self.surrounding.len());
        all.extend(self.local.records.iter().cloned());
        all.extend(self.surrounding.records.iter().cloned());
        if self.layer.apply_records(all) {
            self.events.emit(
                "layer-update",
                format!("{}", self.layer.features().revision()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncCore, SyncEvent};
    use crate::config::SyncConfig;
    use crate::scheduler::SchedulerState;
    use foundation::{Extent, Geometry, Point, Polygon, SpatialReference};
    use layers::LayerId;
    use pretty_assertions::assert_eq;
    use runtime::ViewportState;
    use std::sync::Arc;
    use streaming::{Attributes, DataSet, FeatureRecord, FetchOutcome, FetchStatus, Scalar};

    const SR: SpatialReference = SpatialReference::WEB_MERCATOR;

    fn core() -> SyncCore {
        SyncCore::new(LayerId::new("t"), vec!["id".into()], SyncConfig::default())
    }

    fn rec(id: i64) -> FeatureRecord {
        let mut attributes = Attributes::new();
        attributes.insert("id".into(), Scalar::Int(id));
        FeatureRecord::new(
            id.to_string(),
            Geometry::Point(Point::new(id as f64, 1.0, SR)),
            attributes,
        )
    }

    fn keys(ds: &DataSet) -> Vec<&str> {
        ds.identity_keys().collect()
    }

    fn boundary() -> Arc<Polygon> {
        Arc::new(Polygon::new(
            vec![vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]],
            SR,
        ))
    }

    #[test]
    fn local_populates_without_viewport() {
        let mut c = core();
        assert_eq!(c.local().status, FetchStatus::Idle);
        let s = c.handle(SyncEvent::Boundary(Some(boundary())));
        assert_eq!(c.local().status, FetchStatus::Pending);
        assert!(c.complete(
            s.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(1), rec(2)]))
        ));
        assert_eq!(c.local().status, FetchStatus::Success);
        assert_eq!(c.layer().features().len(), 2);
        assert_eq!(c.scheduler_state(), SchedulerState::AwaitingStationary);
    }

    #[test]
    fn late_local_result_still_dedups_surrounding() {
        let mut c = core();
        let local = c.handle(SyncEvent::Boundary(Some(boundary())));
        c.handle(SyncEvent::ToggleSurrounding);
        let vp = ViewportState::new(Extent::new(-5.0, -5.0, 20.0, 20.0, SR), 1_000.0, true);
        let surrounding = c.handle(SyncEvent::Viewport(vp));

        c.complete(
            surrounding.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(2), rec(3)])),
        );
        assert_eq!(keys(c.surrounding()), vec!["2", "3"]);

        c.complete(
            local.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(1), rec(2)])),
        );
        assert_eq!(keys(c.surrounding()), vec!["3"]);
        assert_eq!(c.layer().features().len(), 3);
    }

    #[test]
    fn failure_keeps_previous_records() {
        let mut c = core();
        let b = boundary();
        let s = c.handle(SyncEvent::Boundary(Some(Arc::clone(&b))));
        c.complete(
            s.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(1)])),
        );

        // A new boundary whose fetch fails: old records stay displayed.
        let s = c.handle(SyncEvent::Boundary(Some(boundary())));
        assert!(c.complete(s.start[0].ticket, FetchOutcome::Completed(DataSet::failure())));
        assert_eq!(c.local().status, FetchStatus::Failure);
        assert_eq!(keys(c.local()), vec!["1"]);
        assert_eq!(c.layer().features().len(), 1);
    }

    #[test]
    fn removed_boundary_empties_local() {
        let mut c = core();
        let s = c.handle(SyncEvent::Boundary(Some(boundary())));
        let cleared = c.handle(SyncEvent::Boundary(None));
        assert_eq!(cleared.cancel, vec![s.start[0].ticket]);
        assert_eq!(c.local(), &DataSet::success(vec![]));
        assert!(c.layer().boundary().is_none());
        assert!(!c.complete(
            s.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(1)]))
        ));
        assert_eq!(c.events().count("fetch-discard"), 1);
    }

    #[test]
    fn zooming_out_returns_surrounding_to_its_settled_status() {
        let mut c = core();
        c.handle(SyncEvent::ToggleSurrounding);
        let near = |x: f64, scale: f64| {
            ViewportState::new(Extent::new(x, 0.0, x + 50.0, 50.0, SR), scale, true)
        };

        let first = c.handle(SyncEvent::Viewport(near(0.0, 1_000.0)));
        assert_eq!(c.surrounding().status, FetchStatus::Pending);
        let out = c.handle(SyncEvent::Viewport(near(10.0, 1_000_000.0)));
        assert_eq!(out.cancel, vec![first.start[0].ticket]);
        assert_eq!(c.surrounding().status, FetchStatus::Idle);
        assert!(!c.complete(first.start[0].ticket, FetchOutcome::Cancelled));
        assert_eq!(c.surrounding().status, FetchStatus::Idle);
        assert_eq!(c.scheduler_state(), SchedulerState::Idle);

        let second = c.handle(SyncEvent::Viewport(near(20.0, 1_000.0)));
        c.complete(
            second.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(3)])),
        );
        let third = c.handle(SyncEvent::Viewport(near(30.0, 1_000.0)));
        assert_eq!(c.surrounding().status, FetchStatus::Pending);
        c.handle(SyncEvent::Viewport(near(40.0, 1_000_000.0)));
        assert!(!c.complete(third.start[0].ticket, FetchOutcome::Cancelled));
        assert_eq!(c.surrounding().status, FetchStatus::Success);
        assert_eq!(keys(c.surrounding()), vec!["3"]);
    }

    #[test]
    fn rejected_boundary_keeps_previous_mask_and_records() {
        let mut c = core();
        let s = c.handle(SyncEvent::Boundary(Some(boundary())));
        c.complete(
            s.start[0].ticket,
            FetchOutcome::Completed(DataSet::success(vec![rec(5)])),
        );
        let visible = |c: &SyncCore| -> Vec<String> {
            c.layer()
                .visible_records()
                .iter()
                .map(|r| r.identity_key.clone())
                .collect()
        };
        assert_eq!(visible(&c), vec!["5"]);

        let degenerate = Arc::new(Polygon::new(vec![vec![[0.0, 0.0], [1.0, 1.0]]], SR));
        let out = c.handle(SyncEvent::Boundary(Some(degenerate)));
        assert_eq!(out.rejected.len(), 1);
        assert!(out.start.is_empty());
        assert_eq!(c.layer().boundary(), Some(&*boundary()));
        assert_eq!(visible(&c), vec!["5"]);
        assert_eq!(c.local().status, FetchStatus::Failure);
        assert_eq!(keys(c.local()), vec!["5"]);
    }

    #[test]
    fn rejected_boundary_while_fetching_does_not_stay_pending() {
        let mut c = core();
        c.handle(SyncEvent::Boundary(Some(boundary())));
        assert_eq!(c.local().status, FetchStatus::Pending);
        let degenerate = Arc::new(Polygon::new(vec![vec![[0.0, 0.0], [1.0, 1.0]]], SR));
        let out = c.handle(SyncEvent::Boundary(Some(degenerate)));
        assert_eq!(out.cancel.len(), 1);
        assert_eq!(c.local().status, FetchStatus::Failure);
        assert_eq!(c.scheduler_state(), SchedulerState::AwaitingStationary);
    }

    #[test]
    fn cancelled_outcome_changes_nothing() {
        let mut c = core();
        let s = c.handle(SyncEvent::Boundary(Some(boundary())));
        let before = c.snapshot();
        c.handle(SyncEvent::Boundary(Some(boundary())));
        assert!(!c.complete(s.start[0].ticket, FetchOutcome::Cancelled));
        assert_eq!(c.snapshot().local, before.local);
    }
}
