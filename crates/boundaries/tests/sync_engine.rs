use std::sync::Arc;
use std::time::Duration;

use boundaries::{SchedulerState, SyncConfig, SyncEngine, SyncEvent};
use foundation::{Extent, Polygon, SpatialReference};
use layers::{LayerId, LayerNode, SurroundingVisibility};
use pretty_assertions::assert_eq;
use runtime::{ViewportState, viewport_channel};
use serde_json::{Value, json};
use streaming::{
    DataSet, FetchError, FetchOutcome, FetchPipeline, FetchStatus, FieldMapper,
    MemoryFeatureSource,
};
use tokio::sync::watch;

const SR: SpatialReference = SpatialReference::WEB_MERCATOR;

fn point(id: i64, x: f64, y: f64) -> Value {
    json!({ "attributes": { "id": id }, "geometry": { "x": x, "y": y } })
}

/// Ids 1 and 2 sit inside the boundary; 2 and 3 inside the viewport.
fn source() -> Arc<MemoryFeatureSource> {
    Arc::new(MemoryFeatureSource::new("waterbodies", SR).with_features(vec![
        point(1, 2.0, 2.0),
        point(2, 8.0, 8.0),
        point(3, 20.0, 20.0),
    ]))
}

fn boundary() -> Arc<Polygon> {
    Arc::new(Polygon::new(
        vec![vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]],
        SR,
    ))
}

fn viewport_extent() -> Extent {
    Extent::new(5.0, 5.0, 30.0, 30.0, SR)
}

fn engine(src: &Arc<MemoryFeatureSource>) -> SyncEngine<MemoryFeatureSource, FieldMapper> {
    let pipeline = FetchPipeline::new(Arc::clone(src), Arc::new(FieldMapper::new("id")));
    SyncEngine::new(LayerId::new("waterbodies"), SyncConfig::default(), pipeline)
}

fn keys(ds: &DataSet) -> Vec<String> {
    ds.identity_keys().map(str::to_string).collect()
}

fn feature_count(layer: &LayerNode) -> usize {
    match layer.find("waterbodies-features") {
        Some(LayerNode::Features { feature_count, .. }) => *feature_count,
        other => panic!("expected feature layer, got {other:?}"),
    }
}

#[tokio::test]
async fn local_and_surrounding_never_duplicate() {
    let src = source();
    let mut e = engine(&src);

    e.handle(SyncEvent::Boundary(Some(boundary())));
    e.settle().await;
    assert_eq!(keys(e.core().local()), vec!["1", "2"]);

    e.handle(SyncEvent::ToggleSurrounding);
    e.handle(SyncEvent::Viewport(ViewportState::new(
        viewport_extent(),
        10_000.0,
        true,
    )));
    e.settle().await;

    let snapshot = e.snapshot();
    assert_eq!(keys(&snapshot.surrounding), vec!["3"]);
    assert_eq!(snapshot.surrounding.status, FetchStatus::Success);
    assert_eq!(feature_count(&snapshot.layer), 3);
    assert_eq!(snapshot.visibility, SurroundingVisibility::Shown);
}

#[tokio::test]
async fn local_populates_before_any_stationary_event() {
    let src = source();
    let mut e = engine(&src);
    assert_eq!(e.core().local().status, FetchStatus::Idle);

    // A moving viewport is ignored.
    e.handle(SyncEvent::Viewport(ViewportState::new(
        viewport_extent(),
        10_000.0,
        false,
    )));
    e.handle(SyncEvent::Boundary(Some(boundary())));
    assert_eq!(e.core().local().status, FetchStatus::Pending);
    assert_eq!(e.core().scheduler_state(), SchedulerState::FetchingLocal);

    e.settle().await;
    assert_eq!(e.core().local().status, FetchStatus::Success);
    assert_eq!(src.request_count(), 1);
}

#[tokio::test]
async fn unchanged_extent_fetches_once() {
    let src = source();
    let mut e = engine(&src);
    e.handle(SyncEvent::ToggleSurrounding);

    let vp = ViewportState::new(viewport_extent(), 10_000.0, true);
    e.handle(SyncEvent::Viewport(vp.clone()));
    e.settle().await;
    e.handle(SyncEvent::Viewport(vp));
    e.settle().await;

    assert_eq!(src.request_count(), 1);
}

#[tokio::test]
async fn zoomed_out_views_never_query_the_viewport() {
    let src = source();
    let mut e = engine(&src);
    e.handle(SyncEvent::Boundary(Some(boundary())));
    e.handle(SyncEvent::ToggleSurrounding);
    e.handle(SyncEvent::Viewport(ViewportState::new(
        viewport_extent(),
        1_000_000.0,
        true,
    )));
    e.settle().await;

    assert_eq!(src.request_count(), 1);
    assert_eq!(e.core().surrounding().status, FetchStatus::Idle);
}

#[test]
fn late_resolution_of_superseded_fetch_is_ignored() {
    let mut core = boundaries::SyncCore::new(
        LayerId::new("waterbodies"),
        vec!["id".to_string()],
        SyncConfig::default(),
    );
    core.handle(SyncEvent::ToggleSurrounding);
    let f1 = core.handle(SyncEvent::Viewport(ViewportState::new(
        viewport_extent(),
        10_000.0,
        true,
    )));
    let f2 = core.handle(SyncEvent::Viewport(ViewportState::new(
        viewport_extent(),
        12_000.0,
        true,
    )));
    let t1 = f1.start[0].ticket;
    let t2 = f2.start[0].ticket;

    let empty = DataSet::success(vec![]);
    assert!(core.complete(t2, FetchOutcome::Completed(empty.clone())));
    let before = core.snapshot();

    assert!(!core.complete(t1, FetchOutcome::Completed(DataSet::failure())));
    assert_eq!(core.snapshot(), before);
}

#[tokio::test]
async fn failed_surrounding_fetch_keeps_displayed_records() {
    let src = source();
    let mut e = engine(&src);
    e.handle(SyncEvent::ToggleSurrounding);
    e.handle(SyncEvent::Viewport(ViewportState::new(
        viewport_extent(),
        10_000.0,
        true,
    )));
    e.settle().await;
    assert_eq!(keys(e.core().surrounding()), vec!["2", "3"]);

    src.push_failure(FetchError::with_status("unavailable", 503));
    e.handle(SyncEvent::Viewport(ViewportState::new(
        Extent::new(0.0, 0.0, 40.0, 40.0, SR),
        10_000.0,
        true,
    )));
    e.settle().await;

    assert_eq!(e.core().surrounding().status, FetchStatus::Failure);
    assert_eq!(keys(e.core().surrounding()), vec!["2", "3"]);
}

#[tokio::test(start_paused = true)]
async fn run_loop_tracks_boundary_viewport_and_commands() {
    let src = source();
    src.push_delay(Duration::from_millis(50));
    let e = engine(&src);
    let (handle, controls) = e.controls();
    let (publisher, viewport) = viewport_channel();
    let (boundary_tx, boundary_rx) = watch::channel(None);

    let driver = e.run(viewport, boundary_rx, controls);
    let script = async {
        let mut snapshots = handle.subscribe();

        boundary_tx.send_replace(Some(boundary()));
        let local = snapshots
            .wait_for(|s| s.local.status == FetchStatus::Success)
            .await
            .expect("engine running")
            .clone();
        assert_eq!(keys(&local.local), vec!["1", "2"]);

        handle.toggle_surrounding().expect("toggle");
        publisher.begin_motion();
        publisher.settle(viewport_extent(), 10_000.0);
        let shown = snapshots
            .wait_for(|s| s.surrounding.status == FetchStatus::Success)
            .await
            .expect("engine running")
            .clone();
        assert_eq!(keys(&shown.surrounding), vec!["3"]);
        assert_eq!(shown.surrounding_opacity, 0.8);

        handle.reset().expect("reset");
        let reset = snapshots
            .wait_for(|s| s.visibility == SurroundingVisibility::Hidden)
            .await
            .expect("engine running")
            .clone();
        assert!(reset.surrounding.is_empty());
        assert_eq!(keys(&reset.local), vec!["1", "2"]);

        handle.unmount().expect("unmount");
    };

    let (core, ()) = tokio::join!(driver, script);
    assert!(core.local().is_empty());
    assert!(core.layer().boundary().is_none());
    assert!(handle.toggle_surrounding().is_err());
}
