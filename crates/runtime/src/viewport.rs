use std::sync::Arc;

use foundation::Extent;
use tokio::sync::watch;

/// Map viewport as published by the map component.
///
/// The extent is shared behind an `Arc`: a viewport that has not moved keeps
/// publishing the same allocation, which is what
/// [`ViewportState::same_extent`] compares.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    pub extent: Arc<Extent>,
    pub scale: f64,
    pub stationary: bool,
}

impl ViewportState {
    pub fn new(extent: Extent, scale: f64, stationary: bool) -> Self {
        Self {
            extent: Arc::new(extent),
            scale,
            stationary,
        }
    }

    pub fn same_extent(&self, other: &Arc<Extent>) -> bool {
        Arc::ptr_eq(&self.extent, other)
    }
}

/// Writer side of the viewport observable, owned by the map.
#[derive(Debug)]
pub struct ViewportPublisher {
    tx: watch::Sender<Option<ViewportState>>,
}

/// Read-only viewport observable handed to every engine instance.
#[derive(Debug, Clone)]
pub struct ViewportWatch {
    rx: watch::Receiver<Option<ViewportState>>,
}

pub fn viewport_channel() -> (ViewportPublisher, ViewportWatch) {
    let (tx, rx) = watch::channel(None);
    (ViewportPublisher { tx }, ViewportWatch { rx })
}

impl ViewportPublisher {
    pub fn publish(&self, state: ViewportState) {
        self.tx.send_replace(Some(state));
    }

    /// Mark the current viewport as moving, keeping its extent.
    pub fn begin_motion(&self) {
        self.tx.send_modify(|state| {
            if let Some(s) = state {
                s.stationary = false;
            }
        });
    }

    /// Mark the current viewport as stationary at a new extent and scale.
    pub fn settle(&self, extent: Extent, scale: f64) {
        self.publish(ViewportState::new(extent, scale, true));
    }

    pub fn watch(&self) -> ViewportWatch {
        ViewportWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl ViewportWatch {
    pub fn current(&self) -> Option<ViewportState> {
        self.rx.borrow().clone()
    }

    /// Waits for the next publication that reports a stationary viewport.
    ///
    /// Intermediate non-stationary frames are skipped. Returns `None` once the
    /// publisher is gone.
    pub async fn next_stationary(&mut self) -> Option<ViewportState> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let state = self.rx.borrow_and_update().clone();
            if let Some(state) = state.filter(|s| s.stationary) {
                return Some(state);
            }
        }
    }
}
