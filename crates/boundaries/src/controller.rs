//! User-facing visibility controls. These are the only code paths that
//! change the surrounding mask state.

use layers::SurroundingVisibility;

use crate::scheduler::Schedule;
use crate::sync::SyncCore;

impl SyncCore {
    /// Flip surroundings between hidden and shown. Showing them fetches the
    /// last stationary viewport right away; hiding keeps any fetch in flight.
    pub fn toggle_surrounding(&mut self) -> Schedule {
        let next = self.layer.visibility().toggled();
        self.layer.set_surrounding_visibility(next);
        self.events.emit("toggle", format!("{next:?}"));

        let schedule = match next {
            SurroundingVisibility::Shown => self.scheduler.on_shown(),
            SurroundingVisibility::Hidden => Schedule::default(),
        };
        self.begin(&schedule);
        schedule
    }

    /// Hide surroundings and drop their data. Local data is untouched.
    pub fn reset(&mut self) -> Schedule {
        self.layer
            .set_surrounding_visibility(SurroundingVisibility::Hidden);
        let schedule = self.scheduler.reset();
        self.surrounding_raw.clear();
        self.surrounding.clear();
        self.events.emit("reset", "");
        self.begin(&schedule);
        self.recompose();
        schedule
    }

    /// Tear down: reset, then forget the boundary and local data too.
    pub fn unmount(&mut self) -> Schedule {
        let mut schedule = self.reset();
        let rest = self.scheduler.unmount();
        self.local.clear();
        self.layer.set_always_visible_boundary(None);
        self.events.emit("unmount", "");
        self.begin(&rest);
        self.recompose();
        schedule.extend(rest);
        schedule
    }
}
