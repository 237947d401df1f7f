// registry.rs — The dialog registry and its dispatch engine.
//
// All shown dialogs live in one flat list. Two host threads walk it: the render
// thread on every frame (front to back, drawing) and the input thread on every
// click (back to front, hit testing). Both may show or hide dialogs from inside
// a callback. Access is serialized by a three-state gate:
//
//   Idle                 list is stable, show/hide edit it directly
//   Busy                 a dispatch pass is walking it; its length is frozen
//   BusyCleanupRequired  as Busy, plus at least one edit was deferred
//
// While busy, `show` queues into `pending` and `hide` replaces the slot with a
// tombstone (`None`), so indices held by the walking thread stay valid. The
// pass ends with `cleanup`, which compacts tombstones, appends pending dialogs
// and wakes the next waiting pass.
//
// The host API handle and its two listeners follow the feature counters: the
// frame hook is installed while any shown dialog draws, the mouse hook while
// any shown dialog takes clicks, and the handle itself is held only while the
// list is non-empty.

use crate::dialog::{DeviceContext, Dialog, DialogId, Features, Frame, MouseEvent};
use crate::error::DialogError;
use crate::geometry::Rect;
use crate::host::{FrameListener, HostApi, HostSession, ListenerId, MouseListener};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

/// Where the gate is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Busy,
    BusyCleanupRequired,
}

/// How many shown dialogs need each host hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureCounts {
    pub draw: usize,
    pub mouse: usize,
}

impl FeatureCounts {
    /// Add `delta` to every counter whose feature is in `features`.
    pub fn modify(&mut self, features: Features, delta: isize) {
        if features.contains(Features::DRAW) {
            self.draw = self.draw.saturating_add_signed(delta);
        }
        if features.contains(Features::MOUSE) {
            self.mouse = self.mouse.saturating_add_signed(delta);
        }
    }
}

type Slot = Option<Arc<dyn Dialog>>;

struct State {
    gate: GateState,
    /// Z-order, bottom first. `None` is a tombstone left by a busy `hide`.
    dialogs: Vec<Slot>,
    /// Shown while busy; merged into `dialogs` by `cleanup`.
    pending: Vec<Arc<dyn Dialog>>,
    /// Features each shown dialog was counted with.
    shown: HashMap<DialogId, Features>,
    counts: FeatureCounts,
}

#[derive(Default)]
struct HostLink {
    session: Option<Box<dyn HostSession>>,
    frame_listener: Option<ListenerId>,
    mouse_listener: Option<ListenerId>,
}

/// Process-wide set of shown dialogs. Create one with [`DialogRegistry::new`]
/// and share the `Arc` with every caller; the host is only touched once the
/// first dialog is shown.
pub struct DialogRegistry {
    this: Weak<DialogRegistry>,
    host_api: Arc<dyn HostApi>,
    priority: i32,
    state: Mutex<State>,
    idle: Condvar,
    // Lock order: `state` before `host`.
    host: Mutex<HostLink>,
}

impl DialogRegistry {
    pub fn new(host_api: Arc<dyn HostApi>, listener_priority: i32) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            host_api,
            priority: listener_priority,
            state: Mutex::new(State {
                gate: GateState::Idle,
                dialogs: Vec::new(),
                pending: Vec::new(),
                shown: HashMap::new(),
                counts: FeatureCounts::default(),
            }),
            idle: Condvar::new(),
            host: Mutex::new(HostLink::default()),
        })
    }

    /// Register `dialog`. Never blocks on a dispatch pass: while one is running
    /// the dialog is queued and becomes visible when the pass ends.
    pub fn show(&self, dialog: Arc<dyn Dialog>) -> Result<(), DialogError> {
        let id = DialogId::of(dialog.as_ref());
        let mut state = self.state.lock();
        if state.shown.contains_key(&id) {
            return Err(DialogError::AlreadyShown);
        }
        if !dialog.on_show() {
            debug!(?id, "show vetoed");
            return Err(DialogError::ShowVetoed);
        }
        let features = dialog.features();
        state.shown.insert(id, features);
        state.counts.modify(features, 1);
        match state.gate {
            GateState::Idle => {
                state.dialogs.push(Some(dialog));
                self.maintain_host(&state);
            }
            GateState::Busy | GateState::BusyCleanupRequired => {
                state.pending.push(dialog);
                state.gate = GateState::BusyCleanupRequired;
            }
        }
        debug!(?id, ?features, gate = ?state.gate, "dialog shown");
        Ok(())
    }

    /// Deregister `dialog`. Never blocks on a dispatch pass: while one is
    /// running the dialog's slot is tombstoned and it is not called again.
    pub fn hide(&self, dialog: &dyn Dialog) -> Result<(), DialogError> {
        let id = DialogId::of(dialog);
        let mut state = self.state.lock();
        let Some(&features) = state.shown.get(&id) else {
            return Err(DialogError::NotShown);
        };
        if !dialog.on_hide() {
            debug!(?id, "hide vetoed");
            return Err(DialogError::HideVetoed);
        }
        state.shown.remove(&id);
        state.counts.modify(features, -1);

        let removed = match state.gate {
            GateState::Idle => {
                let removed = rfind_slot(&state.dialogs, id).and_then(|i| state.dialogs.remove(i));
                self.maintain_host(&state);
                removed
            }
            gate => {
                // Only a dirty pass can have pending entries.
                let queued = match gate {
                    GateState::BusyCleanupRequired => state
                        .pending
                        .iter()
                        .rposition(|d| DialogId::of(d.as_ref()) == id),
                    _ => None,
                };
                match queued {
                    Some(i) => Some(state.pending.remove(i)),
                    None => {
                        state.gate = GateState::BusyCleanupRequired;
                        rfind_slot(&state.dialogs, id).and_then(|i| state.dialogs[i].take())
                    }
                }
            }
        };
        debug!(?id, gate = ?state.gate, "dialog hidden");

        // The registry's reference may be the last one; drop it unlocked so
        // the dialog's destructor can use the registry.
        drop(state);
        drop(removed);
        Ok(())
    }

    /// Show `dialog` and hide it again when the returned guard is dropped.
    pub fn show_scoped(&self, dialog: Arc<dyn Dialog>) -> Result<ShownDialog, DialogError> {
        // Resolve the owning Arc first so a failure cannot leave the dialog
        // registered without a guard.
        let registry = self.this.upgrade().ok_or(DialogError::NotShown)?;
        self.show(Arc::clone(&dialog))?;
        Ok(ShownDialog { registry, dialog })
    }

    pub fn is_shown(&self, dialog: &dyn Dialog) -> bool {
        self.state.lock().shown.contains_key(&DialogId::of(dialog))
    }

    pub fn gate_state(&self) -> GateState {
        self.state.lock().gate
    }

    pub fn feature_counts(&self) -> FeatureCounts {
        self.state.lock().counts
    }

    /// Main list in z-order, bottom first. Tombstones show up as `None`.
    pub fn dialog_ids(&self) -> Vec<Option<DialogId>> {
        self.state
            .lock()
            .dialogs
            .iter()
            .map(|slot| slot.as_deref().map(|d| DialogId::of(d)))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn has_host_session(&self) -> bool {
        self.host.lock().session.is_some()
    }

    /// Draw every shown dialog, bottom first. Called by the host's frame hook.
    pub fn dispatch_frame(&self, dc: DeviceContext) {
        // Snapshot before the gate; the host may be slow to answer.
        let frame = {
            let host = self.host.lock();
            match host.session.as_deref() {
                Some(session) => Frame {
                    dc,
                    window: session.window(),
                    cursor: session.cursor_position(),
                    client_rect: session.client_rect().unwrap_or_default(),
                    pillarbox_width: session.pillarbox_width(),
                },
                None => Frame {
                    dc,
                    window: None,
                    cursor: None,
                    client_rect: Rect::default(),
                    pillarbox_width: 0,
                },
            }
        };

        // Claim the gate. From here until `cleanup` the list length is fixed.
        let mut state = self.begin_pass();
        let len = state.dialogs.len();
        trace!(dialogs = len, "frame pass");
        for index in 0..len {
            // Tombstone left by an earlier hide in this pass.
            let Some(dialog) = state.dialogs[index].clone() else {
                state.gate = GateState::BusyCleanupRequired;
                continue;
            };
            // Call out unlocked so the dialog can show or hide others.
            MutexGuard::unlocked(&mut state, move || {
                invoke("on_draw", || dialog.on_draw(&frame));
            });
            debug_assert_eq!(state.dialogs.len(), len);
        }
        self.cleanup(state);
    }

    /// Offer a click to the dialogs under it, topmost first, until one
    /// consumes it. Returns whether one did.
    pub fn dispatch_mouse(&self, event: &MouseEvent) -> bool {
        if !event.is_button_message() {
            return false;
        }
        let point = event.point();
        let event = *event;

        let mut state = self.begin_pass();
        let len = state.dialogs.len();
        trace!(dialogs = len, x = point.x, y = point.y, msg = event.message, "mouse pass");
        let mut consumed = false;
        for index in (0..len).rev() {
            let Some(dialog) = state.dialogs[index].clone() else {
                state.gate = GateState::BusyCleanupRequired;
                continue;
            };
            // `rect` is dialog code too; a panic here must not strand the gate.
            if !invoke("rect", || dialog.rect().contains(point)) {
                continue;
            }
            consumed = MutexGuard::unlocked(&mut state, move || {
                invoke("on_mouse", || dialog.on_mouse(&event))
            });
            debug_assert_eq!(state.dialogs.len(), len);
            if consumed {
                break;
            }
        }
        self.cleanup(state);
        consumed
    }

    /// Wait for the gate to be idle and claim it.
    fn begin_pass(&self) -> MutexGuard<'_, State> {
        let mut state = self.state.lock();
        while state.gate != GateState::Idle {
            self.idle.wait(&mut state);
        }
        state.gate = GateState::Busy;
        state
    }

    /// End a pass: apply deferred edits, reopen the gate, wake one waiter.
    fn cleanup(&self, mut state: MutexGuard<'_, State>) {
        if state.gate == GateState::BusyCleanupRequired {
            state.dialogs.retain(Option::is_some);
            let pending = std::mem::take(&mut state.pending);
            state.dialogs.extend(pending.into_iter().map(Some));
            self.maintain_host(&state);
            trace!(dialogs = state.dialogs.len(), "deferred edits applied");
        }
        state.gate = GateState::Idle;
        drop(state);
        self.idle.notify_one();
    }

    /// Bring the host handle and listeners in line with the counters.
    /// Idempotent; requires the state lock.
    fn maintain_host(&self, state: &State) {
        let mut guard = self.host.lock();
        let host = &mut *guard;

        // Tear down what is no longer needed. Listeners go before the session.
        if let Some(session) = host.session.as_mut() {
            if state.counts.draw == 0 {
                if let Some(id) = host.frame_listener.take() {
                    session.remove_listener(id);
                    debug!("frame listener removed");
                }
            }
            if state.counts.mouse == 0 {
                if let Some(id) = host.mouse_listener.take() {
                    session.remove_listener(id);
                    debug!("mouse listener removed");
                }
            }
            // Nothing shown: drop the handle, which releases it in the host.
            if state.dialogs.is_empty() {
                host.session = None;
                host.frame_listener = None;
                host.mouse_listener = None;
                debug!("host session released");
            }
        } else if !state.dialogs.is_empty() {
            // First dialog since the last release. A failure is retried on
            // the next maintenance pass.
            match self.host_api.acquire() {
                Ok(session) => {
                    host.session = Some(session);
                    host.frame_listener = None;
                    host.mouse_listener = None;
                    debug!("host session acquired");
                }
                Err(e) => warn!(error = %e, "could not acquire host session"),
            }
        }

        // Install whatever the counters ask for and is not there yet.
        let Some(session) = host.session.as_mut() else {
            return;
        };
        if host.frame_listener.is_none() && state.counts.draw > 0 {
            match session.add_frame_listener(self.frame_listener(), self.priority) {
                Ok(id) => {
                    host.frame_listener = Some(id);
                    debug!(?id, "frame listener installed");
                }
                Err(e) => warn!(error = %e, "could not install frame listener"),
            }
        }
        if host.mouse_listener.is_none() && state.counts.mouse > 0 {
            match session.add_mouse_listener(self.mouse_listener(), self.priority) {
                Ok(id) => {
                    host.mouse_listener = Some(id);
                    debug!(?id, "mouse listener installed");
                }
                Err(e) => warn!(error = %e, "could not install mouse listener"),
            }
        }
    }

    fn frame_listener(&self) -> FrameListener {
        let registry = self.this.clone();
        Arc::new(move |dc: DeviceContext| {
            if let Some(registry) = registry.upgrade() {
                registry.dispatch_frame(dc);
            }
        })
    }

    fn mouse_listener(&self) -> MouseListener {
        let registry = self.this.clone();
        Arc::new(move |event: &MouseEvent| {
            registry
                .upgrade()
                .is_some_and(|registry| registry.dispatch_mouse(event))
        })
    }
}

/// Index of the topmost live slot holding `id`.
fn rfind_slot(dialogs: &[Slot], id: DialogId) -> Option<usize> {
    dialogs
        .iter()
        .rposition(|slot| slot.as_deref().is_some_and(|d| DialogId::of(d) == id))
}

/// Run a dialog callback. A panicking dialog must not leave the gate busy, so
/// the panic is logged and the callback counts as "not consumed".
fn invoke(callback: &'static str, f: impl FnOnce() -> bool) -> bool {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!(callback, "dialog callback panicked");
        false
    })
}

/// A dialog that stays shown for the lifetime of this guard.
pub struct ShownDialog {
    registry: Arc<DialogRegistry>,
    dialog: Arc<dyn Dialog>,
}

impl ShownDialog {
    pub fn dialog(&self) -> &Arc<dyn Dialog> {
        &self.dialog
    }
}

impl Drop for ShownDialog {
    fn drop(&mut self) {
        if let Err(e) = self.registry.hide(self.dialog.as_ref()) {
            debug!(error = %e, "scoped dialog not hidden on drop");
        }
    }
}
