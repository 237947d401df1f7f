// host.rs — The slice of the host's rendering and input system the registry
// consumes.
//
// `HostApi` hands out a `HostSession` (the "API handle"). While a session is
// alive the registry can install one frame listener and one mouse listener.
// Dropping the session releases the handle and everything registered on it.

use crate::dialog::{DeviceContext, MouseEvent, WindowHandle};
use crate::error::HostError;
use crate::geometry::{Point, Rect};
use std::sync::Arc;

/// Called once per rendered frame with the device context to draw into.
pub type FrameListener = Arc<dyn Fn(DeviceContext) + Send + Sync>;

/// Called for each mouse message. Returns `true` if the message was consumed
/// and must not reach the game.
pub type MouseListener = Arc<dyn Fn(&MouseEvent) -> bool + Send + Sync>;

/// Handle of an installed listener, unique within its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Factory for sessions. Acquired lazily when the first dialog is shown.
pub trait HostApi: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn HostSession>, HostError>;
}

/// A live handle to the host. Implementations must not invoke listeners
/// synchronously from inside `add_*_listener` or `remove_listener`.
/// `add_*_listener` fails with [`HostError::ListenerRejected`] when the host
/// cannot deliver that kind of event.
pub trait HostSession: Send {
    fn add_frame_listener(
        &mut self,
        listener: FrameListener,
        priority: i32,
    ) -> Result<ListenerId, HostError>;

    fn add_mouse_listener(
        &mut self,
        listener: MouseListener,
        priority: i32,
    ) -> Result<ListenerId, HostError>;

    fn remove_listener(&mut self, id: ListenerId);

    /// Top-level window the session is attached to.
    fn window(&self) -> Option<WindowHandle>;

    /// Client area of the host window.
    fn client_rect(&self) -> Option<Rect>;

    /// Cursor position in client coordinates.
    fn cursor_position(&self) -> Option<Point>;

    /// Global letterbox offset setting, read fresh on every frame.
    fn pillarbox_width(&self) -> i32;
}
