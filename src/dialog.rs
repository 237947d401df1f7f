// dialog.rs — The capability set a custom dialog implements, plus the event
// payloads the registry hands to it.
//
// A dialog is any `Send + Sync` type implementing `Dialog`. Which host hooks it
// needs is declared through `Features`; the registry only installs the frame
// hook while at least one shown dialog draws, and the mouse hook while at least
// one shown dialog wants mouse input.

use crate::geometry::{Point, Rect};
use bitflags::bitflags;

/// Rectangle a dialog occupies when its type does not say otherwise.
pub const DEFAULT_RECT: Rect = Rect::new(200, 200, 300, 300);

// Win32 mouse message ids forwarded to dialogs.
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;

bitflags! {
    /// Host hooks a dialog depends on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        /// Wants `on_draw` every frame.
        const DRAW = 0b01;
        /// Wants `on_mouse` for clicks inside its rectangle.
        const MOUSE = 0b10;
    }
}

/// Identity of a dialog: the address of its data.
///
/// Stable for as long as the dialog is alive, which the registry guarantees
/// while the dialog is shown by holding an `Arc` to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DialogId(usize);

impl DialogId {
    pub fn of(dialog: &dyn Dialog) -> Self {
        Self(std::ptr::from_ref(dialog).cast::<()>() as usize)
    }
}

/// Opaque device context the host draws into (an HDC on Windows).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceContext(usize);

impl DeviceContext {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }
}

/// Opaque host window handle (an HWND on Windows).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowHandle(usize);

impl WindowHandle {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }
}

/// Everything a dialog gets to draw one frame.
#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pub dc: DeviceContext,
    /// Host window being drawn into.
    pub window: Option<WindowHandle>,
    /// Cursor in client coordinates, if the host could report it.
    pub cursor: Option<Point>,
    /// Client area of the host window; empty when unknown.
    pub client_rect: Rect,
    /// Host letterbox offset, for [`crate::placement::place`].
    pub pillarbox_width: i32,
}

/// A mouse message as delivered by the host's input hook.
#[derive(Clone, Copy, Debug)]
pub struct MouseEvent {
    pub button: u32,
    pub x: i32,
    pub y: i32,
    pub message: u32,
    pub window: WindowHandle,
}

impl MouseEvent {
    pub const fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Only left/right button presses and releases are routed to dialogs.
    pub const fn is_button_message(&self) -> bool {
        matches!(
            self.message,
            WM_LBUTTONDOWN | WM_LBUTTONUP | WM_RBUTTONDOWN | WM_RBUTTONUP
        )
    }
}

/// Behaviour of a custom dialog.
///
/// `on_draw` and `on_mouse` are called with the registry unlocked, so they may
/// show or hide dialogs (including themselves). `features`, `rect`, `on_show`
/// and `on_hide` are called with the registry locked and must not call back
/// into it.
pub trait Dialog: Send + Sync {
    fn features(&self) -> Features;

    /// Current bounding rectangle, used for mouse hit testing.
    fn rect(&self) -> Rect {
        DEFAULT_RECT
    }

    /// Draw one frame. The return value is reserved; the registry ignores it.
    fn on_draw(&self, _frame: &Frame) -> bool {
        false
    }

    /// Handle a click inside `rect()`. Return `true` to consume it so no
    /// dialog below sees it.
    fn on_mouse(&self, _event: &MouseEvent) -> bool {
        false
    }

    /// Called before the dialog is registered. Return `false` to refuse.
    fn on_show(&self) -> bool {
        true
    }

    /// Called before the dialog is deregistered. Return `false` to refuse.
    fn on_hide(&self) -> bool {
        true
    }
}
