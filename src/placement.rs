// placement.rs — Anchored, letterbox-aware positioning for dialogs.
//
// A dialog describes where it wants to be with a source rectangle and a set of
// flags. ANCHOR_* picks which point of the dialog the source origin refers to,
// ALIGN_* picks which point of the game surface it is measured from. Unless
// NO_PILLARBOX is set, left and right alignment are pulled inward by the
// host's pillarbox width so dialogs stay on the rendered picture.

use crate::geometry::Rect;
use bitflags::bitflags;
use parking_lot::Mutex;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlacementFlags: u32 {
        const ANCHOR_CENTER = 1 << 0;
        const ANCHOR_RIGHT  = 1 << 1;
        const ANCHOR_MIDDLE = 1 << 2;
        const ANCHOR_BOTTOM = 1 << 3;
        const ALIGN_CENTER  = 1 << 4;
        const ALIGN_RIGHT   = 1 << 5;
        const ALIGN_MIDDLE  = 1 << 6;
        const ALIGN_BOTTOM  = 1 << 7;
        const NO_PILLARBOX  = 1 << 8;
    }
}

/// Compute where `source` lands on a surface of `client_rect`'s size.
pub fn place(
    source: Rect,
    flags: PlacementFlags,
    client_rect: Option<Rect>,
    pillarbox_width: i32,
) -> Rect {
    let (surface_w, surface_h) = client_rect.map_or((0, 0), |r| (r.width(), r.height()));
    let pillarbox = if flags.contains(PlacementFlags::NO_PILLARBOX) {
        0
    } else {
        pillarbox_width
    };

    let mut dx = 0;
    let mut dy = 0;

    if flags.contains(PlacementFlags::ANCHOR_CENTER) {
        dx -= source.width() / 2;
    } else if flags.contains(PlacementFlags::ANCHOR_RIGHT) {
        dx -= source.width();
    }
    if flags.contains(PlacementFlags::ANCHOR_MIDDLE) {
        dy -= source.height() / 2;
    } else if flags.contains(PlacementFlags::ANCHOR_BOTTOM) {
        dy -= source.height();
    }

    if flags.contains(PlacementFlags::ALIGN_CENTER) {
        dx += surface_w / 2;
    } else if flags.contains(PlacementFlags::ALIGN_RIGHT) {
        dx += surface_w - pillarbox;
    } else {
        dx += pillarbox;
    }
    if flags.contains(PlacementFlags::ALIGN_MIDDLE) {
        dy += surface_h / 2;
    } else if flags.contains(PlacementFlags::ALIGN_BOTTOM) {
        dy += surface_h;
    }

    source.offset(dx, dy)
}

/// Position state a dialog can embed: its flags and its current on-screen
/// rectangle, updated from `on_draw` and read by `Dialog::rect`.
#[derive(Debug)]
pub struct Placement {
    flags: PlacementFlags,
    rect: Mutex<Rect>,
}

impl Placement {
    pub fn new(rect: Rect, flags: PlacementFlags) -> Self {
        Self {
            flags,
            rect: Mutex::new(rect),
        }
    }

    pub fn flags(&self) -> PlacementFlags {
        self.flags
    }

    pub fn rect(&self) -> Rect {
        *self.rect.lock()
    }

    /// Recompute the on-screen rectangle from `source` and return it.
    pub fn update(&self, source: Rect, client_rect: Option<Rect>, pillarbox_width: i32) -> Rect {
        let placed = place(source, self.flags, client_rect, pillarbox_width);
        *self.rect.lock() = placed;
        placed
    }
}
