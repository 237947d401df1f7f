// config.rs — Runtime settings for the overlay.
//
// Everything has a sensible default so the DLL works with no setup; a few
// values can be overridden through environment variables of the game process.

use std::env;

/// Priority the dialog listeners register at. Dialogs draw above the host's
/// own overlays and see clicks before them.
pub const DIALOG_RENDER_PRIORITY: i32 = 100;

pub const ENV_LOG_FILTER: &str = "DIALOG_OVERLAY_LOG";
pub const ENV_PRIORITY: &str = "DIALOG_OVERLAY_PRIORITY";
pub const ENV_PILLARBOX: &str = "DIALOG_OVERLAY_PILLARBOX";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Priority passed to the host when installing frame and mouse listeners.
    pub listener_priority: i32,
    /// File name of the log, created next to the DLL.
    pub log_file_name: String,
    /// `tracing-subscriber` filter directive, e.g. `info` or `dialog_overlay=trace`.
    pub log_filter: String,
    /// Module exporting the present function the frame hook detours.
    pub frame_hook_module: String,
    /// Export name of that present function. Must have the
    /// `BOOL (HDC)` signature of `wglSwapBuffers`.
    pub frame_hook_export: String,
    /// Horizontal letterbox offset the game renders with, in pixels. Reported
    /// to dialogs on every frame. Negative values are clamped to 0.
    pub pillarbox_width: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            listener_priority: DIALOG_RENDER_PRIORITY,
            log_file_name: "dialog_overlay.log".to_string(),
            log_filter: "info".to_string(),
            frame_hook_module: "opengl32.dll".to_string(),
            frame_hook_export: "wglSwapBuffers".to_string(),
            pillarbox_width: 0,
        }
    }
}

impl OverlayConfig {
    /// Defaults, overridden by `DIALOG_OVERLAY_LOG`, `DIALOG_OVERLAY_PRIORITY`
    /// and `DIALOG_OVERLAY_PILLARBOX`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|s| !s.trim().is_empty()) {
            self.log_filter = filter;
        }
        if let Some(priority) = lookup(ENV_PRIORITY).and_then(|s| s.trim().parse().ok()) {
            self.listener_priority = priority;
        }
        if let Some(width) = lookup(ENV_PILLARBOX).and_then(|s| s.trim().parse::<i32>().ok()) {
            self.pillarbox_width = width.max(0);
        }
        self
    }
}
