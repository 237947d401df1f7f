// lib.rs — In-process dialog overlay for a running game.
//
// Mod code shows custom dialogs on top of the game through a `DialogRegistry`.
// The registry hooks the host's frame and mouse callbacks only while some shown
// dialog needs them, and lets both callbacks show or hide dialogs safely while
// the other thread is iterating.
//
// When built as a DLL and injected on Windows, DllMain spawns a worker thread
// that:
//   1. Opens the log file next to the DLL
//   2. Creates the process-wide registry over the Win32 host backend
//   3. Stays alive until DLL_PROCESS_DETACH, then removes the hooks
//
// The registry itself is platform independent and can be driven by any
// `HostApi` implementation.

#![allow(non_snake_case)]

pub mod config;    // Runtime settings, env overrides
pub mod dialog;    // Dialog trait, features, event payloads
pub mod error;     // DialogError, HostError
pub mod geometry;  // Point, Rect, hit testing
pub mod host;      // Host API surface consumed by the registry
pub mod logging;   // tracing subscriber writing to a file
pub mod placement; // Anchored, pillarbox-aware positioning
pub mod registry;  // Dialog list, gate, hook lifecycle, dispatch

#[cfg(windows)]
pub mod win32;     // Win32 host: present detour + window subclass

pub use config::OverlayConfig;
pub use dialog::{
    DeviceContext, Dialog, DialogId, Features, Frame, MouseEvent, WindowHandle, DEFAULT_RECT,
};
pub use error::{DialogError, HostError};
pub use geometry::{Point, Rect};
pub use host::{FrameListener, HostApi, HostSession, ListenerId, MouseListener};
pub use placement::{Placement, PlacementFlags};
pub use registry::{DialogRegistry, FeatureCounts, GateState, ShownDialog};

#[cfg(windows)]
pub use dll::registry;

#[cfg(windows)]
mod dll {
    use crate::config::OverlayConfig;
    use crate::registry::DialogRegistry;
    use crate::{logging, win32};
    use once_cell::sync::OnceCell;
    use std::ptr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use winapi::shared::minwindef::{BOOL, DWORD, HINSTANCE, LPVOID, TRUE};
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::libloaderapi::DisableThreadLibraryCalls;
    use winapi::um::processthreadsapi::CreateThread;
    use winapi::um::winnt::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

    /// Keeps the worker thread alive. Cleared on DLL_PROCESS_DETACH.
    static RUNNING: AtomicBool = AtomicBool::new(false);

    /// The registry mod code in this process shares.
    static REGISTRY: OnceCell<Arc<DialogRegistry>> = OnceCell::new();

    /// Process-wide registry, available once the worker thread has started.
    pub fn registry() -> Option<Arc<DialogRegistry>> {
        REGISTRY.get().cloned()
    }

    unsafe extern "system" fn worker(_: LPVOID) -> DWORD {
        let config = OverlayConfig::from_env();
        let dir = win32::dll_directory();
        if let Ok(path) = logging::init(&config, dir.as_deref()) {
            tracing::info!(path = %path.display(), "dialog overlay attached");
        }

        let host = Arc::new(win32::Win32Host::new(config.clone()));
        let _ = REGISTRY.set(DialogRegistry::new(host, config.listener_priority));

        RUNNING.store(true, Ordering::Release);
        while RUNNING.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(50));
        }

        win32::shutdown();
        tracing::info!("dialog overlay detached");
        0
    }

    #[no_mangle]
    pub unsafe extern "system" fn DllMain(hinst: HINSTANCE, reason: DWORD, _reserved: LPVOID) -> BOOL {
        match reason {
            DLL_PROCESS_ATTACH => {
                DisableThreadLibraryCalls(hinst);
                win32::set_dll_hinst(hinst as usize);
                let h = CreateThread(ptr::null_mut(), 0, Some(worker), ptr::null_mut(), 0, ptr::null_mut());
                if !h.is_null() {
                    CloseHandle(h);
                }
            }
            DLL_PROCESS_DETACH => {
                RUNNING.store(false, Ordering::Release);
            }
            _ => {}
        }
        TRUE
    }
}
