// win32.rs — The host API on plain Win32: a present-function detour for
// frames and a window-procedure subclass for mouse input.
//
// Flow:
//   Win32Host::acquire()  -> MinHook detour on <frame_hook_module>!<frame_hook_export>
//                            (created once, enabled per session)
//                         -> subclass the game's top-level window
//   detour(hdc)           -> every frame listener -> original present
//   wnd_proc(..)          -> mouse listeners, topmost priority first; a consumed
//                            click never reaches the game
//   Win32Session::drop()  -> restore the window procedure, disable the detour
//   shutdown()            -> remove the detour and uninitialize MinHook (DLL unload)
//
// The detour and the window procedure have fixed signatures, so the listener
// tables they read are statics. The hook is only ever disabled from inside a
// session, never removed, because the registry may release the session from
// within the detour itself.

use crate::config::OverlayConfig;
use crate::dialog::{DeviceContext, MouseEvent, WindowHandle};
use crate::error::HostError;
use crate::geometry::{Point, Rect};
use crate::host::{FrameListener, HostApi, HostSession, ListenerId, MouseListener};
use minhook_sys::{
    MH_CreateHook, MH_DisableHook, MH_EnableHook, MH_Initialize, MH_OK, MH_RemoveHook,
    MH_Uninitialize,
};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::ffi::{c_void, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicIsize, AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, error, warn};
use winapi::shared::minwindef::{BOOL, FALSE, LPARAM, LRESULT, TRUE, UINT, WPARAM};
use winapi::shared::windef::{HDC, HWND, POINT, RECT};
use winapi::um::libloaderapi::{GetModuleFileNameA, GetModuleHandleA, GetProcAddress};
use winapi::um::processthreadsapi::GetCurrentProcessId;
use winapi::um::winuser::{
    CallWindowProcW, EnumWindows, GetClientRect, GetCursorPos, GetWindow, GetWindowLongPtrW,
    GetWindowThreadProcessId, IsWindowVisible, ScreenToClient, SetWindowLongPtrW, GWLP_WNDPROC,
    GW_OWNER, WNDPROC,
};

/// Signature of the detoured present function (`wglSwapBuffers`, `SwapBuffers`).
type PresentFn = unsafe extern "system" fn(HDC) -> BOOL;

/// Original present function, reached through the MinHook trampoline.
static ORIGINAL: OnceCell<PresentFn> = OnceCell::new();

/// Address of the detoured function.
static TARGET: OnceCell<usize> = OnceCell::new();

static MH_READY: AtomicBool = AtomicBool::new(false);

/// Window procedure we replaced (0 while not subclassed).
static ORIGINAL_WNDPROC: AtomicIsize = AtomicIsize::new(0);

/// Pillarbox width reported to frame listeners.
static PILLARBOX: AtomicI32 = AtomicI32::new(0);

/// Module handle of our DLL (used to place the log file).
static DLL_HINST: AtomicUsize = AtomicUsize::new(0);

static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

struct Registered<L> {
    id: ListenerId,
    priority: i32,
    listener: L,
}

struct Listeners {
    frame: Vec<Registered<FrameListener>>,
    mouse: Vec<Registered<MouseListener>>,
}

static LISTENERS: Mutex<Listeners> = parking_lot::const_mutex(Listeners {
    frame: Vec::new(),
    mouse: Vec::new(),
});

/// Store the DLL's module handle (called from DllMain).
pub fn set_dll_hinst(h: usize) {
    DLL_HINST.store(h, Ordering::Relaxed);
}

/// Directory containing our DLL.
pub fn dll_directory() -> Option<PathBuf> {
    let hinst = DLL_HINST.load(Ordering::Relaxed);
    if hinst == 0 {
        return None;
    }
    let mut buf = [0u8; 512];
    let len = unsafe { GetModuleFileNameA(hinst as _, buf.as_mut_ptr() as _, buf.len() as u32) }
        as usize;
    if len == 0 {
        return None;
    }
    let path = std::str::from_utf8(&buf[..len]).ok()?;
    PathBuf::from(path).parent().map(PathBuf::from)
}

/// `HostApi` over the current process's window and present function.
pub struct Win32Host {
    config: OverlayConfig,
}

impl Win32Host {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }
}

impl HostApi for Win32Host {
    fn acquire(&self) -> Result<Box<dyn HostSession>, HostError> {
        let hwnd = find_main_window().ok_or(HostError::WindowNotFound)?;
        unsafe { enable_frame_hook(&self.config)? };
        unsafe { subclass(hwnd) };
        PILLARBOX.store(self.config.pillarbox_width, Ordering::Relaxed);
        debug!(hwnd = hwnd as usize, "win32 session opened");
        Ok(Box::new(Win32Session {
            hwnd: hwnd as usize,
            owned: Vec::new(),
        }))
    }
}

struct Win32Session {
    hwnd: usize,
    /// Listeners this session registered.
    owned: Vec<ListenerId>,
}

fn next_id() -> ListenerId {
    ListenerId(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed))
}

/// Insert keeping higher priorities first.
fn insert_sorted<L>(list: &mut Vec<Registered<L>>, entry: Registered<L>) {
    let at = list
        .iter()
        .position(|r| r.priority < entry.priority)
        .unwrap_or(list.len());
    list.insert(at, entry);
}

impl HostSession for Win32Session {
    fn add_frame_listener(
        &mut self,
        listener: FrameListener,
        priority: i32,
    ) -> Result<ListenerId, HostError> {
        // Without the detour the listener would never run.
        if TARGET.get().is_none() {
            return Err(HostError::ListenerRejected("frame"));
        }
        let id = next_id();
        insert_sorted(&mut LISTENERS.lock().frame, Registered { id, priority, listener });
        self.owned.push(id);
        Ok(id)
    }

    fn add_mouse_listener(
        &mut self,
        listener: MouseListener,
        priority: i32,
    ) -> Result<ListenerId, HostError> {
        // Mouse input arrives through the subclass; retry it if acquire could not.
        unsafe { subclass(self.hwnd as HWND) };
        if ORIGINAL_WNDPROC.load(Ordering::Acquire) == 0 {
            return Err(HostError::ListenerRejected("mouse"));
        }
        let id = next_id();
        insert_sorted(&mut LISTENERS.lock().mouse, Registered { id, priority, listener });
        self.owned.push(id);
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        let mut listeners = LISTENERS.lock();
        listeners.frame.retain(|r| r.id != id);
        listeners.mouse.retain(|r| r.id != id);
        self.owned.retain(|&o| o != id);
    }

    fn window(&self) -> Option<WindowHandle> {
        Some(WindowHandle::from_raw(self.hwnd))
    }

    fn client_rect(&self) -> Option<Rect> {
        let mut rc = RECT { left: 0, top: 0, right: 0, bottom: 0 };
        if unsafe { GetClientRect(self.hwnd as HWND, &mut rc) } == 0 {
            return None;
        }
        Some(Rect::new(rc.left, rc.top, rc.right, rc.bottom))
    }

    fn cursor_position(&self) -> Option<Point> {
        let mut p = POINT { x: 0, y: 0 };
        unsafe {
            if GetCursorPos(&mut p) == 0 || ScreenToClient(self.hwnd as HWND, &mut p) == 0 {
                return None;
            }
        }
        Some(Point::new(p.x, p.y))
    }

    fn pillarbox_width(&self) -> i32 {
        PILLARBOX.load(Ordering::Relaxed)
    }
}

impl Drop for Win32Session {
    fn drop(&mut self) {
        {
            let mut listeners = LISTENERS.lock();
            listeners.frame.retain(|r| !self.owned.contains(&r.id));
            listeners.mouse.retain(|r| !self.owned.contains(&r.id));
        }
        unsafe {
            unsubclass(self.hwnd as HWND);
            if let Some(&addr) = TARGET.get() {
                MH_DisableHook(addr as *mut c_void);
            }
        }
        debug!(hwnd = self.hwnd, "win32 session closed");
    }
}

/// Create the detour on first use, then enable it.
unsafe fn enable_frame_hook(config: &OverlayConfig) -> Result<(), HostError> {
    // 1. Initialize MinHook (once per process)
    if !MH_READY.load(Ordering::Acquire) {
        let s = MH_Initialize();
        if s != MH_OK {
            return Err(HostError::Hook(s));
        }
        MH_READY.store(true, Ordering::Release);
    }

    // 2. Reuse the detour from an earlier session, or create it
    let target = match TARGET.get() {
        Some(&addr) => addr,
        None => {
            // 3. Resolve the present export in the already-loaded module
            let module = CString::new(config.frame_hook_module.as_str())
                .map_err(|_| HostError::Unavailable)?;
            let export = CString::new(config.frame_hook_export.as_str())
                .map_err(|_| HostError::Unavailable)?;
            let m = GetModuleHandleA(module.as_ptr());
            if m.is_null() {
                return Err(HostError::Unavailable);
            }
            let present = GetProcAddress(m, export.as_ptr());
            if present.is_null() {
                return Err(HostError::Unavailable);
            }

            // 4. Create the hook; MinHook hands back a trampoline to the original
            let mut original = ptr::null_mut::<c_void>();
            let s = MH_CreateHook(present as *mut c_void, detour as *mut c_void, &mut original);
            if s != MH_OK {
                return Err(HostError::Hook(s));
            }
            let _ = ORIGINAL.set(std::mem::transmute::<*mut c_void, PresentFn>(original));
            let _ = TARGET.set(present as usize);
            present as usize
        }
    };

    // 5. Activate it (disabled again when the session ends)
    let s = MH_EnableHook(target as *mut c_void);
    if s != MH_OK {
        return Err(HostError::Hook(s));
    }
    Ok(())
}

/// Remove the detour and shut MinHook down. Call on DLL unload.
pub unsafe fn shutdown() {
    LISTENERS.lock().frame.clear();
    LISTENERS.lock().mouse.clear();
    if let Some(&addr) = TARGET.get() {
        let p = addr as *mut c_void;
        MH_DisableHook(p);
        MH_RemoveHook(p);
    }
    if MH_READY.swap(false, Ordering::AcqRel) {
        MH_Uninitialize();
    }
}

/// Runs every frame instead of the real present function.
unsafe extern "system" fn detour(hdc: HDC) -> BOOL {
    // Snapshot so listeners can be added or removed from inside a callback.
    let listeners: Vec<FrameListener> = LISTENERS
        .lock()
        .frame
        .iter()
        .map(|r| r.listener.clone())
        .collect();
    let dc = DeviceContext::from_raw(hdc as usize);
    for listener in listeners {
        // catch_unwind keeps a panicking overlay from taking the game down
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(dc))).is_err() {
            error!("frame listener panicked");
        }
    }

    // Always present the frame, drawn over or not
    match ORIGINAL.get() {
        Some(f) => f(hdc),
        None => TRUE,
    }
}

unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    // Read the game's procedure before any listener runs: a listener may end
    // the session, which unsubclasses and clears ORIGINAL_WNDPROC.
    let original: WNDPROC =
        std::mem::transmute::<isize, WNDPROC>(ORIGINAL_WNDPROC.load(Ordering::Acquire));

    // Unpack client coordinates (signed, for multi-monitor setups)
    let event = MouseEvent {
        button: wparam as u32,
        x: (lparam & 0xFFFF) as u16 as i16 as i32,
        y: ((lparam >> 16) & 0xFFFF) as u16 as i16 as i32,
        message: msg,
        window: WindowHandle::from_raw(hwnd as usize),
    };
    if event.is_button_message() {
        let listeners: Vec<MouseListener> = LISTENERS
            .lock()
            .mouse
            .iter()
            .map(|r| r.listener.clone())
            .collect();
        for listener in listeners {
            let consumed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event)))
                .unwrap_or_else(|_| {
                    error!("mouse listener panicked");
                    false
                });
            // Consumed clicks never reach the game
            if consumed {
                return 0;
            }
        }
    }

    CallWindowProcW(original, hwnd, msg, wparam, lparam)
}

unsafe fn subclass(hwnd: HWND) {
    if ORIGINAL_WNDPROC.load(Ordering::Acquire) != 0 {
        return;
    }
    // Publish the game's procedure before ours can receive a message
    let current = GetWindowLongPtrW(hwnd, GWLP_WNDPROC);
    if current == 0 {
        warn!("could not read host window procedure");
        return;
    }
    ORIGINAL_WNDPROC.store(current as isize, Ordering::Release);
    if SetWindowLongPtrW(hwnd, GWLP_WNDPROC, wnd_proc as usize as _) == 0 {
        ORIGINAL_WNDPROC.store(0, Ordering::Release);
        warn!("could not subclass host window");
    }
}

unsafe fn unsubclass(hwnd: HWND) {
    let previous = ORIGINAL_WNDPROC.swap(0, Ordering::AcqRel);
    if previous != 0 {
        SetWindowLongPtrW(hwnd, GWLP_WNDPROC, previous as _);
    }
}

/// First visible, unowned top-level window of this process.
fn find_main_window() -> Option<HWND> {
    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let found = &mut *(lparam as *mut usize);
        let mut pid = 0;
        GetWindowThreadProcessId(hwnd, &mut pid);
        if pid == GetCurrentProcessId()
            && IsWindowVisible(hwnd) != 0
            && GetWindow(hwnd, GW_OWNER).is_null()
        {
            *found = hwnd as usize;
            return FALSE; // stop enumerating
        }
        TRUE
    }

    let mut found: usize = 0;
    unsafe { EnumWindows(Some(visit), &mut found as *mut usize as LPARAM) };
    (found != 0).then_some(found as HWND)
}
