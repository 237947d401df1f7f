// error.rs — Error types for dialog registration and the host API.

/// Why a `show` or `hide` request was refused. In every case the registry is
/// left exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DialogError {
    #[error("dialog is already shown")]
    AlreadyShown,
    #[error("dialog is not shown")]
    NotShown,
    #[error("dialog refused to be shown")]
    ShowVetoed,
    #[error("dialog refused to be hidden")]
    HideVetoed,
}

/// Failures talking to the host's rendering and input system.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host API is not available")]
    Unavailable,
    #[error("host window not found")]
    WindowNotFound,
    #[error("host rejected {0} listener")]
    ListenerRejected(&'static str),
    #[error("hook installation failed: status {0}")]
    Hook(i32),
}
