use serde::Serialize;

/// Error kinds surfaced by the core. The subset that crosses the Forwarding
/// Service boundary to callers is documented in `forwarding_service.rs`.
#[derive(Debug, thiserror::Error)]
pub enum PadSwitchError {
    /// Virtual-bus driver (ViGEmBus) absent or unreachable. Fatal for forwarding.
    #[error("virtual bus driver not available: {0}")]
    InfrastructureMissing(String),

    /// Input-filter driver (HidHide) absent. Non-fatal — a null adapter is used.
    #[error("input filter driver not available: {0}")]
    FilterUnavailable(String),

    /// Virtual controller connect-retry exhausted.
    #[error("failed to create virtual controller: {0}")]
    VirtualCreationFailed(String),

    /// A physical slot stopped responding mid-session.
    #[error("source device vanished: {0}")]
    SourceVanished(String),

    /// A single hide/unhide call failed.
    #[error("filter mutation failed: {0}")]
    FilterMutationFailed(String),

    /// File I/O on a persisted store failed. Most stores swallow this
    /// (load/save "never throw" per spec); this variant exists for call
    /// sites where the user explicitly asked to save and needs to know it
    /// didn't happen.
    #[error("failed to persist state: {0}")]
    PersistenceFailed(String),

    #[error("driver not installed: {0}")]
    DriverNotInstalled(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("HidHide error: {0}")]
    HidHide(String),

    #[error("ViGEmBus error: {0}")]
    ViGEm(String),

    #[error("forwarding error: {0}")]
    Forwarding(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("platform not supported: {0}")]
    PlatformNotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Tauri requires commands to return Result<T, E> where E: Serialize.
impl Serialize for PadSwitchError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PadSwitchError>;
