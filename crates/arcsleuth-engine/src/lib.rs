/// ArcSleuth Engine: the coordination loop between scanner and UI.
///
/// Two reader threads decode the scanner's and the UI's byte streams into
/// [`Inbound`] messages on one channel. A single [`Engine`] consumes that
/// channel, owns the archive registry outright and decides when a frame
/// may be sent to the UI. Nothing here takes a lock.
///
/// # Modules
///
/// - [`pipe`]: line readers and buffered writers for the process pipes.
/// - [`engine`]: batch-draining event loop, render gate, two-phase stop.
/// - [`view`]: per-folder selection and sort cursor.
/// - [`render`]: folder frames sent to the UI.
/// - [`error`]: faults that end a run.
pub mod engine;
pub mod error;
pub mod pipe;
pub mod render;
pub mod view;

pub use engine::{Engine, LoopStats, Phase};
pub use error::EngineError;
pub use pipe::{spawn_reader, Inbound, Outbox, Source};
