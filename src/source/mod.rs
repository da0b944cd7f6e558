pub mod discover;
pub mod record;
pub mod tailer;

pub use discover::FileDiscoverer;
pub use record::{session_id_from_path, Record};
pub use tailer::{TailError, TailOutcome, Tailer};
