pub mod cursor;
pub mod traits;

pub use cursor::{Cursor, CursorError, JsonFileCursorStore, MemoryCursorStore, PendingOffsets};
pub use traits::CursorStore;
