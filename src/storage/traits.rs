use super::cursor::{Cursor, CursorError};
use async_trait::async_trait;

/// Durable home of the committed [`Cursor`].
///
/// `load` on a store that was never written returns an empty cursor. `save`
/// either replaces the previous snapshot completely or leaves it untouched.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> Result<Cursor, CursorError>;
    async fn save(&self, cursor: &Cursor) -> Result<(), CursorError>;
}
