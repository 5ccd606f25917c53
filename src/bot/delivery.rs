//! The chat platform operations the request handler depends on.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::session::SenderId;

use super::ui_builder::Keyboard;

/// Message transport and file transfer
///
/// Implemented by [`super::telegram::TelegramDelivery`] in production and by
/// in-memory fakes in tests.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Download a remote file into `destination`, returning the number of bytes written
    async fn fetch_file(&self, file_id: &str, destination: &Path) -> Result<u64>;

    async fn send_text(
        &self,
        sender: SenderId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    async fn send_photo(
        &self,
        sender: SenderId,
        photo: &Path,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;
}
