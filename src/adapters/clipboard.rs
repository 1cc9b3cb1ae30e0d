use arboard::Clipboard;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::DomainError;
use crate::ports::TextOutput;

/// Delivers transcripts by replacing the clipboard contents.
pub struct ClipboardOutput {
    clipboard: Mutex<Clipboard>,
}

impl ClipboardOutput {
    pub fn new() -> Result<Self, DomainError> {
        let clipboard = Clipboard::new()
            .map_err(|e| DomainError::Io(format!("failed to initialize clipboard: {e}")))?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }
}

impl TextOutput for ClipboardOutput {
    fn deliver(&self, text: &str) -> Result<(), DomainError> {
        if text.is_empty() {
            debug!("empty transcript, leaving clipboard untouched");
            return Ok(());
        }
        self.clipboard
            .lock()
            .set_text(text)
            .map_err(|e| DomainError::Io(format!("failed to set clipboard text: {e}")))?;
        info!(chars = text.len(), "transcript copied to clipboard");
        Ok(())
    }
}
