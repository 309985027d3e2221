//! Attachment access for the byte streams carrying directive audio.

use std::io::Read;

/// A readable audio byte stream.
///
/// Any `Read + Send` type qualifies; the blanket impl keeps adapters free to
/// hand out cursors, files, or pipe readers.
pub trait AttachmentReader: Read + Send {}

impl<T: Read + Send> AttachmentReader for T {}

/// Resolves attachment ids to readers.
pub trait AttachmentManager: Send + Sync {
    /// Open a reader for `attachment_id`, or `None` if no such attachment exists.
    ///
    /// Each id is expected to be read once; a second call may return `None`.
    fn create_reader(&self, attachment_id: &str) -> Option<Box<dyn AttachmentReader>>;
}

/// Attachment id for `content_id` delivered with the directive `context_id`.
pub fn attachment_id(context_id: &str, content_id: &str) -> String {
    format!("{context_id}:{content_id}")
}
