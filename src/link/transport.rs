//! Line-oriented transport abstraction over the physical link.

use crate::error::Result;

/// Blocking, line-oriented access to the device.
///
/// Implementations never wait for data that is not already on its way: if no
/// complete line can be assembled from the bytes currently available,
/// `read_line` returns `Ok(None)` and keeps any partial line buffered.
pub trait Transport: Send {
    /// Return the next complete, whitespace-trimmed line if one is available.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Write the whole buffer to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Discard everything received but not yet read.
    fn clear_input(&mut self) -> Result<()>;

    /// Release the link. Dropping the transport closes it regardless of the
    /// outcome; the result only reports whether the final flush succeeded.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Split the first newline-terminated line off `pending`.
pub(crate) fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let raw: Vec<u8> = pending.drain(..=end).collect();
    Some(String::from_utf8_lossy(&raw).trim().to_string())
}
