//! Response Terminator Detection
//!
//! The shell delivers replies as an unstructured line stream. A reply is
//! considered complete as soon as a line mentions the closing reply tag.
//! No XML parsing happens here: the marker may appear anywhere in the line
//! and the reply is not correlated with the request that produced it.

/// Substring identifying the closing tag of a reply
pub const TERMINATOR_MARKER: &str = "/rpc-reply";

/// Whether `line` ends collection of the current reply
#[must_use]
pub fn is_complete(line: &str) -> bool {
    line.contains(TERMINATOR_MARKER)
}
