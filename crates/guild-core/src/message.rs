//! Message traits shared by adapters.
//!
//! - [`MessageSegment`]: a single unit of content (text, image, mention, ...)
//! - [`Message`]: an ordered collection of segments

use std::fmt::{Debug, Display};

/// A single segment of a message.
///
/// `Display` renders the human-readable form used in log lines and in the
/// flattened `raw_message` string.
pub trait MessageSegment: Debug + Display + Clone + Send + Sync + 'static {
    /// Returns the type identifier of this segment (e.g. "text", "image", "at").
    fn segment_type(&self) -> &str;

    /// Returns the text content if this is a text segment.
    fn as_text(&self) -> Option<&str>;

    /// Returns true if this is a plain text segment.
    fn is_text(&self) -> bool {
        self.segment_type() == "text"
    }
}

/// A complete message composed of segments.
pub trait Message: Debug + Clone + Send + Sync + 'static {
    /// The segment type used by this message.
    type Segment: MessageSegment;

    /// Returns the segments in wire order.
    fn segments(&self) -> &[Self::Segment];

    /// Returns the number of segments in the message.
    fn len(&self) -> usize {
        self.segments().len()
    }

    /// Returns true if the message has no segments.
    fn is_empty(&self) -> bool {
        self.segments().is_empty()
    }

    /// Concatenates the content of all text segments.
    fn extract_plain_text(&self) -> String {
        self.segments()
            .iter()
            .filter_map(MessageSegment::as_text)
            .collect()
    }

    /// Renders every segment for display.
    fn display(&self) -> String {
        self.segments().iter().map(ToString::to_string).collect()
    }
}
