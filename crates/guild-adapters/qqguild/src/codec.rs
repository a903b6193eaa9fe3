//! Segment codec.
//!
//! Maps canonical segments to the platform's wire representation and back.
//! Text travels in the `content` field with `&`, `<` and `>` escaped as
//! entities; mentions and emoji are inline markup inside that same field:
//!
//! | segment        | wire                                   |
//! |----------------|----------------------------------------|
//! | `text`         | escaped text                           |
//! | `face`         | `<emoji:ID>`                           |
//! | `at`           | `<@ID>`, `@everyone` for `"all"`       |
//! | `reply`        | `msg_id` field of the enclosing post   |
//! | `image`        | `image` field or multipart `file_image`|

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use tracing::{debug, warn};

use guild_core::{ApiError, ApiResult};

use crate::model::api::{FileImage, MessageBody};
use crate::model::segment::{ForwardNode, Segment};

// ============================================================================
// Escaping
// ============================================================================

/// Escapes canonical text for the `content` field.
pub fn escape_content(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Turns wire content back into canonical text.
pub fn unescape_content(wire: &str) -> String {
    let mut out = String::with_capacity(wire.len());
    let mut rest = wire;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let (replacement, consumed) = if tail.starts_with("&amp;") {
            ('&', 5)
        } else if tail.starts_with("&lt;") {
            ('<', 4)
        } else if tail.starts_with("&gt;") {
            ('>', 4)
        } else {
            ('&', 1)
        };
        out.push(replacement);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Identity
// ============================================================================

/// Builds the canonical group id of a channel.
pub fn make_group_id(guild_id: &str, channel_id: &str) -> String {
    format!("{guild_id}-{channel_id}")
}

/// Splits a canonical group id into `(guild_id, channel_id)`.
pub fn split_group_id(group_id: &str) -> Option<(&str, &str)> {
    group_id.split_once('-')
}

/// Namespaces a platform user id.
pub fn namespace_user(prefix: &str, id: &str) -> String {
    format!("{prefix}{id}")
}

/// Strips the namespace prefix from a user id, if present.
pub fn strip_namespace<'a>(prefix: &str, id: &'a str) -> &'a str {
    id.strip_prefix(prefix).unwrap_or(id)
}

// ============================================================================
// Encode
// ============================================================================

/// Where an image's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Inline `base64://` payload (without the scheme).
    Base64(&'a str),
    /// Local file.
    Local(PathBuf),
    /// Anything the platform fetches itself.
    Remote(&'a str),
}

impl<'a> ImageSource<'a> {
    /// Classifies an image `file` reference.
    pub fn classify(file: &'a str) -> Self {
        if let Some(data) = file.strip_prefix("base64://") {
            ImageSource::Base64(data)
        } else if let Some(path) = file.strip_prefix("file://") {
            ImageSource::Local(PathBuf::from(path))
        } else if Path::new(file).is_absolute() {
            ImageSource::Local(PathBuf::from(file))
        } else {
            ImageSource::Remote(file)
        }
    }
}

/// What a segment contributes to the outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<'a> {
    /// Wire text appended to the pending content.
    Content(String),
    /// New reference for the pending request.
    Reference(&'a str),
    /// An image post.
    Image(ImageSource<'a>),
    /// A forwarded batch, one send per node.
    Forward(&'a [ForwardNode]),
    /// Nothing is sent.
    Skip,
}

/// Encodes one segment.
pub fn encode<'a>(segment: &'a Segment, id_prefix: &str) -> Fragment<'a> {
    match segment {
        Segment::Text(data) => Fragment::Content(escape_content(&data.text)),
        Segment::Face(data) => Fragment::Content(format!("<emoji:{}>", data.id)),
        Segment::At(data) if data.is_all() => Fragment::Content("@everyone".to_string()),
        Segment::At(data) => {
            Fragment::Content(format!("<@{}>", strip_namespace(id_prefix, &data.qq)))
        }
        Segment::Reply(data) => Fragment::Reference(&data.id),
        Segment::Image(data) => Fragment::Image(ImageSource::classify(&data.file)),
        Segment::Node(nodes) => Fragment::Forward(nodes),
        Segment::Attachment(data) => {
            debug!(url = %data.url, "Attachment segments cannot be sent, skipping");
            Fragment::Skip
        }
        Segment::Button(_) => Fragment::Skip,
    }
}

/// Builds the body of an image post, without content or reference.
///
/// Returns `None` for inline data that does not decode; the caller sends the
/// segment as text instead. An unreadable local file is an error.
pub async fn image_body(source: ImageSource<'_>) -> ApiResult<Option<MessageBody>> {
    let file_image = match source {
        ImageSource::Remote(url) => {
            return Ok(Some(MessageBody {
                image: Some(url.to_string()),
                ..Default::default()
            }));
        }
        ImageSource::Base64(data) => {
            let bytes = match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "Undecodable base64 image, sending as text");
                    return Ok(None);
                }
            };
            FileImage {
                filename: format!("image.{}", image_extension(&bytes)),
                bytes,
            }
        }
        ImageSource::Local(path) => {
            let bytes = tokio::fs::read(&path).await.map_err(|e| ApiError::File {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image.{}", image_extension(&bytes)));
            FileImage { filename, bytes }
        }
    };
    Ok(Some(MessageBody {
        file_image: Some(file_image),
        ..Default::default()
    }))
}

/// Guesses a file extension from magic bytes.
fn image_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "png",
    }
}

// ============================================================================
// Decode
// ============================================================================

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@!?([^<>\s]+)>|<emoji:(\d+)>").expect("markup pattern is valid")
});

/// Decodes wire content into segments.
///
/// Mentions (`<@!ID>` or `<@ID>`) become `at` segments carrying the
/// namespaced id; `<emoji:ID>` becomes `face`; the text between markers is
/// unescaped into `text` segments. Empty runs produce nothing.
pub fn decode_content(content: &str, id_prefix: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in MARKUP.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut segments, &content[last..whole.start()]);
        if let Some(user) = caps.get(1) {
            segments.push(Segment::at(namespace_user(id_prefix, user.as_str())));
        } else if let Some(face) = caps.get(2) {
            segments.push(Segment::face(face.as_str()));
        }
        last = whole.end();
    }
    push_text(&mut segments, &content[last..]);
    segments
}

fn push_text(segments: &mut Vec<Segment>, wire: &str) {
    if !wire.is_empty() {
        segments.push(Segment::text(unescape_content(wire)));
    }
}
