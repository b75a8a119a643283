use super::{ID_LEN_LIMIT, PATH_LEN_LIMIT, PROTOCOL_VERSION};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

/// Bytes that must never appear raw in the path section of an encoded
/// frame: the field sentinels, `%` itself, and whitespace/controls.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'$')
    .add(b'~')
    .add(b'|');

/// A message of the wire protocol.
///
/// Frames are encoded as UTF-8 text:
///
/// ```text
/// <type-digit>[ "$" <id> ][ "~" <percent-encoded-path> ] "|" [ <json-body> ]
/// ```
///
/// The type digit is `0` = welcome, `1` = invoke, `2` = result, `3` = error,
/// `4` = publish. The `|` separator is mandatory; a frame with no trailing
/// bytes after it carries no body. Paths are percent-encoded on the wire and
/// plain UTF-8 here; ids are raw ASCII tokens of at most 32 characters from
/// `[A-Za-z0-9-]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server greeting, the first frame sent on every connection.
    Welcome {
        /// The protocol version spoken by the sender.
        version: u64,
    },
    /// A client request naming a path, expecting a single reply with the
    /// same id.
    Invoke {
        /// Correlation id chosen by the invoking client.
        id: String,
        /// The requested path.
        path: String,
        /// Optional request payload.
        body: Option<Value>,
    },
    /// Successful reply to an invoke.
    Result {
        /// Correlation id of the invoke being answered.
        id: String,
        /// Optional result payload.
        body: Option<Value>,
    },
    /// Failure reply to an invoke.
    Error {
        /// Correlation id of the invoke being answered.
        id: String,
        /// Sanitized error payload.
        body: Option<Value>,
    },
    /// One-way server-to-client message on a subscribed path.
    Publish {
        /// The path being published on.
        path: String,
        /// Optional payload.
        body: Option<Value>,
    },
}

/// Reasons a frame fails to decode.
///
/// Any of these closes the offending connection; the raw message is carried
/// alongside in the server's parser-error signal for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Shorter than the minimal `<digit>|` header.
    #[error("frame shorter than the minimal header")]
    TooShort,
    /// The first byte is not a decimal digit.
    #[error("frame does not start with a type digit")]
    NotADigit,
    /// The first byte is a digit outside the known type range.
    #[error("unknown frame type digit `{0}`")]
    UnknownType(char),
    /// The mandatory `|` header terminator is missing.
    #[error("missing `|` header terminator")]
    MissingTerminator,
    /// Id section empty, longer than 32 bytes, or outside `[A-Za-z0-9-]`.
    #[error("id section is empty, oversized, or not `[A-Za-z0-9-]`")]
    InvalidId,
    /// Path section empty, not valid percent-encoded UTF-8, or longer than
    /// 1024 characters once decoded.
    #[error("path section is empty, oversized, or not valid percent-encoded UTF-8")]
    InvalidPath,
    /// The body did not parse as a JSON document.
    #[error("body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
    /// This frame type forbids an id section.
    #[error("frame type forbids an id section")]
    UnexpectedId,
    /// This frame type requires an id section.
    #[error("frame type requires an id section")]
    MissingId,
    /// This frame type forbids a path section.
    #[error("frame type forbids a path section")]
    UnexpectedPath,
    /// This frame type requires a path section.
    #[error("frame type requires a path section")]
    MissingPath,
    /// A welcome frame carried something other than the supported protocol
    /// version integer.
    #[error("welcome frame does not carry protocol version {PROTOCOL_VERSION}")]
    VersionMismatch,
}

impl Frame {
    /// A welcome frame for the protocol version this crate speaks.
    pub const fn welcome() -> Self {
        Self::Welcome {
            version: PROTOCOL_VERSION,
        }
    }

    /// An invoke frame.
    pub fn invoke(id: impl Into<String>, path: impl Into<String>, body: Option<Value>) -> Self {
        Self::Invoke {
            id: id.into(),
            path: path.into(),
            body,
        }
    }

    /// A result frame answering `id`.
    pub fn result(id: impl Into<String>, body: Option<Value>) -> Self {
        Self::Result {
            id: id.into(),
            body,
        }
    }

    /// An error frame answering `id`.
    pub fn error(id: impl Into<String>, body: Option<Value>) -> Self {
        Self::Error {
            id: id.into(),
            body,
        }
    }

    /// A publish frame on `path`.
    pub fn publish(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::Publish {
            path: path.into(),
            body,
        }
    }

    const fn type_digit(&self) -> char {
        match self {
            Self::Welcome { .. } => '0',
            Self::Invoke { .. } => '1',
            Self::Result { .. } => '2',
            Self::Error { .. } => '3',
            Self::Publish { .. } => '4',
        }
    }

    /// The frame's id section, if its type carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Invoke { id, .. } | Self::Result { id, .. } | Self::Error { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The frame's path section, if its type carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Invoke { path, .. } | Self::Publish { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The frame's body, if present.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Invoke { body, .. }
            | Self::Result { body, .. }
            | Self::Error { body, .. }
            | Self::Publish { body, .. } => body.as_ref(),
            Self::Welcome { .. } => None,
        }
    }

    /// Encode the frame as wire text. Encoding is total.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(32);
        out.push(self.type_digit());
        if let Some(id) = self.id() {
            out.push('$');
            out.push_str(id);
        }
        if let Some(path) = self.path() {
            out.push('~');
            for part in utf8_percent_encode(path, PATH_ESCAPE) {
                out.push_str(part);
            }
        }
        out.push('|');
        match self {
            Self::Welcome { version } => out.push_str(&version.to_string()),
            _ => {
                if let Some(body) = self.body() {
                    out.push_str(&body.to_string());
                }
            }
        }
        out
    }

    /// Decode one wire message.
    ///
    /// The codec is pure and strict: every violation of the framing or
    /// per-type rules is an error, never a best-effort frame.
    pub fn decode(input: &str) -> Result<Self, FrameError> {
        if input.len() < 2 {
            return Err(FrameError::TooShort);
        }
        let digit = input.as_bytes()[0];
        match digit {
            b'0'..=b'4' => {}
            b'5'..=b'9' => return Err(FrameError::UnknownType(digit as char)),
            _ => return Err(FrameError::NotADigit),
        }

        let mut rest = &input[1..];
        let mut id = None;
        let mut path = None;
        if let Some(section) = rest.strip_prefix('$') {
            let end = section
                .find(['~', '|'])
                .ok_or(FrameError::MissingTerminator)?;
            id = Some(parse_id(&section[..end])?);
            rest = &section[end..];
        }
        if let Some(section) = rest.strip_prefix('~') {
            let end = section.find('|').ok_or(FrameError::MissingTerminator)?;
            path = Some(parse_path(&section[..end])?);
            rest = &section[end..];
        }
        let body_text = rest.strip_prefix('|').ok_or(FrameError::MissingTerminator)?;
        let body = if body_text.is_empty() {
            None
        } else {
            Some(serde_json::from_str(body_text)?)
        };

        match digit {
            b'0' => {
                forbid_id(&id)?;
                forbid_path(&path)?;
                match body.as_ref().and_then(Value::as_u64) {
                    Some(PROTOCOL_VERSION) => Ok(Self::welcome()),
                    _ => Err(FrameError::VersionMismatch),
                }
            }
            b'1' => Ok(Self::Invoke {
                id: id.ok_or(FrameError::MissingId)?,
                path: path.ok_or(FrameError::MissingPath)?,
                body,
            }),
            b'2' => {
                forbid_path(&path)?;
                Ok(Self::Result {
                    id: id.ok_or(FrameError::MissingId)?,
                    body,
                })
            }
            b'3' => {
                forbid_path(&path)?;
                Ok(Self::Error {
                    id: id.ok_or(FrameError::MissingId)?,
                    body,
                })
            }
            b'4' => {
                forbid_id(&id)?;
                Ok(Self::Publish {
                    path: path.ok_or(FrameError::MissingPath)?,
                    body,
                })
            }
            _ => unreachable!("digit range checked above"),
        }
    }
}

fn parse_id(raw: &str) -> Result<String, FrameError> {
    if raw.is_empty()
        || raw.len() > ID_LEN_LIMIT
        || !raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(FrameError::InvalidId);
    }
    Ok(raw.to_owned())
}

fn parse_path(raw: &str) -> Result<String, FrameError> {
    if raw.is_empty() {
        return Err(FrameError::InvalidPath);
    }
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| FrameError::InvalidPath)?;
    if decoded.chars().count() > PATH_LEN_LIMIT {
        return Err(FrameError::InvalidPath);
    }
    Ok(decoded.into_owned())
}

fn forbid_id(id: &Option<String>) -> Result<(), FrameError> {
    if id.is_some() {
        return Err(FrameError::UnexpectedId);
    }
    Ok(())
}

fn forbid_path(path: &Option<String>) -> Result<(), FrameError> {
    if path.is_some() {
        return Err(FrameError::UnexpectedPath);
    }
    Ok(())
}
