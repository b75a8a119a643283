//! Wire-level types: the [`Frame`] codec and error payloads.

mod frame;
pub use frame::{Frame, FrameError};

mod error;
pub use error::{ErrorBody, HandlerError, InvokeError};

/// Protocol version announced in the welcome frame.
pub const PROTOCOL_VERSION: u64 = 3;

/// Ids are short opaque tokens. 32 bytes holds the default generator's
/// output as well as client-chosen correlation ids.
pub(crate) const ID_LEN_LIMIT: usize = 32;

/// Limit on a path's length after percent-decoding.
pub(crate) const PATH_LEN_LIMIT: usize = 1024;
