//! Message composition for Modest
//!
//! Builds outgoing MIME messages with lettre and reads drafts back into
//! editable data with mail-parser.

mod compose;
mod error;
mod msg_data;

pub use compose::{
    build_lettre_message, compose, InlineImage, OutgoingAttachment,
    OutgoingMessage, Priority,
};
pub use error::{MimeError, MimeResult};
pub use msg_data::{attachment_size, get_msg_data, parse_header, MsgData};
