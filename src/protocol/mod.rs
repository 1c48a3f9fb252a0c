//! Wire protocol module.
//!
//! Defines request framing and result codes for socket communication.
//!
//! ## Wire Format
//!
//! Requests are length-prefixed raw payloads, responses a signed code:
//! ```text
//! request:  [4 bytes: length (big-endian u32)][payload]
//! response: [8 bytes: result (big-endian i64)]
//! ```
//!
//! A non-negative result is the operation's count; a negative one is `-errno`.

mod result;
mod wire;

pub use result::{describe_result, errno_for, result_code};
pub use wire::{
    decode_result, encode_request, read_length, read_payload, read_payload_with_timeout,
    write_result, write_result_with_timeout, RESULT_FRAME_LEN,
};
