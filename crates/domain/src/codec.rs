//! Blob format for a stored attachment.
//!
//! ```text
//! [0..4]        Filename length in bytes (u32 BE)
//! [4..4+n]      Filename (UTF-8)
//! [4+n..]       Raw file bytes
//! ```

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::models::Attachment;

/// Size of the filename length prefix.
pub const NAME_LEN_PREFIX: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("attachment blob too short for header ({0} bytes)")]
    TruncatedHeader(usize),
    #[error("attachment filename declares {declared} bytes but only {available} remain")]
    TruncatedName { declared: usize, available: usize },
    #[error("attachment filename is not valid UTF-8")]
    InvalidName,
    #[error("attachment filename too long ({0} bytes)")]
    NameTooLong(usize),
}

pub fn encode_attachment(attachment: &Attachment) -> Result<Vec<u8>, CodecError> {
    let name = attachment.name.as_bytes();
    let name_len =
        u32::try_from(name.len()).map_err(|_| CodecError::NameTooLong(name.len()))?;

    let mut buf = BytesMut::with_capacity(NAME_LEN_PREFIX + name.len() + attachment.data.len());
    buf.put_u32(name_len);
    buf.put_slice(name);
    buf.put_slice(&attachment.data);
    Ok(buf.to_vec())
}

pub fn decode_attachment(blob: &[u8]) -> Result<Attachment, CodecError> {
    if blob.len() < NAME_LEN_PREFIX {
        return Err(CodecError::TruncatedHeader(blob.len()));
    }
    let mut buf = blob;
    let declared = buf.get_u32() as usize;
    if buf.remaining() < declared {
        return Err(CodecError::TruncatedName {
            declared,
            available: buf.remaining(),
        });
    }

    let (name, data) = buf.split_at(declared);
    let name = std::str::from_utf8(name).map_err(|_| CodecError::InvalidName)?;
    Ok(Attachment::new(name, data))
}
