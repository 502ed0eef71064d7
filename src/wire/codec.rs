//! Length-prefixed frame codec.
//!
//! Frame layout: 4-byte big-endian payload length, 1 flag byte, payload.
//! The payload is a bincode-encoded message, lz4-compressed when the raw
//! encoding exceeds [`COMPRESS_THRESHOLD`] bytes.

use crate::core::{Error, Result};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Payloads larger than this are lz4-compressed on the wire.
pub const COMPRESS_THRESHOLD: usize = 512;

/// Refuse frames larger than this (64 MiB) rather than allocate blindly.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Encode and write one framed message.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let encoded = bincode::serialize(message)?;
    let (payload, flags) = if encoded.len() > COMPRESS_THRESHOLD {
        (compress_prepend_size(&encoded), FLAG_COMPRESSED)
    } else {
        (encoded, 0)
    };
    if payload.len() > MAX_FRAME_LEN as usize {
        return Err(Error::ProtocolError(format!(
            "frame of {} bytes exceeds maximum",
            payload.len()
        )));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_u8(flags).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one framed message.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(Error::ProtocolError(format!(
            "frame of {} bytes exceeds maximum",
            len
        )));
    }
    let flags = reader.read_u8().await?;
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;

    let encoded = if flags & FLAG_COMPRESSED != 0 {
        // The prepended size is peer-controlled; bound it before allocating.
        if payload.len() < 4 {
            return Err(Error::DecompressionFailed(
                "payload too short for size prefix".to_string(),
            ));
        }
        let claimed = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if claimed > MAX_FRAME_LEN {
            return Err(Error::ProtocolError(format!(
                "decompressed frame of {} bytes exceeds maximum",
                claimed
            )));
        }
        decompress_size_prepended(&payload)
            .map_err(|e| Error::DecompressionFailed(e.to_string()))?
    } else {
        payload
    };
    Ok(bincode::deserialize(&encoded)?)
}
