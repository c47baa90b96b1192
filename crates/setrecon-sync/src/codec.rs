//! Framed CBOR encoding of protocol messages.
//!
//! Format: `[u32 big-endian length][CBOR body]`. Writes are not flushed here;
//! callers decide when buffered frames go out.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ReconError, Result};

/// Read one length-prefixed message.
pub async fn read_msg<R, T>(reader: &mut R, max_size: usize) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > max_size {
        return Err(ReconError::FrameTooLarge { len, max: max_size });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    ciborium::from_reader(buf.as_slice()).map_err(|e| ReconError::Codec(e.to_string()))
}

/// Read one message, failing with [`ReconError::Timeout`] after `timeout`.
pub async fn read_msg_timeout<R, T>(reader: &mut R, max_size: usize, timeout: Duration) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match tokio::time::timeout(timeout, read_msg(reader, max_size)).await {
        Ok(result) => result,
        Err(_) => Err(ReconError::Timeout(format!(
            "no message within {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Write one length-prefixed message.
pub async fn write_msg<W, T>(writer: &mut W, message: &T, max_size: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(|e| ReconError::Codec(e.to_string()))?;

    if buf.len() > max_size || buf.len() > u32::MAX as usize {
        return Err(ReconError::FrameTooLarge {
            len: buf.len(),
            max: max_size,
        });
    }

    writer.write_all(&(buf.len() as u32).to_be_bytes()).await?;
    writer.write_all(&buf).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{limits::DEFAULT_MAX_FRAME_SIZE, ReconMsg};
    use setrecon_core::{Bitstring, ZSet, Zp};

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let set: ZSet = [Zp::new(1), Zp::new(2)].into_iter().collect();
        let msgs = vec![
            ReconMsg::ReconRqstFull {
                prefix: Bitstring::from_bytes(&[0x00]),
                elements: set.clone(),
            },
            ReconMsg::Flush,
            ReconMsg::Elements(set),
        ];

        for msg in &msgs {
            write_msg(&mut a, msg, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        }
        for expected in &msgs {
            let got: ReconMsg = read_msg(&mut b, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
            assert_eq!(&got, expected);
        }
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected_on_read() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        a.write_all(&1000u32.to_be_bytes()).await.unwrap();
        let err = read_msg::<_, ReconMsg>(&mut b, 100).await.unwrap_err();
        assert!(matches!(err, ReconError::FrameTooLarge { len: 1000, max: 100 }));
    }

    #[tokio::test]
    async fn test_oversize_frame_rejected_on_write() {
        let (mut a, _b) = tokio::io::duplex(4096);
        let msg = ReconMsg::error("x".repeat(200));
        let err = write_msg(&mut a, &msg, 16).await.unwrap_err();
        assert!(matches!(err, ReconError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_garbage_body_is_codec_error() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        a.write_all(&3u32.to_be_bytes()).await.unwrap();
        a.write_all(&[0xff, 0xff, 0xff]).await.unwrap();
        let err = read_msg::<_, ReconMsg>(&mut b, 100).await.unwrap_err();
        assert!(matches!(err, ReconError::Codec(_)));
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        let (a, mut b) = tokio::io::duplex(4096);
        drop(a);
        let err = read_msg::<_, ReconMsg>(&mut b, 100).await.unwrap_err();
        assert!(matches!(err, ReconError::Io(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let (_a, mut b) = tokio::io::duplex(4096);
        let err = read_msg_timeout::<_, ReconMsg>(&mut b, 100, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Timeout(_)));
    }
}
