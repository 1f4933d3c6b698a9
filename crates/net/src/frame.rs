//! Framing for session messages on a TCP stream
//!
//! Every frame is a big-endian `u32` byte count followed by the JSON body of
//! one [`Message`]. Gameplay messages are tiny, so anything above
//! [`MAX_FRAME_LEN`] is treated as a broken peer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::Message;

const HEADER_LEN: usize = 4;

/// Upper bound on a frame body (64 KiB)
pub(crate) const MAX_FRAME_LEN: usize = 64 * 1024;

/// Serialize `msg` into a complete frame, header included
pub(crate) fn encode(msg: &Message) -> Result<Vec<u8>> {
    let body = msg
        .to_bytes()
        .map_err(|e| Error::Protocol(format!("cannot encode {:?}: {}", msg, e)))?;
    check_len(body.len())?;

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn check_len(len: usize) -> Result<()> {
    match len {
        0 => Err(Error::Protocol("zero-length frame".into())),
        n if n > MAX_FRAME_LEN => Err(Error::Protocol(format!(
            "frame of {} bytes exceeds {}",
            n, MAX_FRAME_LEN
        ))),
        _ => Ok(()),
    }
}

/// A peer hanging up mid-frame is a normal close, not an I/O failure
fn closed_on_eof(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
        _ => Error::Io(e),
    }
}

pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    let len = reader.read_u32().await.map_err(closed_on_eof)? as usize;
    check_len(len)?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(closed_on_eof)?;

    Message::from_bytes(&body).map_err(|e| Error::Protocol(format!("bad message body: {}", e)))
}

/// Header and body go out in one write so a frame is never split across
/// segments by the writer
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    let frame = encode(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_prefixes_body_length() {
        let frame = encode(&Message::Ping).unwrap();
        let body_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(body_len, frame.len() - HEADER_LEN);
    }

    #[tokio::test]
    async fn test_scene_change_survives_stream() {
        let msg = Message::LoadScene {
            scene: "02_Lobby".into(),
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).await.unwrap();
        write_frame(&mut buf, &Message::Pong).await.unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), msg);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), Message::Pong);
    }

    #[tokio::test]
    async fn test_zero_length_is_protocol_error() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 0]);
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_length_over_limit_is_protocol_error() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let mut cursor = Cursor::new(header.to_vec());
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_hangup_mid_frame_is_close() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 9, b'{']);
        let result = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
