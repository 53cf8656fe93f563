//! Length-prefixed framing over a reliable byte stream.
//!
//! Every frame is exactly 5 ASCII decimal digits (left-zero-padded) naming
//! the payload length, followed by that many payload bytes. NUL bytes inside
//! the header are trimmed before parsing. A frame whose payload is the
//! single byte `0x01` is a keep-alive and is skipped by the reader.

use crate::error::WireError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// Frame header size: 5 ASCII digits
pub const HEADER_SIZE: usize = 5;

/// Largest payload a 5-digit header can express
pub const MAX_PAYLOAD: usize = 99_999;

/// Keep-alive frame payload
pub const KEEPALIVE_PAYLOAD: [u8; 1] = [0x01];

/// Default per-operation read deadline
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(3 * 60 * 60);

/// A framed view over a connected byte stream.
///
/// Reads are cancellation-safe: partially received frames survive in an
/// internal buffer across dropped futures, so a caller may race `recv`
/// against timers without losing bytes.
pub struct FramedStream<S> {
    inner: S,
    buf: Vec<u8>,
    read_deadline: Duration,
    keepalive: Option<Duration>,
}

impl<S> FramedStream<S> {
    /// Wrap a connected stream with the default 3-hour read deadline
    pub fn new(inner: S) -> Self {
        Self::with_deadline(inner, DEFAULT_READ_DEADLINE)
    }

    /// Wrap a connected stream with an explicit read deadline
    pub fn with_deadline(inner: S, read_deadline: Duration) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            read_deadline,
            keepalive: None,
        }
    }

    /// Emit keep-alive frames at this interval while a read is idle.
    /// `None` disables them.
    pub fn set_keepalive(&mut self, interval: Option<Duration>) {
        self.keepalive = interval;
    }

    /// Consume the wrapper, returning the underlying stream.
    ///
    /// Any partially buffered inbound frame is discarded.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Consume the wrapper, returning the stream and any inbound bytes
    /// buffered past the last parsed frame.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.inner, self.buf)
    }

    /// Pull one complete frame out of the inbound buffer, if present.
    fn take_frame(&mut self) -> Result<Option<Vec<u8>>, WireError> {
        // Collect 5 non-NUL header bytes; NUL padding between them is legal.
        let mut digits = [0u8; HEADER_SIZE];
        let mut have = 0;
        let mut header_end = 0;
        for (i, &b) in self.buf.iter().enumerate() {
            if b == 0 {
                continue;
            }
            digits[have] = b;
            have += 1;
            if have == HEADER_SIZE {
                header_end = i + 1;
                break;
            }
        }
        if have < HEADER_SIZE {
            return Ok(None);
        }

        let text = std::str::from_utf8(&digits)
            .map_err(|_| WireError::MalformedHeader(format!("{digits:?}")))?;
        let len: usize = text
            .parse()
            .map_err(|_| WireError::MalformedHeader(text.to_string()))?;

        if self.buf.len() < header_end + len {
            return Ok(None);
        }

        let payload = self.buf[header_end..header_end + len].to_vec();
        self.buf.drain(..header_end + len);
        Ok(Some(payload))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedStream<S> {
    /// Write one frame
    ///
    /// # Errors
    ///
    /// [`WireError::Oversized`] if the payload exceeds what the header can
    /// express; otherwise socket errors.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), WireError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(WireError::Oversized(payload.len()));
        }
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(format!("{:05}", payload.len()).as_bytes());
        frame.extend_from_slice(payload);
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Write one keep-alive frame
    pub async fn send_keepalive(&mut self) -> Result<(), WireError> {
        self.send(&KEEPALIVE_PAYLOAD).await
    }

    /// Read one frame, skipping keep-alives.
    ///
    /// The read deadline is renewed on entry. If a keep-alive interval is
    /// configured, keep-alive frames are emitted while the wait is idle.
    ///
    /// # Errors
    ///
    /// [`WireError::ConnectionClosed`] on EOF, [`WireError::Timeout`] when
    /// the deadline passes, [`WireError::MalformedHeader`] for unparseable
    /// headers.
    pub async fn recv(&mut self) -> Result<Vec<u8>, WireError> {
        let deadline = Instant::now() + self.read_deadline;
        let mut scratch = [0u8; 4096];

        loop {
            while let Some(frame) = self.take_frame()? {
                if frame == KEEPALIVE_PAYLOAD {
                    tracing::trace!("keep-alive frame skipped");
                    continue;
                }
                return Ok(frame);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(WireError::Timeout);
            }
            let mut wait = deadline - now;
            if let Some(interval) = self.keepalive {
                wait = wait.min(interval);
            }

            match tokio::time::timeout(wait, self.inner.read(&mut scratch)).await {
                Ok(Ok(0)) => return Err(WireError::ConnectionClosed),
                Ok(Ok(n)) => self.buf.extend_from_slice(&scratch[..n]),
                Ok(Err(e)) => return Err(WireError::Io(e)),
                Err(_) if Instant::now() < deadline => {
                    self.send_keepalive().await?;
                }
                Err(_) => return Err(WireError::Timeout),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (FramedStream<tokio::io::DuplexStream>, FramedStream<tokio::io::DuplexStream>) {
        let (a, b) = tokio::io::duplex(1 << 16);
        (FramedStream::new(a), FramedStream::new(b))
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = pair();
        a.send(b"hello, world").await.unwrap();
        assert_eq!(b.recv().await.unwrap(), b"hello, world");
    }

    #[tokio::test]
    async fn test_multiple_frames_preserve_boundaries() {
        let (mut a, mut b) = pair();
        a.send(b"one").await.unwrap();
        a.send(b"").await.unwrap();
        a.send(&[0u8; 300]).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), b"one");
        assert_eq!(b.recv().await.unwrap(), b"");
        assert_eq!(b.recv().await.unwrap(), vec![0u8; 300]);
    }

    #[tokio::test]
    async fn test_keepalive_frames_skipped() {
        let (mut a, mut b) = pair();
        a.send_keepalive().await.unwrap();
        a.send_keepalive().await.unwrap();
        a.send(b"payload").await.unwrap();
        assert_eq!(b.recv().await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_nul_padded_header_accepted() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut raw = a;
        let mut framed = FramedStream::new(b);

        tokio::io::AsyncWriteExt::write_all(&mut raw, b"\x0000\x00005hello")
            .await
            .unwrap();
        assert_eq!(framed.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_malformed_header_rejected() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut raw = a;
        let mut framed = FramedStream::new(b);

        tokio::io::AsyncWriteExt::write_all(&mut raw, b"abcdepayload")
            .await
            .unwrap();
        assert!(matches!(
            framed.recv().await,
            Err(WireError::MalformedHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let (a, b) = tokio::io::duplex(1 << 16);
        drop(a);
        let mut framed = FramedStream::new(b);
        assert!(matches!(
            framed.recv().await,
            Err(WireError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_connection_closed() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut raw = a;
        let mut framed = FramedStream::new(b);

        tokio::io::AsyncWriteExt::write_all(&mut raw, b"00010hel").await.unwrap();
        drop(raw);
        assert!(matches!(
            framed.recv().await,
            Err(WireError::ConnectionClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let _keep_open = a;
        let mut framed = FramedStream::with_deadline(b, Duration::from_millis(50));
        assert!(matches!(framed.recv().await, Err(WireError::Timeout)));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let (mut a, _b) = pair();
        let huge = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            a.send(&huge).await,
            Err(WireError::Oversized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_emitted_while_waiting() {
        let (a, b) = tokio::io::duplex(1 << 16);
        let mut waiting = FramedStream::new(a);
        waiting.set_keepalive(Some(Duration::from_millis(10)));
        let mut other = FramedStream::new(b);

        // The waiting side blocks in recv; its keep-alives must show up on
        // the other side as skippable frames ahead of real payload.
        let reader = tokio::spawn(async move {
            let got = waiting.recv().await.unwrap();
            assert_eq!(got, b"real");
            waiting.send(b"done").await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(35)).await;
        other.send(b"real").await.unwrap();

        // recv skips the keep-alives queued up during the idle window.
        assert_eq!(other.recv().await.unwrap(), b"done");
        reader.await.unwrap();
    }
}
