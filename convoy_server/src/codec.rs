use std::{borrow::Borrow, io};

use bytes::{BufMut, Bytes, BytesMut};
use driver_hub::{ClientEvent, EventError, ServerEvent};
use thiserror::Error;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024;

/// Newline-delimited JSON frames.
///
/// A frame that fails to parse is yielded as `Ok(Err(..))` so the connection
/// can report it and carry on. Only I/O failures and over-long frames end the
/// stream.
#[derive(Clone, Debug)]
pub struct EventCodec {
    frames: AnyDelimiterCodec,
    max_length: usize,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame exceeds {0} bytes")]
    FrameTooLong(usize),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EventCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        EventCodec {
            frames: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_length),
            max_length,
        }
    }

    fn split_err(&self, err: AnyDelimiterCodecError) -> CodecError {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => CodecError::FrameTooLong(self.max_length),
            AnyDelimiterCodecError::Io(e) => CodecError::Io(e),
        }
    }

    /// Blank frames yield `None`.
    fn parse(frame: &Bytes) -> Option<Result<ClientEvent, EventError>> {
        let frame = match frame.last() {
            Some(b'\r') => &frame[..frame.len() - 1],
            _ => &frame[..],
        };
        if frame.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(ClientEvent::parse_slice(frame))
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventCodec {
    type Item = Result<ClientEvent, EventError>;

    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.frames.decode(buf) {
                Ok(Some(frame)) => match Self::parse(&frame) {
                    Some(event) => return Ok(Some(event)),
                    None => continue,
                },
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.split_err(e)),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.frames.decode_eof(buf) {
                Ok(Some(frame)) => match Self::parse(&frame) {
                    Some(event) => return Ok(Some(event)),
                    None => continue,
                },
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.split_err(e)),
            }
        }
    }
}

impl<E> Encoder<E> for EventCodec
where
    E: Borrow<ServerEvent>,
{
    type Error = CodecError;

    fn encode(&mut self, event: E, buf: &mut BytesMut) -> Result<(), CodecError> {
        let json = serde_json::to_vec(event.borrow())?;
        buf.reserve(json.len() + 1);
        buf.put_slice(&json);
        buf.put_u8(b'\n');
        Ok(())
    }
}
