//! Binary frame codec for the multiplexed TCP transport.
//!
//! Every frame travels inside a u32 big-endian length prefix handled by
//! [`LengthDelimitedCodec`]. The frame body starts with a one-byte kind tag;
//! strings carry a u16 length, bodies a u32 length, integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use relaykit::error::UnknownCode;
use relaykit::payload::UnknownEncoding;
use relaykit::{Code, Encoding, Headers, Payload, Response, RpcError};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest frame accepted on either side of a connection.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

const KIND_CALL: u8 = 1;
const KIND_REPLY: u8 = 2;
const KIND_CANCEL: u8 = 3;

const OUTCOME_SUCCESS: u8 = 0;
const OUTCOME_APPLICATION_ERROR: u8 = 1;
const OUTCOME_STATUS_ERROR: u8 = 2;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{0} is too long to encode")]
    FieldTooLong(&'static str),

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("unknown frame kind {0}")]
    UnknownKind(u8),

    #[error("unknown reply outcome {0}")]
    UnknownOutcome(u8),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error(transparent)]
    Encoding(#[from] UnknownEncoding),

    #[error(transparent)]
    Code(#[from] UnknownCode),
}

/// A request travelling from the outbound to the inbound side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub id: u64,
    /// Time left for the call in milliseconds; zero means no deadline.
    pub ttl_ms: u64,
    pub caller: String,
    pub service: String,
    pub procedure: String,
    pub headers: Headers,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Call(CallFrame),
    Reply {
        id: u64,
        result: Result<Response, RpcError>,
    },
    Cancel {
        id: u64,
    },
}

impl Frame {
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            Frame::Call(call) => call.id,
            Frame::Reply { id, .. } | Frame::Cancel { id } => *id,
        }
    }

    fn encode_body(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        match self {
            Frame::Call(call) => {
                dst.put_u8(KIND_CALL);
                dst.put_u64(call.id);
                dst.put_u64(call.ttl_ms);
                put_str(dst, &call.caller, "caller")?;
                put_str(dst, &call.service, "service")?;
                put_str(dst, &call.procedure, "procedure")?;
                put_headers(dst, &call.headers)?;
                put_payload(dst, &call.payload)?;
            }
            Frame::Reply { id, result } => {
                dst.put_u8(KIND_REPLY);
                dst.put_u64(*id);
                match result {
                    Ok(response) => {
                        dst.put_u8(OUTCOME_SUCCESS);
                        put_headers(dst, &response.headers)?;
                        put_payload(dst, &response.payload)?;
                    }
                    Err(RpcError::Application {
                        name,
                        message,
                        details,
                    }) => {
                        dst.put_u8(OUTCOME_APPLICATION_ERROR);
                        put_str(dst, name, "error name")?;
                        put_str(dst, message, "error message")?;
                        put_payload(dst, details)?;
                    }
                    Err(RpcError::Status { code, message }) => {
                        dst.put_u8(OUTCOME_STATUS_ERROR);
                        put_str(dst, code.as_str(), "error code")?;
                        put_str(dst, message, "error message")?;
                    }
                }
            }
            Frame::Cancel { id } => {
                dst.put_u8(KIND_CANCEL);
                dst.put_u64(*id);
            }
        }
        Ok(())
    }

    fn decode_body(mut src: Bytes) -> Result<Self, FrameError> {
        let buf = &mut src;
        let frame = match get_u8(buf, "frame kind")? {
            KIND_CALL => Frame::Call(CallFrame {
                id: get_u64(buf, "call id")?,
                ttl_ms: get_u64(buf, "ttl")?,
                caller: get_str(buf, "caller")?,
                service: get_str(buf, "service")?,
                procedure: get_str(buf, "procedure")?,
                headers: get_headers(buf)?,
                payload: get_payload(buf)?,
            }),
            KIND_REPLY => {
                let id = get_u64(buf, "reply id")?;
                let result = match get_u8(buf, "reply outcome")? {
                    OUTCOME_SUCCESS => {
                        let headers = get_headers(buf)?;
                        let payload = get_payload(buf)?;
                        Ok(Response { headers, payload })
                    }
                    OUTCOME_APPLICATION_ERROR => Err(RpcError::Application {
                        name: get_str(buf, "error name")?,
                        message: get_str(buf, "error message")?,
                        details: get_payload(buf)?,
                    }),
                    OUTCOME_STATUS_ERROR => {
                        let code: Code = get_str(buf, "error code")?.parse()?;
                        Err(RpcError::status(code, get_str(buf, "error message")?))
                    }
                    other => return Err(FrameError::UnknownOutcome(other)),
                };
                Frame::Reply { id, result }
            }
            KIND_CANCEL => Frame::Cancel {
                id: get_u64(buf, "cancel id")?,
            },
            other => return Err(FrameError::UnknownKind(other)),
        };

        if buf.has_remaining() {
            return Err(FrameError::TrailingBytes(buf.remaining()));
        }
        Ok(frame)
    }
}

fn put_str(dst: &mut BytesMut, value: &str, field: &'static str) -> Result<(), FrameError> {
    let len = u16::try_from(value.len()).map_err(|_| FrameError::FieldTooLong(field))?;
    dst.put_u16(len);
    dst.put_slice(value.as_bytes());
    Ok(())
}

fn put_headers(dst: &mut BytesMut, headers: &Headers) -> Result<(), FrameError> {
    let count = u16::try_from(headers.len()).map_err(|_| FrameError::FieldTooLong("headers"))?;
    dst.put_u16(count);
    for (key, value) in headers {
        put_str(dst, key, "header name")?;
        put_str(dst, value, "header value")?;
    }
    Ok(())
}

fn put_payload(dst: &mut BytesMut, payload: &Payload) -> Result<(), FrameError> {
    put_str(dst, payload.encoding().as_str(), "encoding")?;
    let body = payload.body();
    let len = u32::try_from(body.len()).map_err(|_| FrameError::FieldTooLong("body"))?;
    dst.put_u32(len);
    dst.put_slice(body);
    Ok(())
}

fn ensure(buf: &Bytes, needed: usize, field: &'static str) -> Result<(), FrameError> {
    if buf.remaining() < needed {
        return Err(FrameError::Truncated(field));
    }
    Ok(())
}

fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, FrameError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

fn get_u64(buf: &mut Bytes, field: &'static str) -> Result<u64, FrameError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_u64())
}

fn get_str(buf: &mut Bytes, field: &'static str) -> Result<String, FrameError> {
    ensure(buf, 2, field)?;
    let len = usize::from(buf.get_u16());
    ensure(buf, len, field)?;
    String::from_utf8(buf.split_to(len).to_vec()).map_err(|_| FrameError::InvalidUtf8(field))
}

fn get_headers(buf: &mut Bytes) -> Result<Headers, FrameError> {
    ensure(buf, 2, "headers")?;
    let count = buf.get_u16();
    let mut headers = Headers::new();
    for _ in 0..count {
        let key = get_str(buf, "header name")?;
        let value = get_str(buf, "header value")?;
        headers.insert(key, value);
    }
    Ok(headers)
}

fn get_payload(buf: &mut Bytes) -> Result<Payload, FrameError> {
    let encoding: Encoding = get_str(buf, "encoding")?.parse()?;
    ensure(buf, 4, "body")?;
    let len = usize::try_from(buf.get_u32()).map_err(|_| FrameError::FieldTooLong("body"))?;
    ensure(buf, len, "body")?;
    Ok(Payload::new(encoding, buf.split_to(len)))
}

/// [`Frame`] codec over a u32 length prefix.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl FrameCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    #[must_use]
    pub fn with_max_frame_length(max: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(max)
                .new_codec(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.inner.decode(src)? {
            Some(body) => Frame::decode_body(body.freeze()).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let mut body = BytesMut::new();
        frame.encode_body(&mut body)?;
        self.inner.encode(body.freeze(), dst)?;
        Ok(())
    }
}
