//! A length-framed codec matching Apache Thrift's `TFramedTransport` +
//! `TBinaryProtocol` on the wire, restricted to the two calls this mesh
//! needs (`push(binary) -> void`, `pull() -> binary`). Real Thrift peers
//! speak exactly this framing, so any other implementation of the same
//! `AntiEntropy` service can interoperate without change.

use crate::error::TransportError;

const VERSION_MASK: u32 = 0xffff_0000;
const VERSION_1: u32 = 0x8001_0000;

const MSG_CALL: u8 = 1;
const MSG_REPLY: u8 = 2;
const MSG_EXCEPTION: u8 = 3;

const TYPE_STOP: u8 = 0;
const TYPE_I32: u8 = 8;
const TYPE_STRING: u8 = 11;

/// Field id Thrift reserves for a function's return value in a reply
/// struct.
const FIELD_SUCCESS: i16 = 0;
const EXCEPTION_FIELD_MESSAGE: i16 = 1;
const EXCEPTION_FIELD_TYPE: i16 = 2;

pub const METHOD_PUSH: &str = "push";
pub const METHOD_PULL: &str = "pull";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Call,
    Reply,
    Exception,
}

/// The payload of one decoded message, after the generic header/name/seqid
/// framing has been stripped off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// `push`'s single argument, or `pull`'s reply.
    Bytes(Vec<u8>),
    /// `pull`'s (empty) argument struct, or `push`'s (empty) void reply.
    Empty,
    /// A `TApplicationException`.
    Exception { message: String, kind: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub method: String,
    pub seqid: i32,
    pub kind: MessageKind,
    pub body: Body,
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn string(&mut self, s: &str) {
        self.i32(s.len() as i32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn binary(&mut self, bytes: &[u8]) {
        self.i32(bytes.len() as i32);
        self.buf.extend_from_slice(bytes);
    }

    fn message_header(&mut self, method: &str, kind: u8, seqid: i32) {
        self.u32(VERSION_1 | kind as u32);
        self.string(method);
        self.i32(seqid);
    }

    fn finish_framed(self) -> Vec<u8> {
        let mut framed = Vec::with_capacity(4 + self.buf.len());
        framed.extend_from_slice(&(self.buf.len() as u32).to_be_bytes());
        framed.extend_from_slice(&self.buf);
        framed
    }
}

/// Encode a `push(payload)` call.
pub fn encode_push_call(seqid: i32, payload: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.message_header(METHOD_PUSH, MSG_CALL, seqid);
    w.u8(TYPE_STRING);
    w.i16(1);
    w.binary(payload);
    w.u8(TYPE_STOP);
    w.finish_framed()
}

/// Encode a `pull()` call (no arguments).
pub fn encode_pull_call(seqid: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.message_header(METHOD_PULL, MSG_CALL, seqid);
    w.u8(TYPE_STOP);
    w.finish_framed()
}

/// Encode `push`'s void reply.
pub fn encode_push_reply(seqid: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.message_header(METHOD_PUSH, MSG_REPLY, seqid);
    w.u8(TYPE_STOP);
    w.finish_framed()
}

/// Encode `pull`'s binary reply.
pub fn encode_pull_reply(seqid: i32, payload: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.message_header(METHOD_PULL, MSG_REPLY, seqid);
    w.u8(TYPE_STRING);
    w.i16(FIELD_SUCCESS);
    w.binary(payload);
    w.u8(TYPE_STOP);
    w.finish_framed()
}

/// Encode a `TApplicationException` reply for `method`.
pub fn encode_exception(method: &str, seqid: i32, message: &str, kind: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.message_header(method, MSG_EXCEPTION, seqid);
    w.u8(TYPE_STRING);
    w.i16(EXCEPTION_FIELD_MESSAGE);
    w.string(message);
    w.u8(TYPE_I32);
    w.i16(EXCEPTION_FIELD_TYPE);
    w.i32(kind);
    w.u8(TYPE_STOP);
    w.finish_framed()
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TransportError> {
        if self.buf.len() < self.pos + n {
            return Err(TransportError::Protocol("unexpected end of frame".into()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, TransportError> {
        Ok(self.take(1)?[0])
    }

    fn i16(&mut self) -> Result<i16, TransportError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, TransportError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, TransportError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, TransportError> {
        let len = self.i32()?;
        if len < 0 {
            return Err(TransportError::Protocol("negative string length".into()));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    fn binary(&mut self) -> Result<Vec<u8>, TransportError> {
        let len = self.i32()?;
        if len < 0 {
            return Err(TransportError::Protocol("negative binary length".into()));
        }
        Ok(self.take(len as usize)?.to_vec())
    }
}

/// Decode one unframed message body (the caller has already stripped the
/// 4-byte length prefix, e.g. via [`crate::framing`]).
pub fn decode_message(buf: &[u8]) -> Result<Message, TransportError> {
    let mut r = Reader::new(buf);
    let header = r.u32()?;
    if header & VERSION_MASK != VERSION_1 {
        return Err(TransportError::Protocol(format!("unsupported protocol version: {header:#x}")));
    }
    let kind = match (header & 0x0000_00ff) as u8 {
        MSG_CALL => MessageKind::Call,
        MSG_REPLY => MessageKind::Reply,
        MSG_EXCEPTION => MessageKind::Exception,
        other => return Err(TransportError::Protocol(format!("unsupported message type: {other}"))),
    };
    let method = r.string()?;
    let seqid = r.i32()?;

    let body = match kind {
        MessageKind::Exception => {
            let mut message = String::new();
            let mut exn_kind = 0i32;
            loop {
                let field_type = r.u8()?;
                if field_type == TYPE_STOP {
                    break;
                }
                let field_id = r.i16()?;
                match (field_id, field_type) {
                    (EXCEPTION_FIELD_MESSAGE, TYPE_STRING) => message = r.string()?,
                    (EXCEPTION_FIELD_TYPE, TYPE_I32) => exn_kind = r.i32()?,
                    _ => return Err(TransportError::Protocol("unexpected exception field".into())),
                }
            }
            Body::Exception { message, kind: exn_kind }
        }
        MessageKind::Call | MessageKind::Reply => {
            let field_type = r.u8()?;
            if field_type == TYPE_STOP {
                Body::Empty
            } else if field_type == TYPE_STRING {
                let _field_id = r.i16()?;
                let bytes = r.binary()?;
                let stop = r.u8()?;
                if stop != TYPE_STOP {
                    return Err(TransportError::Protocol("expected single-field struct".into()));
                }
                Body::Bytes(bytes)
            } else {
                return Err(TransportError::Protocol(format!("unexpected field type: {field_type}")));
            }
        }
    };

    Ok(Message { method, seqid, kind, body })
}
