use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::io;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

pub const OCTET_STREAM: &str = "application/octet-stream";

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";

/// A body delivered as a sequence of byte pieces, read until exhaustion.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Status line and headers of a cached response.
/// Header names are stored lower-cased.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self { status, headers: BTreeMap::new() }
    }

    pub fn with_header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// The payload of a cached response: either materialized bytes or a one-shot stream.
pub enum ResponseBody {
    Full(Bytes),
    Stream(BodyStream),
}

impl ResponseBody {
    /// Wraps `data` in a stream that yields it in a single piece.
    pub fn once(data: Bytes) -> Self {
        ResponseBody::Stream(stream::once(async move { Ok(data) }).boxed())
    }

    /// Splits `data` into pieces of at most `piece_size` bytes.
    pub fn pieces(data: Bytes, piece_size: usize) -> Self {
        let piece_size = piece_size.max(1);
        let pieces: Vec<io::Result<Bytes>> = (0..data.len())
            .step_by(piece_size)
            .map(|start| Ok(data.slice(start..(start + piece_size).min(data.len()))))
            .collect();
        ResponseBody::Stream(stream::iter(pieces).boxed())
    }

    pub fn into_stream(self) -> BodyStream {
        match self {
            ResponseBody::Full(data) => stream::once(async move { Ok(data) }).boxed(),
            ResponseBody::Stream(pieces) => pieces,
        }
    }

    /// Reads the whole body into one buffer.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            ResponseBody::Full(data) => Ok(data),
            ResponseBody::Stream(pieces) => {
                let buf = pieces
                    .try_fold(BytesMut::new(), |mut buf, piece| async move {
                        buf.extend_from_slice(&piece);
                        Ok(buf)
                    })
                    .await?;
                Ok(buf.freeze())
            }
        }
    }
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(data) => f.debug_tuple("Full").field(&data.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A response-shaped value stored under a cache key.
#[derive(Debug)]
pub struct CacheResponse {
    head: ResponseHead,
    body: ResponseBody,
}

impl CacheResponse {
    pub fn new(head: ResponseHead, body: ResponseBody) -> Self {
        Self { head, body }
    }

    /// A `200` response carrying raw bytes, with content type and length set.
    pub fn octet_stream(body: ResponseBody, content_length: usize) -> Self {
        let head = ResponseHead::new(200)
            .with_header(CONTENT_TYPE, OCTET_STREAM)
            .with_header(CONTENT_LENGTH, content_length);
        Self { head, body }
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header(CONTENT_LENGTH).and_then(|len| len.parse().ok())
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    pub fn into_parts(self) -> (ResponseHead, ResponseBody) {
        (self.head, self.body)
    }
}
