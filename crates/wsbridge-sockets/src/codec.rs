//! Message codecs.
//!
//! A codec turns application values into frame payloads and back. Two ship
//! with the crate:
//!
//! - [`RawCodec`] (see [`messages`]): frames carry plain strings, unchanged.
//! - [`JsonCodec`] (see [`json`]): frames carry a JSON document of a
//!   caller-declared shape.

use std::fmt;
use std::marker::PhantomData;

use axum::extract::ws::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SocketError;

/// Kind of data frame a codec writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// Encode/decode strategy between application values and frame payloads.
pub trait Codec: Send + Sync + 'static {
    /// Application value carried by the handler channels.
    type Item: Send + 'static;

    /// Frame kind used for outbound messages.
    fn frame_kind(&self) -> FrameKind;

    /// Serialize a value into a frame payload.
    fn encode(&self, item: &Self::Item) -> Result<Vec<u8>, SocketError>;

    /// Parse a frame payload.
    fn decode(&self, payload: &[u8]) -> Result<Self::Item, SocketError>;
}

/// Encode `item` and wrap it in a frame of the codec's kind.
pub(crate) fn to_frame<C: Codec + ?Sized>(codec: &C, item: &C::Item) -> Result<Message, SocketError> {
    let payload = codec.encode(item)?;
    match codec.frame_kind() {
        FrameKind::Text => String::from_utf8(payload)
            .map(|text| Message::Text(text.into()))
            .map_err(|e| SocketError::Encode(e.to_string())),
        FrameKind::Binary => Ok(Message::Binary(payload.into())),
    }
}

/// Plain string codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Item = String;

    fn frame_kind(&self) -> FrameKind {
        FrameKind::Text
    }

    fn encode(&self, item: &String) -> Result<Vec<u8>, SocketError> {
        Ok(item.as_bytes().to_vec())
    }

    fn decode(&self, payload: &[u8]) -> Result<String, SocketError> {
        std::str::from_utf8(payload)
            .map(str::to_owned)
            .map_err(|e| SocketError::Decode(e.to_string()))
    }
}

/// JSON codec for values of type `T`.
pub struct JsonCodec<T> {
    _shape: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _shape: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("shape", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Item = T;

    fn frame_kind(&self) -> FrameKind {
        FrameKind::Text
    }

    fn encode(&self, item: &T) -> Result<Vec<u8>, SocketError> {
        serde_json::to_vec(item).map_err(|e| SocketError::Encode(e.to_string()))
    }

    fn decode(&self, payload: &[u8]) -> Result<T, SocketError> {
        serde_json::from_slice(payload).map_err(|e| SocketError::Decode(e.to_string()))
    }
}

/// Raw string codec.
pub fn messages() -> RawCodec {
    RawCodec
}

/// JSON codec for `T`.
pub fn json<T>() -> JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    JsonCodec::new()
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
