//! Postcard codec for length-delimited framing with serde serialization.
//!
//! Direction-typed: `FrameCodec<Enc, Dec>` encodes `Enc` frames and
//! decodes `Dec` frames, so the client side of a connection and the
//! server side get mirrored codec types and cannot mix them up.

use std::io;
use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Stock commands are tiny; anything close to this is a broken peer.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Wraps [`LengthDelimitedCodec`] with automatic postcard serialization.
#[derive(Debug)]
pub struct FrameCodec<Enc, Dec> {
    inner: LengthDelimitedCodec,
    _marker: PhantomData<fn(Enc) -> Dec>,
}

impl<Enc, Dec> Default for FrameCodec<Enc, Dec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Enc, Dec> FrameCodec<Enc, Dec> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LEN)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<Enc, Dec> Decoder for FrameCodec<Enc, Dec>
where
    Dec: for<'de> Deserialize<'de>,
{
    type Item = Dec;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                let item = postcard::from_bytes(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }
}

impl<Enc, Dec> Encoder<Enc> for FrameCodec<Enc, Dec>
where
    Enc: Serialize,
{
    type Error = io::Error;

    fn encode(&mut self, item: Enc, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = postcard::to_allocvec(&item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.encode(Bytes::from(bytes), dst)
    }
}
