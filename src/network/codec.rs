// src/network/codec.rs

use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CourierError;

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Length-prefixed frames carrying one bincode-encoded message each.
///
/// Wire format: `u32 payload length (big endian) || payload`.
#[derive(Debug)]
pub struct FrameCodec<T> {
  max_frame_length: usize,
  decoding_state: DecodingState,
  _message: PhantomData<fn() -> T>,
}

#[derive(Debug, Default, Clone, Copy)]
enum DecodingState {
  #[default]
  ReadHeader, // Waiting for the length prefix
  ReadBody(usize), // Waiting for this many payload bytes
}

impl<T> FrameCodec<T> {
  pub fn new(max_frame_length: usize) -> Self {
    Self {
      max_frame_length: max_frame_length.min(u32::MAX as usize),
      decoding_state: DecodingState::default(),
      _message: PhantomData,
    }
  }
}

impl<T: DeserializeOwned> Decoder for FrameCodec<T> {
  type Item = T;
  type Error = CourierError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>, CourierError> {
    loop {
      match self.decoding_state {
        DecodingState::ReadHeader => {
          if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
          }
          let size = src.get_u32() as usize;
          if size > self.max_frame_length {
            return Err(CourierError::FrameTooLarge {
              size,
              limit: self.max_frame_length,
            });
          }
          src.reserve(size);
          self.decoding_state = DecodingState::ReadBody(size);
        }
        DecodingState::ReadBody(size) => {
          if src.len() < size {
            return Ok(None);
          }
          let payload = src.split_to(size);
          self.decoding_state = DecodingState::ReadHeader;
          let message = bincode::deserialize(&payload).map_err(|e| CourierError::CorruptMessage(e.to_string()))?;
          return Ok(Some(message));
        }
      }
    }
  }
}

impl<T: Serialize> Encoder<T> for FrameCodec<T> {
  type Error = CourierError;

  fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), CourierError> {
    let payload = bincode::serialize(&item).map_err(|e| CourierError::EncodeFailed(e.to_string()))?;
    if payload.len() > self.max_frame_length {
      return Err(CourierError::FrameTooLarge {
        size: payload.len(),
        limit: self.max_frame_length,
      });
    }
    dst.reserve(LENGTH_PREFIX_LEN + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(&payload);
    Ok(())
  }
}
