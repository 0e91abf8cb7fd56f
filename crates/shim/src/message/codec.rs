//! Opaque payload encoding.
//!
//! Every typed payload travels inside [`ChaincodeMessage::payload`](super::ChaincodeMessage)
//! as bincode bytes.

use std::any::type_name;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ShimError, ShimResult};

pub fn encode<T: Serialize>(value: &T) -> ShimResult<Bytes> {
    bincode::serialize(value)
        .map(Bytes::from)
        .map_err(|source| ShimError::Encode {
            what: short_name::<T>(),
            source,
        })
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ShimResult<T> {
    bincode::deserialize(bytes).map_err(|source| ShimError::Decode {
        what: short_name::<T>(),
        source,
    })
}

fn short_name<T>() -> &'static str {
    let name = type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
