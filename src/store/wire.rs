/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Conversion between in-memory entities and the bytes persisted in the engine.
//!
//! Every value the store writes is the Borsh serialization of its entity. Both
//! directions treat failure as unrecoverable: a value that cannot be serialized
//! indicates a bug in the calling code, and persisted bytes that cannot be
//! deserialized indicate corruption on disk. In either case the store cannot keep its
//! guarantees, so these functions panic instead of returning errors.

use borsh::{BorshDeserialize, BorshSerialize};

/// Serialize `value` into the bytes stored in the engine.
///
/// # Panics
///
/// Panics if serialization fails.
pub(crate) fn encode<T: BorshSerialize>(value: &T) -> Vec<u8> {
    value
        .try_to_vec()
        .unwrap_or_else(|err| panic!("unable to serialize value: {}", err))
}

/// Deserialize an entity out of bytes read from the engine. `what` names the entity
/// for the panic message.
///
/// # Panics
///
/// Panics if `bytes` do not deserialize into `T`.
pub(crate) fn decode<T: BorshDeserialize>(what: &str, bytes: &[u8]) -> T {
    T::deserialize(&mut &*bytes)
        .unwrap_or_else(|err| panic!("error reading {}: {}", what, err))
}
