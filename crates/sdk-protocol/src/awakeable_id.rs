// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use bytes::{BufMut, Bytes, BytesMut};
use restate_sdk_types::identifiers::{EntryIndex, InvocationId};
use std::fmt::Display;
use std::mem::size_of;
use std::str::FromStr;

/// Externally addressable identifier of an awakeable: the invocation that
/// created it plus the index of its Awakeable journal entry.
///
/// Encoded as base64 for wider language support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwakeableIdentifier {
    invocation_id: InvocationId,
    entry_index: EntryIndex,
}

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum AwakeableIdDecodeError {
    #[error("bad length")]
    Length,
    #[error("base64 decode error")]
    Codec,
}

impl AwakeableIdentifier {
    pub fn new(invocation_id: InvocationId, entry_index: EntryIndex) -> Self {
        Self {
            invocation_id,
            entry_index,
        }
    }

    pub fn into_inner(self) -> (InvocationId, EntryIndex) {
        (self.invocation_id, self.entry_index)
    }
}

impl FromStr for AwakeableIdentifier {
    type Err = AwakeableIdDecodeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let buffer = URL_SAFE
            .decode(input)
            .map_err(|_| AwakeableIdDecodeError::Codec)?;

        if buffer.len() <= size_of::<EntryIndex>() {
            return Err(AwakeableIdDecodeError::Length);
        }

        let boundary = buffer.len() - size_of::<EntryIndex>();
        let invocation_id = InvocationId::new(Bytes::copy_from_slice(&buffer[..boundary]));
        let entry_index = EntryIndex::from_be_bytes(
            buffer[boundary..]
                .try_into()
                // Unwrap is safe because we check the size above.
                .unwrap(),
        );

        Ok(Self {
            invocation_id,
            entry_index,
        })
    }
}

impl Display for AwakeableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut input_buf = BytesMut::with_capacity(
            self.invocation_id.as_bytes().len() + size_of::<EntryIndex>(),
        );
        input_buf.put_slice(self.invocation_id.as_bytes());
        input_buf.put_u32(self.entry_index);
        std::fmt::Display::fmt(&URL_SAFE.encode(input_buf.freeze()), f)
    }
}
