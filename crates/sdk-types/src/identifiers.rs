// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::Bytes;
use bytestring::ByteString;
use std::fmt;

/// Index of a journal entry, 0-based and densely assigned.
pub type EntryIndex = u32;

/// Identifier of a single invocation attempt stream.
///
/// Issued by the runtime in the `StartMessage`; the SDK treats it as opaque
/// bytes. It participates in awakeable identifiers, so it must round-trip
/// byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(Bytes);

impl InvocationId {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        InvocationId(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for InvocationId {
    fn from(value: Bytes) -> Self {
        InvocationId(value)
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// The target of an invocation: which service handler is being executed, and
/// for keyed services, on which key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationTarget {
    pub service_name: ByteString,
    pub method_name: ByteString,
    pub key: Option<ByteString>,
}

impl InvocationTarget {
    pub fn new(
        service_name: impl Into<ByteString>,
        method_name: impl Into<ByteString>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            key: None,
        }
    }

    pub fn keyed(
        service_name: impl Into<ByteString>,
        method_name: impl Into<ByteString>,
        key: impl Into<ByteString>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            key: Some(key.into()),
        }
    }
}

impl fmt::Display for InvocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_name, self.method_name)
    }
}
