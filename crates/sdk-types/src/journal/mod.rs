// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Model of the invocation journal: the ordered log of entries recording
//! each action taken by user code, replayed deterministically on retries.

mod entries;

pub use entries::*;

use bytes::Bytes;
use bytestring::ByteString;

pub use crate::identifiers::EntryIndex;
