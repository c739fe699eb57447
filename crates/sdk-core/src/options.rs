// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// # Engine options
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, derive_builder::Builder)]
#[builder(default)]
pub struct Options {
    /// # Message size warning
    ///
    /// Threshold to log a warning in case protocol messages coming from the runtime
    /// are larger than the specified amount.
    message_size_warning: usize,

    /// # Message size limit
    ///
    /// Threshold to fail the invocation in case protocol messages coming from the
    /// runtime are larger than the specified amount.
    message_size_limit: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            message_size_warning: 10 * 1024 * 1024,
            message_size_limit: None,
        }
    }
}

impl Options {
    pub fn message_size_warning(&self) -> usize {
        self.message_size_warning
    }

    pub fn message_size_limit(&self) -> Option<usize> {
        self.message_size_limit
    }
}
