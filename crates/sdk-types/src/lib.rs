// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Shared data model of the Restate SDK core: journal entries, completions,
//! identifiers, error taxonomy and the payload (de)serialization seam.

pub mod errors;
pub mod identifiers;
pub mod journal;
pub mod payload;
pub mod time;
