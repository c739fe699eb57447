// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The ordered log of entries for the current invocation.

use crate::entries::{self, AppliedCompletion};
use crate::error::ProtocolViolation;

use restate_sdk_types::identifiers::EntryIndex;
use restate_sdk_types::journal::{CompletionResult, Entry, EntryType};

/// Journal of the current invocation.
///
/// Entries below `known_entries` were journalled by a previous attempt and
/// are replayed against the operations the handler requests; entries from
/// `known_entries` on are appended fresh. The journal distinguishes the two
/// through [`Journal::replaying`], based on how many operations the handler
/// has performed so far, not on how many entries were received.
#[derive(Debug)]
pub(crate) struct Journal {
    known_entries: u32,
    entries: Vec<Entry>,
    /// Number of operations the user code has performed so far, i.e. the next
    /// journal index to match or append.
    user_index: EntryIndex,
    output_appended: bool,
}

impl Journal {
    pub(crate) fn new(known_entries: u32) -> Self {
        Self {
            known_entries,
            entries: Vec::with_capacity(known_entries as usize),
            user_index: 0,
            output_appended: false,
        }
    }

    pub(crate) fn size(&self) -> u32 {
        self.entries.len() as u32
    }

    pub(crate) fn user_index(&self) -> EntryIndex {
        self.user_index
    }

    /// True while the handler's operations are served from previously
    /// journalled entries.
    pub(crate) fn replaying(&self) -> bool {
        self.user_index < self.known_entries
    }

    /// True once all entries announced in the start message were received.
    pub(crate) fn is_complete(&self) -> bool {
        self.size() >= self.known_entries
    }

    /// Stores an entry received from the runtime for replay.
    pub(crate) fn push_replay_entry(&mut self, entry: Entry) -> EntryIndex {
        debug_assert!(!self.is_complete());
        if entry.ty() == EntryType::OutputStream {
            self.output_appended = true;
        }
        let index = self.size();
        self.entries.push(entry);
        index
    }

    /// The journalled entry the next user operation must match, while replaying.
    pub(crate) fn current_replay_entry(&self) -> Option<&Entry> {
        if !self.replaying() {
            return None;
        }
        self.entries.get(self.user_index as usize)
    }

    /// Marks the current replay entry as consumed by a user operation.
    pub(crate) fn advance_replay(&mut self) -> EntryIndex {
        debug_assert!(self.replaying());
        let index = self.user_index;
        self.user_index += 1;
        index
    }

    /// Appends a fresh entry for a user operation. Only valid in processing
    /// mode, and only before the output entry.
    pub(crate) fn append(&mut self, entry: Entry) -> Result<EntryIndex, ProtocolViolation> {
        if self.replaying() {
            return Err(ProtocolViolation::AppendWhileReplaying);
        }
        if self.output_appended {
            return Err(ProtocolViolation::AppendAfterOutput);
        }
        if entry.ty() == EntryType::OutputStream {
            self.output_appended = true;
        }
        let index = self.size();
        self.entries.push(entry);
        self.user_index = index + 1;
        Ok(index)
    }

    pub(crate) fn get(&self, index: EntryIndex) -> Option<&Entry> {
        self.entries.get(index as usize)
    }

    /// Sets the result of the entry at `index`.
    ///
    /// Retransmissions of the same result are tolerated as idempotent; a
    /// different result for an already completed entry is rejected.
    pub(crate) fn complete(
        &mut self,
        index: EntryIndex,
        result: CompletionResult,
    ) -> Result<AppliedCompletion, ProtocolViolation> {
        let entry = self
            .entries
            .get_mut(index as usize)
            .ok_or(ProtocolViolation::CompletionForUnknownIndex(index))?;
        entries::apply_completion(index, entry, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;

    #[test]
    fn append_rejected_while_replaying() {
        let mut journal = Journal::new(2);
        journal.push_replay_entry(Entry::poll_input_stream("in"));
        journal.push_replay_entry(Entry::clear_state(Bytes::from_static(b"k")));

        assert!(matches!(
            journal.append(Entry::clear_state(Bytes::from_static(b"k"))),
            Err(ProtocolViolation::AppendWhileReplaying)
        ));

        journal.advance_replay();
        journal.advance_replay();
        assert!(!journal.replaying());
        assert_eq!(
            journal
                .append(Entry::clear_state(Bytes::from_static(b"k2")))
                .unwrap(),
            2
        );
    }

    #[test]
    fn append_rejected_after_output() {
        let mut journal = Journal::new(1);
        journal.push_replay_entry(Entry::poll_input_stream("in"));
        journal.advance_replay();

        journal
            .append(Entry::output_stream(
                restate_sdk_types::journal::EntryResult::Success(Bytes::new()),
            ))
            .unwrap();

        assert!(matches!(
            journal.append(Entry::clear_state(Bytes::from_static(b"k"))),
            Err(ProtocolViolation::AppendAfterOutput)
        ));
    }

    #[test]
    fn complete_unknown_index() {
        let mut journal = Journal::new(1);
        assert!(matches!(
            journal.complete(7, CompletionResult::Empty),
            Err(ProtocolViolation::CompletionForUnknownIndex(7))
        ));
    }

    #[test]
    fn indices_are_contiguous() {
        let mut journal = Journal::new(1);
        journal.push_replay_entry(Entry::poll_input_stream("in"));
        assert_eq!(journal.advance_replay(), 0);
        for i in 1..5 {
            assert_eq!(
                journal
                    .append(Entry::clear_state(Bytes::from_static(b"k")))
                    .unwrap(),
                i
            );
        }
        assert_eq!(journal.size(), 5);
    }
}
