// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Cache of the user state, seeded from the start message and kept
//! consistent with the writes of the current invocation.

use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EagerGet {
    /// The key was set or cleared by this invocation. No journal entry is
    /// produced for reads of such keys.
    Local(Option<Bytes>),
    /// Known from the runtime-provided state or a previous read. A completed
    /// get entry is synthesized locally, without a runtime round trip.
    Cached(Option<Bytes>),
    /// Not covered by a partial state map; the runtime has to answer.
    Unknown,
}

#[derive(Debug)]
pub(crate) struct EagerState {
    map: HashMap<Bytes, Bytes>,
    /// Keys learned to be absent. Only relevant under a partial state map;
    /// with a complete one, absence from `map` is authoritative already.
    known_absent: HashSet<Bytes>,
    complete: bool,
    locally_touched: HashSet<Bytes>,
}

impl EagerState {
    pub(crate) fn new(map: HashMap<Bytes, Bytes>, complete: bool) -> Self {
        Self {
            map,
            known_absent: HashSet::new(),
            complete,
            locally_touched: HashSet::new(),
        }
    }

    pub(crate) fn get(&self, key: &Bytes) -> EagerGet {
        if self.locally_touched.contains(key) {
            return EagerGet::Local(self.map.get(key).cloned());
        }
        match self.map.get(key) {
            Some(value) => EagerGet::Cached(Some(value.clone())),
            None if self.complete || self.known_absent.contains(key) => EagerGet::Cached(None),
            None => EagerGet::Unknown,
        }
    }

    pub(crate) fn set(&mut self, key: Bytes, value: Bytes) {
        self.locally_touched.insert(key.clone());
        self.known_absent.remove(&key);
        self.map.insert(key, value);
    }

    pub(crate) fn clear(&mut self, key: Bytes) {
        self.locally_touched.insert(key.clone());
        self.map.remove(&key);
    }

    /// Feeds back a value learned from the runtime (a replayed get result or
    /// a get completion). A key touched locally in the meantime stays
    /// authoritative.
    pub(crate) fn learn(&mut self, key: Bytes, value: Option<Bytes>) {
        if self.locally_touched.contains(&key) {
            return;
        }
        match value {
            Some(value) => {
                self.known_absent.remove(&key);
                self.map.insert(key, value);
            }
            None => {
                self.map.remove(&key);
                self.known_absent.insert(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn complete_state_answers_missing_keys() {
        let state = EagerState::new(HashMap::from([(k("a"), k("1"))]), true);
        assert_eq!(state.get(&k("a")), EagerGet::Cached(Some(k("1"))));
        assert_eq!(state.get(&k("b")), EagerGet::Cached(None));
    }

    #[test]
    fn partial_state_misses_unknown_keys() {
        let state = EagerState::new(HashMap::from([(k("a"), k("1"))]), false);
        assert_eq!(state.get(&k("a")), EagerGet::Cached(Some(k("1"))));
        assert_eq!(state.get(&k("b")), EagerGet::Unknown);
    }

    #[test]
    fn local_writes_take_over() {
        let mut state = EagerState::new(HashMap::from([(k("a"), k("1"))]), false);
        state.set(k("a"), k("2"));
        assert_eq!(state.get(&k("a")), EagerGet::Local(Some(k("2"))));
        state.clear(k("a"));
        assert_eq!(state.get(&k("a")), EagerGet::Local(None));
        // Learned values never override local writes.
        state.learn(k("a"), Some(k("3")));
        assert_eq!(state.get(&k("a")), EagerGet::Local(None));
    }

    #[test]
    fn learned_values_resolve_later_reads() {
        let mut state = EagerState::new(HashMap::new(), false);
        assert_eq!(state.get(&k("a")), EagerGet::Unknown);
        state.learn(k("a"), None);
        assert_eq!(state.get(&k("a")), EagerGet::Cached(None));
        state.learn(k("a"), Some(k("1")));
        assert_eq!(state.get(&k("a")), EagerGet::Cached(Some(k("1"))));
    }
}
