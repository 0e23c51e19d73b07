// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process image store.
//
// Keeps page bytes in a map keyed by handle and keeps a per-handle release
// count, so leaks (a handle never released) and double releases are both
// observable.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tracing::{debug, warn};

use scanwerk_core::types::PageHandle;

use crate::traits::ImageStore;

#[derive(Debug, Default)]
struct StoreInner {
    next_handle: u64,
    live: BTreeMap<PageHandle, Vec<u8>>,
    releases: HashMap<PageHandle, u32>,
}

/// `ImageStore` backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes behind a live handle.
    pub fn get(&self, handle: PageHandle) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("image store lock poisoned");
        inner.live.get(&handle).cloned()
    }

    /// Handles registered but not yet released, in allocation order.
    pub fn live_handles(&self) -> Vec<PageHandle> {
        let inner = self.inner.lock().expect("image store lock poisoned");
        inner.live.keys().copied().collect()
    }

    /// How many times `handle` has been released (0 while live).
    pub fn release_count(&self, handle: PageHandle) -> u32 {
        let inner = self.inner.lock().expect("image store lock poisoned");
        inner.releases.get(&handle).copied().unwrap_or(0)
    }

    /// Total number of handles ever registered.
    pub fn registered_count(&self) -> u64 {
        let inner = self.inner.lock().expect("image store lock poisoned");
        inner.next_handle
    }
}

impl ImageStore for InMemoryImageStore {
    fn register(&self, data: Vec<u8>) -> PageHandle {
        let mut inner = self.inner.lock().expect("image store lock poisoned");
        let handle = PageHandle(inner.next_handle);
        inner.next_handle += 1;
        debug!(%handle, bytes = data.len(), "page image registered");
        inner.live.insert(handle, data);
        handle
    }

    fn release(&self, handle: PageHandle) {
        let mut inner = self.inner.lock().expect("image store lock poisoned");
        if inner.live.remove(&handle).is_none() {
            warn!(%handle, "release of an unknown or already released page image");
        }
        *inner.releases.entry(handle).or_insert(0) += 1;
    }
}
