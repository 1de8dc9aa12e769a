// SPDX-License-Identifier: MIT

//! Concurrency-safe memoization of compiled templates.
//!
//! The style set is small and fixed, so entries live for the process
//! lifetime and there is no eviction. This is a pure performance layer:
//! behavior is identical with the cache disabled.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::domain::CommitStyle;
use crate::error::Result;

use super::{CompiledTemplate, compile};

static GLOBAL: LazyLock<TemplateCache> = LazyLock::new(TemplateCache::new);

#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<CommitStyle, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared across concurrent invocations.
    pub fn global() -> &'static TemplateCache {
        &GLOBAL
    }

    pub fn get(&self, style: CommitStyle) -> Option<Arc<CompiledTemplate>> {
        self.entries.read().get(&style).cloned()
    }

    pub fn insert(&self, style: CommitStyle, template: Arc<CompiledTemplate>) {
        self.entries.write().insert(style, template);
    }

    /// Fetch the compiled template for a style, compiling it at most once
    /// across racing callers.
    ///
    /// Double-checked locking: a fast shared-lock read, then a re-check
    /// under the exclusive lock before compiling, so N callers racing on a
    /// cold cache produce exactly one compilation.
    pub fn get_or_compile(&self, style: CommitStyle) -> Result<Arc<CompiledTemplate>> {
        if let Some(hit) = self.entries.read().get(&style) {
            return Ok(Arc::clone(hit));
        }

        let mut entries = self.entries.write();
        if let Some(hit) = entries.get(&style) {
            // Another caller compiled while we waited on the lock
            return Ok(Arc::clone(hit));
        }

        let compiled = Arc::new(compile(style)?);
        entries.insert(style, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Drop every entry. Intended for tests that need a cold cache.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
