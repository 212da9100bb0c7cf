//! Deduplicating name table.
//!
//! Every type, member and attribute name stored by the registry goes through
//! an [`Interner`]. Interning maps equal bytes to one canonical `Arc<str>` and
//! one [`NameId`], which makes name lookups a single integer probe.
//!
//! Names can be interned on behalf of a module. Such names are evicted in bulk
//! when the module unregisters, unless another module (or the host) interned
//! the same bytes in the meantime, in which case the entry becomes shared and
//! stays.
//!
//! The interner itself is not synchronized; the registry keeps it under its
//! own lock.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{ModuleId, NameId};

/// An interned name: its id plus a shared view of the text.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
    id: NameId,
    text: Arc<str>,
}

impl Name {
    /// The interned id.
    #[inline]
    pub fn id(&self) -> NameId {
        self.id
    }

    /// The name text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// A shared handle to the text.
    #[inline]
    pub fn text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.text, self.id.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug)]
struct Entry {
    text: Arc<str>,
    /// `None` once the entry is shared by the host or several modules.
    owner: Option<ModuleId>,
}

/// Process-wide string table producing stable [`NameId`]s.
#[derive(Debug, Default)]
pub struct Interner {
    by_text: FxHashMap<Arc<str>, NameId>,
    entries: Vec<Option<Entry>>,
}

impl Interner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name on behalf of the host. Host names are never evicted.
    pub fn intern(&mut self, text: &str) -> Name {
        self.intern_in(text, ModuleId::HOST)
    }

    /// Intern a name on behalf of `module`.
    ///
    /// Repeated calls with equal bytes return the same id. If a different
    /// owner interns an existing name, the entry becomes shared.
    pub fn intern_in(&mut self, text: &str, module: ModuleId) -> Name {
        if let Some(&id) = self.by_text.get(text)
            && let Some(entry) = self.entries.get_mut(id.0 as usize).and_then(Option::as_mut)
        {
            if entry.owner.is_some_and(|owner| owner != module) {
                entry.owner = None;
            }
            return Name {
                id,
                text: Arc::clone(&entry.text),
            };
        }

        let id = NameId(self.entries.len() as u32);
        let text: Arc<str> = Arc::from(text);
        let owner = if module.is_host() { None } else { Some(module) };
        self.entries.push(Some(Entry {
            text: Arc::clone(&text),
            owner,
        }));
        self.by_text.insert(Arc::clone(&text), id);
        Name { id, text }
    }

    /// Find a name without inserting it.
    pub fn find(&self, text: &str) -> Option<NameId> {
        self.by_text.get(text).copied()
    }

    /// Find a name and return it with its text.
    pub fn lookup(&self, text: &str) -> Option<Name> {
        self.find(text).and_then(|id| self.name_of(id))
    }

    /// Resolve an id back to its name. `None` if the id was evicted.
    pub fn name_of(&self, id: NameId) -> Option<Name> {
        self.entries
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .map(|entry| Name {
                id,
                text: Arc::clone(&entry.text),
            })
    }

    /// Remove every entry owned exclusively by `module`.
    ///
    /// Returns the number of evicted names. Evicted ids are not reused.
    pub fn evict_module(&mut self, module: ModuleId) -> usize {
        if module.is_host() {
            return 0;
        }

        let mut evicted = 0;
        for slot in &mut self.entries {
            if slot.as_ref().is_some_and(|e| e.owner == Some(module))
                && let Some(entry) = slot.take()
            {
                self.by_text.remove(&entry.text);
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.by_text.len()
    }

    /// True when nothing is interned.
    pub fn is_empty(&self) -> bool {
        self.by_text.is_empty()
    }
}
