//! Element identifiers backed by a global string interner.
//!
//! Snapshots are re-supplied by the host on every update and the reconciler
//! indexes them by id several times per pass, so ids are interned once and
//! then compared and hashed as plain integers.
//!
//! Interned strings are never released, so the interner grows with the
//! number of distinct ids seen over the process lifetime. Ids generated by
//! the library are fixed (the draw-edge pointer) or derived from the
//! elements they connect (path edges), so they are reused across updates
//! rather than minted fresh.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for element identifiers.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Opaque, interned identifier of a node or edge.
///
/// # Examples
///
/// ```
/// use graphview_core::identifier::ElementId;
///
/// let a = ElementId::new("vertex-1");
/// let b: ElementId = "vertex-1".into();
/// assert_eq!(a, b);
/// assert_eq!(a, "vertex-1");
///
/// let parent = a.derive("decorations");
/// assert_eq!(parent.to_string(), "vertex-1::decorations");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(DefaultSymbol);

impl ElementId {
    /// Creates an `ElementId` from &str.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Creates a new id by joining this id and `suffix` with `::`.
    pub fn derive(&self, suffix: &str) -> Self {
        let mut interner = interner();
        let base = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner")
            .to_owned();
        Self(interner.get_or_intern(format!("{base}::{suffix}")))
    }

    /// Calls `f` with the string form of this id without allocating.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        let interner = interner();
        f(interner
            .resolve(self.0)
            .expect("Symbol should exist in interner"))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|value| f.write_str(value))
    }
}

impl From<&str> for ElementId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ElementId {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl PartialEq<str> for ElementId {
    fn eq(&self, other: &str) -> bool {
        self.with_str(|value| value == other)
    }
}

impl PartialEq<&str> for ElementId {
    fn eq(&self, other: &&str) -> bool {
        self.with_str(|value| value == *other)
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with_str(|value| serializer.serialize_str(value))
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}
