//! The shared semantics descriptor.

use crate::axis::{Axis, Concurrency, Consistency, Persistency, Security};
use crate::error::{SemanticsError, SemanticsResult};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

/// Storage for the four axes. Each cell always holds a valid level code.
#[derive(Debug)]
struct Axes {
    consistency: AtomicU8,
    concurrency: AtomicU8,
    persistency: AtomicU8,
    security: AtomicU8,
}

impl Axes {
    fn cell(&self, axis: Axis) -> &AtomicU8 {
        match axis {
            Axis::Consistency => &self.consistency,
            Axis::Concurrency => &self.concurrency,
            Axis::Persistency => &self.persistency,
            Axis::Security => &self.security,
        }
    }
}

/// A shared, mutable-in-place semantics descriptor.
///
/// Cloning (or calling [`share`](Self::share)) hands out another reference to
/// the same instance; dropping a handle releases that reference. The instance
/// is freed once the last handle is gone.
///
/// Writes through [`set`](Self::set) are visible to every holder immediately.
/// There is no copy-on-write: use [`detach`](Self::detach) to get an
/// independent descriptor.
///
/// # Example
///
/// ```rust
/// use flexstore_semantics::{Concurrency, Semantics};
///
/// let a = Semantics::new();
/// let b = a.share();
/// assert_eq!(a.ref_count(), 2);
///
/// b.set_concurrency(Concurrency::None);
/// assert_eq!(a.concurrency(), Concurrency::None);
///
/// drop(b);
/// assert_eq!(a.ref_count(), 1);
/// ```
#[derive(Clone)]
pub struct Semantics {
    inner: Arc<Axes>,
}

impl Semantics {
    /// Creates a descriptor with every axis at its strictest level.
    #[must_use]
    pub fn new() -> Self {
        Self::from_snapshot(SemanticsSnapshot::default())
    }

    /// Creates a descriptor initialized from a template.
    #[must_use]
    pub fn from_template(template: Template) -> Self {
        Self::from_snapshot(template.snapshot())
    }

    /// Creates a descriptor from a template, then applies overrides.
    ///
    /// Overrides are comma-separated `axis=level` pairs, for example
    /// `"consistency=eventual,persistency=none"`. Whitespace around
    /// pairs is ignored and an empty string applies nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if an axis or level is not recognized, or a pair
    /// is missing its `=`.
    pub fn parse_with_template(template: Template, overrides: &str) -> SemanticsResult<Self> {
        let mut snapshot = template.snapshot();
        snapshot.apply_str(overrides)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Creates a descriptor holding the given levels.
    #[must_use]
    pub fn from_snapshot(snapshot: SemanticsSnapshot) -> Self {
        Self {
            inner: Arc::new(Axes {
                consistency: AtomicU8::new(snapshot.consistency.as_code()),
                concurrency: AtomicU8::new(snapshot.concurrency.as_code()),
                persistency: AtomicU8::new(snapshot.persistency.as_code()),
                security: AtomicU8::new(snapshot.security.as_code()),
            }),
        }
    }

    /// Returns another reference to this same descriptor.
    #[must_use]
    pub fn share(&self) -> Self {
        self.clone()
    }

    /// Returns an independent descriptor with the current levels.
    #[must_use]
    pub fn detach(&self) -> Self {
        Self::from_snapshot(self.snapshot())
    }

    /// Returns the number of live references to this descriptor.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns a weak reference that does not keep the descriptor alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakSemantics {
        WeakSemantics {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reads the level code of an axis.
    #[must_use]
    pub fn get(&self, axis: Axis) -> u8 {
        self.inner.cell(axis).load(Ordering::Acquire)
    }

    /// Overwrites one axis with a level code.
    ///
    /// # Errors
    ///
    /// Returns [`SemanticsError::InvalidLevel`] if `level` is not a level of
    /// `axis`. The descriptor is left unchanged.
    pub fn set(&self, axis: Axis, level: u8) -> SemanticsResult<()> {
        let level = axis.validate(level)?;
        self.inner.cell(axis).store(level, Ordering::Release);
        Ok(())
    }

    /// Integer form of [`get`](Self::get) for callers holding raw axis codes.
    ///
    /// # Errors
    ///
    /// Returns [`SemanticsError::UnknownAxis`] for an unrecognized axis code.
    pub fn get_raw(&self, axis: u8) -> SemanticsResult<u8> {
        Ok(self.get(Axis::from_code(axis)?))
    }

    /// Integer form of [`set`](Self::set) for callers holding raw axis codes.
    ///
    /// # Errors
    ///
    /// Returns an error for an unrecognized axis or level code.
    pub fn set_raw(&self, axis: u8, level: u8) -> SemanticsResult<()> {
        self.set(Axis::from_code(axis)?, level)
    }

    /// Returns the consistency level.
    #[must_use]
    pub fn consistency(&self) -> Consistency {
        Consistency::from_code(self.get(Axis::Consistency)).unwrap_or(Consistency::STRICTEST)
    }

    /// Returns the concurrency level.
    #[must_use]
    pub fn concurrency(&self) -> Concurrency {
        Concurrency::from_code(self.get(Axis::Concurrency)).unwrap_or(Concurrency::STRICTEST)
    }

    /// Returns the persistency level.
    #[must_use]
    pub fn persistency(&self) -> Persistency {
        Persistency::from_code(self.get(Axis::Persistency)).unwrap_or(Persistency::STRICTEST)
    }

    /// Returns the security level.
    #[must_use]
    pub fn security(&self) -> Security {
        Security::from_code(self.get(Axis::Security)).unwrap_or(Security::STRICTEST)
    }

    /// Sets the consistency level.
    pub fn set_consistency(&self, level: Consistency) {
        self.store(Axis::Consistency, level.as_code());
    }

    /// Sets the concurrency level.
    pub fn set_concurrency(&self, level: Concurrency) {
        self.store(Axis::Concurrency, level.as_code());
    }

    /// Sets the persistency level.
    pub fn set_persistency(&self, level: Persistency) {
        self.store(Axis::Persistency, level.as_code());
    }

    /// Sets the security level.
    pub fn set_security(&self, level: Security) {
        self.store(Axis::Security, level.as_code());
    }

    /// Returns a plain copy of the current levels.
    #[must_use]
    pub fn snapshot(&self) -> SemanticsSnapshot {
        SemanticsSnapshot {
            consistency: self.consistency(),
            concurrency: self.concurrency(),
            persistency: self.persistency(),
            security: self.security(),
        }
    }

    fn store(&self, axis: Axis, code: u8) {
        self.inner.cell(axis).store(code, Ordering::Release);
    }
}

impl Default for Semantics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semantics")
            .field("levels", &self.snapshot())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

impl From<SemanticsSnapshot> for Semantics {
    fn from(snapshot: SemanticsSnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

/// A weak reference to a [`Semantics`] descriptor.
#[derive(Debug, Clone)]
pub struct WeakSemantics {
    inner: Weak<Axes>,
}

impl WeakSemantics {
    /// Returns a strong handle if the descriptor is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Semantics> {
        self.inner.upgrade().map(|inner| Semantics { inner })
    }

    /// Returns true once every strong handle has been dropped.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

/// A plain, unshared copy of the four levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticsSnapshot {
    /// Consistency level.
    pub consistency: Consistency,
    /// Concurrency level.
    pub concurrency: Concurrency,
    /// Persistency level.
    pub persistency: Persistency,
    /// Security level.
    pub security: Security,
}

impl SemanticsSnapshot {
    /// Applies comma-separated `axis=level` overrides.
    ///
    /// On error the snapshot may hold the overrides that preceded the bad pair.
    pub(crate) fn apply_str(&mut self, overrides: &str) -> SemanticsResult<()> {
        for pair in overrides.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (axis, level) = pair
                .split_once('=')
                .ok_or_else(|| SemanticsError::malformed(format!("missing '=' in {pair:?}")))?;
            let axis: Axis = axis.trim().parse()?;
            self.set_code(axis, axis.parse_level(level.trim())?)?;
        }
        Ok(())
    }

    fn set_code(&mut self, axis: Axis, code: u8) -> SemanticsResult<()> {
        match axis {
            Axis::Consistency => self.consistency = Consistency::from_code(code)?,
            Axis::Concurrency => self.concurrency = Concurrency::from_code(code)?,
            Axis::Persistency => self.persistency = Persistency::from_code(code)?,
            Axis::Security => self.security = Security::from_code(code)?,
        }
        Ok(())
    }
}
