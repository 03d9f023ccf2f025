//! Predefined semantics templates.

use crate::axis::{Concurrency, Consistency, Persistency, Security};
use crate::error::SemanticsError;
use crate::semantics::SemanticsSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named starting point for a semantics descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    /// Every axis at its strictest level.
    #[default]
    Default,
    /// Close to what a POSIX file system offers: immediate visibility,
    /// durability on explicit sync, no access checks.
    Posix,
    /// Scratch data that only the local process sees and may lose.
    TemporaryLocal,
}

impl Template {
    /// Returns the levels this template starts from.
    #[must_use]
    pub fn snapshot(self) -> SemanticsSnapshot {
        match self {
            Self::Default => SemanticsSnapshot::default(),
            Self::Posix => SemanticsSnapshot {
                consistency: Consistency::Immediate,
                concurrency: Concurrency::Overlapping,
                persistency: Persistency::Eventual,
                security: Security::None,
            },
            Self::TemporaryLocal => SemanticsSnapshot {
                consistency: Consistency::None,
                concurrency: Concurrency::NonOverlapping,
                persistency: Persistency::None,
                security: Security::None,
            },
        }
    }

    /// Returns the template name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Posix => "posix",
            Self::TemporaryLocal => "temporary-local",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Template {
    type Err = SemanticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "posix" => Ok(Self::Posix),
            "temporary-local" => Ok(Self::TemporaryLocal),
            other => Err(SemanticsError::UnknownTemplate {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_is_strictest() {
        let snapshot = Template::Default.snapshot();
        assert_eq!(snapshot.consistency, Consistency::STRICTEST);
        assert_eq!(snapshot.concurrency, Concurrency::STRICTEST);
        assert_eq!(snapshot.persistency, Persistency::STRICTEST);
        assert_eq!(snapshot.security, Security::STRICTEST);
    }

    #[test]
    fn temporary_local_relaxes_persistency() {
        assert_eq!(
            Template::TemporaryLocal.snapshot().persistency,
            Persistency::None
        );
    }

    #[test]
    fn template_names_parse() {
        for template in [Template::Default, Template::Posix, Template::TemporaryLocal] {
            assert_eq!(template.name().parse::<Template>().unwrap(), template);
        }
        assert!(matches!(
            "batch".parse::<Template>(),
            Err(SemanticsError::UnknownTemplate { .. })
        ));
    }
}
