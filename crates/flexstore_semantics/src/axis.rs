//! Semantics axes and their levels.

use crate::error::{SemanticsError, SemanticsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four independently configurable semantics axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Axis {
    /// When writes become visible to readers.
    Consistency = 0,
    /// How overlapping access from several clients is handled.
    Concurrency = 1,
    /// When written data becomes durable.
    Persistency = 2,
    /// Whether access checks are enforced.
    Security = 3,
}

impl Axis {
    /// All axes, in code order.
    pub const ALL: [Axis; 4] = [
        Axis::Consistency,
        Axis::Concurrency,
        Axis::Persistency,
        Axis::Security,
    ];

    /// Converts an integer code to an axis.
    ///
    /// # Errors
    ///
    /// Returns [`SemanticsError::UnknownAxis`] if the code is not recognized.
    pub fn from_code(code: u8) -> SemanticsResult<Self> {
        match code {
            0 => Ok(Self::Consistency),
            1 => Ok(Self::Concurrency),
            2 => Ok(Self::Persistency),
            3 => Ok(Self::Security),
            other => Err(SemanticsError::unknown_axis(other)),
        }
    }

    /// Returns the integer code of this axis.
    #[must_use]
    pub const fn as_code(self) -> u8 {
        self as u8
    }

    /// Returns the lowercase name used in semantics strings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Consistency => "consistency",
            Self::Concurrency => "concurrency",
            Self::Persistency => "persistency",
            Self::Security => "security",
        }
    }

    /// Returns the strictest level code for this axis.
    #[must_use]
    pub const fn strictest(self) -> u8 {
        match self {
            Self::Consistency => Consistency::STRICTEST.as_code(),
            Self::Concurrency => Concurrency::STRICTEST.as_code(),
            Self::Persistency => Persistency::STRICTEST.as_code(),
            Self::Security => Security::STRICTEST.as_code(),
        }
    }

    /// Checks that `code` names a level of this axis.
    pub(crate) fn validate(self, code: u8) -> SemanticsResult<u8> {
        match self {
            Self::Consistency => Consistency::from_code(code).map(Consistency::as_code),
            Self::Concurrency => Concurrency::from_code(code).map(Concurrency::as_code),
            Self::Persistency => Persistency::from_code(code).map(Persistency::as_code),
            Self::Security => Security::from_code(code).map(Security::as_code),
        }
    }

    /// Parses a level name for this axis and returns its code.
    pub(crate) fn parse_level(self, value: &str) -> SemanticsResult<u8> {
        Ok(match self {
            Self::Consistency => value.parse::<Consistency>()?.as_code(),
            Self::Concurrency => value.parse::<Concurrency>()?.as_code(),
            Self::Persistency => value.parse::<Persistency>()?.as_code(),
            Self::Security => value.parse::<Security>()?.as_code(),
        })
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = SemanticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Axis::ALL
            .into_iter()
            .find(|axis| axis.name() == s)
            .ok_or_else(|| SemanticsError::unknown_axis(s))
    }
}

/// Defines a level enum whose variants are listed from laxest to strictest.
macro_rules! levels {
    (
        $(#[$meta:meta])*
        $name:ident, $axis:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $text:literal ),+ $(,)?
        }
        strictest = $strict:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code, )+
        }

        impl $name {
            /// The strictest level, used by default.
            pub const STRICTEST: Self = Self::$strict;

            /// Converts an integer code to a level.
            ///
            /// # Errors
            ///
            /// Returns [`SemanticsError::InvalidLevel`] if the code is not a level of this axis.
            pub fn from_code(code: u8) -> SemanticsResult<Self> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    other => Err(SemanticsError::invalid_level($axis, other)),
                }
            }

            /// Returns the integer code of this level.
            #[must_use]
            pub const fn as_code(self) -> u8 {
                self as u8
            }

            /// Returns the name used in semantics strings.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::STRICTEST
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = SemanticsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    other => Err(SemanticsError::invalid_level($axis, other)),
                }
            }
        }
    };
}

levels! {
    /// Consistency level: when a write becomes visible to other clients.
    Consistency, "consistency" {
        /// No visibility guarantee.
        None = 0 => "none",
        /// Visible within the writing session.
        Session = 1 => "session",
        /// Visible to everyone eventually.
        Eventual = 2 => "eventual",
        /// Visible to everyone once the operation returns.
        Immediate = 3 => "immediate",
    }
    strictest = Immediate
}

levels! {
    /// Concurrency level: what overlap between clients the caller allows for.
    Concurrency, "concurrency" {
        /// No concurrent access happens.
        None = 0 => "none",
        /// Concurrent accesses never touch the same data.
        NonOverlapping = 1 => "non-overlapping",
        /// Concurrent accesses may overlap and must be serialized.
        Overlapping = 2 => "overlapping",
    }
    strictest = Overlapping
}

levels! {
    /// Persistency level: when written data must be durable.
    Persistency, "persistency" {
        /// Data may never reach stable storage.
        None = 0 => "none",
        /// Data reaches stable storage eventually.
        Eventual = 1 => "eventual",
        /// Data is on stable storage once the operation returns.
        Immediate = 2 => "immediate",
    }
    strictest = Immediate
}

levels! {
    /// Security level: whether access checks are enforced.
    Security, "security" {
        /// No access checks.
        None = 0 => "none",
        /// Every access is checked.
        Strict = 1 => "strict",
    }
    strictest = Strict
}
