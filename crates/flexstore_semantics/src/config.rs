//! Serializable semantics configuration.

use crate::error::SemanticsResult;
use crate::semantics::Semantics;
use crate::template::Template;
use serde::{Deserialize, Serialize};

/// Semantics settings as they appear in a configuration file.
///
/// ```json
/// { "template": "posix", "overrides": "persistency=immediate" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticsConfig {
    /// Template the descriptor starts from.
    pub template: Template,
    /// Comma-separated `axis=level` overrides applied on top of the template.
    pub overrides: String,
}

impl SemanticsConfig {
    /// Creates a configuration for the given template with no overrides.
    #[must_use]
    pub fn new(template: Template) -> Self {
        Self {
            template,
            overrides: String::new(),
        }
    }

    /// Sets the overrides string.
    #[must_use]
    pub fn overrides(mut self, overrides: impl Into<String>) -> Self {
        self.overrides = overrides.into();
        self
    }

    /// Builds a fresh descriptor from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the overrides do not parse.
    pub fn build(&self) -> SemanticsResult<Semantics> {
        Semantics::parse_with_template(self.template, &self.overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{Persistency, Security};

    #[test]
    fn config_from_json() {
        let config: SemanticsConfig =
            serde_json::from_str(r#"{"template":"posix","overrides":"persistency=immediate"}"#)
                .unwrap();
        let semantics = config.build().unwrap();
        assert_eq!(semantics.persistency(), Persistency::Immediate);
        assert_eq!(semantics.security(), Security::None);
    }

    #[test]
    fn empty_json_is_default() {
        let config: SemanticsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SemanticsConfig::default());
        assert_eq!(config.build().unwrap().snapshot(), Template::Default.snapshot());
    }

    #[test]
    fn builder_overrides() {
        let config = SemanticsConfig::new(Template::TemporaryLocal).overrides("security=strict");
        assert_eq!(config.build().unwrap().security(), Security::Strict);
    }
}
