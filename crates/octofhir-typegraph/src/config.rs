//! Type graph assembly configuration.
//!
//! Configuration can be specified in `octofhir.toml` under the `[typegraph]`
//! section.
//!
//! # Example Configuration
//!
//! ```toml
//! [typegraph]
//! input_suffix = "_Input"
//! element_type = "Element"
//! sibling_order = "before"
//! verify_pairing = true
//! project_all_types = true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TypeGraphError;

/// Where the `_field` Element sibling is placed relative to its primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingOrder {
    /// `_status` directly before `status`.
    #[default]
    Before,
    /// `_status` directly after `status`.
    After,
}

/// Type graph assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeGraphConfig {
    /// Suffix appended to output type names to name their input counterparts.
    /// Default: "_Input"
    #[serde(default = "default_input_suffix")]
    pub input_suffix: String,

    /// Name of the generic type carrying primitive extensions.
    /// Default: "Element"
    #[serde(default = "default_element_type")]
    pub element_type: String,

    /// Placement of `_field` siblings.
    /// Default: before
    #[serde(default)]
    pub sibling_order: SiblingOrder,

    /// Check every assembled type for missing element siblings.
    /// Default: true
    #[serde(default = "default_verify_pairing")]
    pub verify_pairing: bool,

    /// Project every output object, not only those reachable from resources.
    /// Default: true
    #[serde(default = "default_project_all_types")]
    pub project_all_types: bool,
}

fn default_input_suffix() -> String {
    "_Input".to_string()
}

fn default_element_type() -> String {
    "Element".to_string()
}

fn default_verify_pairing() -> bool {
    true
}

fn default_project_all_types() -> bool {
    true
}

impl Default for TypeGraphConfig {
    fn default() -> Self {
        Self {
            input_suffix: default_input_suffix(),
            element_type: default_element_type(),
            sibling_order: SiblingOrder::default(),
            verify_pairing: default_verify_pairing(),
            project_all_types: default_project_all_types(),
        }
    }
}

impl TypeGraphConfig {
    /// Parses the configuration from a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document cannot be parsed or fails
    /// [`validate`](Self::validate).
    pub fn from_toml_str(source: &str) -> Result<Self, TypeGraphError> {
        let config: Self =
            toml::from_str(source).map_err(|e| TypeGraphError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), TypeGraphError> {
        if self.input_suffix.is_empty() {
            return Err(TypeGraphError::InvalidConfig(
                "typegraph.input_suffix must not be empty".into(),
            ));
        }
        if !is_graphql_name_tail(&self.input_suffix) {
            return Err(TypeGraphError::InvalidConfig(format!(
                "typegraph.input_suffix '{}' is not a valid GraphQL name part",
                self.input_suffix
            )));
        }
        if self.element_type.is_empty() {
            return Err(TypeGraphError::InvalidConfig(
                "typegraph.element_type must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Name of the input counterpart of `output_name`.
    #[must_use]
    pub fn input_name(&self, output_name: &str) -> String {
        format!("{output_name}{}", self.input_suffix)
    }
}

fn is_graphql_name_tail(s: &str) -> bool {
    s.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
