use serde::{Deserialize, Serialize};

/// A view and its defining query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// View name, possibly namespace-qualified.
    pub name: String,
    /// Defining `SELECT`.
    pub expression: String,
    /// Whether this is a materialized view.
    pub materialized: bool,
}

impl View {
    /// Creates a plain view.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            materialized: false,
        }
    }

    /// Makes the view materialized.
    #[must_use]
    pub fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }

    /// Registry `type` value recorded for this view.
    #[must_use]
    pub fn registry_type(&self) -> &'static str {
        if self.materialized {
            "MATERIALIZED_VIEW"
        } else {
            "VIEW"
        }
    }
}
