//! Engine configuration.

/// Process-wide engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Register privileged property names (`_debugIdentifier`, ...).
    pub private_properties: bool,
    /// How many ranked suggestions an unresolved-symbol error keeps.
    pub max_suggestions: usize,
    /// Resolve `%` on geometry properties against the parent's size.
    pub percent_of_parent: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            private_properties: cfg!(feature = "private-properties"),
            max_suggestions: 3,
            percent_of_parent: true,
        }
    }
}

impl EngineConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable privileged properties (builder).
    pub fn with_private_properties(mut self, enabled: bool) -> Self {
        self.private_properties = enabled;
        self
    }

    /// Set the number of suggestions kept on symbol errors (builder).
    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    /// Choose how `%` resolves on geometry properties (builder).
    pub fn with_percent_of_parent(mut self, enabled: bool) -> Self {
        self.percent_of_parent = enabled;
        self
    }
}
