//! Pipeline environment settings.

use serde::{Deserialize, Serialize};

/// How a successful run chooses the value it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopbackPolicy {
    /// Report the last operation's output.
    #[default]
    Normal,
    /// Run every operation, then report the original input.
    ForceOriginalInputOnSuccess,
}

/// Configuration for a pipeline.
///
/// Deserializing fills missing fields with defaults, so a partial JSON
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// Label used in failure reports and traces.
    pub description: String,
    /// Allows shell-delegated operations.
    pub use_shell: bool,
    /// Enables trace recording.
    pub use_debug: bool,
    /// Records traces of nested pipelines; implies `use_debug`.
    pub use_nesting_debug: bool,
    /// An empty pipeline returns its input unchanged instead of wrapping it.
    pub use_empty_loopback: bool,
    /// A successful run reports its original input.
    pub use_loopback: bool,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            description: String::new(),
            use_shell: false,
            use_debug: false,
            use_nesting_debug: false,
            use_empty_loopback: true,
            use_loopback: false,
        }
    }
}

impl EnvironmentSettings {
    /// Creates default settings with a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Parses settings from a (possibly partial) JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid settings object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::normalized)
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets shell mode.
    #[must_use]
    pub fn with_shell(mut self, enabled: bool) -> Self {
        self.use_shell = enabled;
        self
    }

    /// Sets trace recording.
    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.use_debug = enabled;
        self
    }

    /// Sets nested trace recording. Enabling it also enables `use_debug`.
    #[must_use]
    pub fn with_nesting_debug(mut self, enabled: bool) -> Self {
        self.use_nesting_debug = enabled;
        self.normalized()
    }

    /// Sets empty-queue loopback.
    #[must_use]
    pub fn with_empty_loopback(mut self, enabled: bool) -> Self {
        self.use_empty_loopback = enabled;
        self
    }

    /// Sets loopback.
    #[must_use]
    pub fn with_loopback(mut self, enabled: bool) -> Self {
        self.use_loopback = enabled;
        self
    }

    /// Applies implied settings.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.use_nesting_debug {
            self.use_debug = true;
        }
        self
    }

    /// Returns true if a trace should be recorded.
    #[must_use]
    pub fn records_trace(&self) -> bool {
        self.use_debug || self.use_nesting_debug
    }

    /// Returns true if nested pipelines' traces should be recorded.
    #[must_use]
    pub fn records_nested_traces(&self) -> bool {
        self.use_nesting_debug
    }

    /// Returns the loopback policy for successful runs.
    #[must_use]
    pub fn loopback_policy(&self) -> LoopbackPolicy {
        if self.use_loopback {
            LoopbackPolicy::ForceOriginalInputOnSuccess
        } else {
            LoopbackPolicy::Normal
        }
    }
}
