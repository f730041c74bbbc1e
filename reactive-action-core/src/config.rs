//! Action configuration and log filtering
//!
//! Configuration is plain data with sensible defaults. Every type derives
//! serde's `Serialize`/`Deserialize` with `#[serde(default)]`, so a partial
//! section of an application's config file is enough:
//!
//! ```
//! use reactive_action_core::ActionConfig;
//!
//! let config = ActionConfig::named("save").with_filter_patterns(None, Some("poll*"));
//! assert_eq!(config.name, "save");
//! assert!(config.should_trace());
//! ```

use serde::{Deserialize, Serialize};

/// Default name given to actions constructed without a config.
pub const DEFAULT_ACTION_NAME: &str = "action";

/// Per-action configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Name used in log records and in the execution log.
    pub name: String,
    /// Whether the action emits `tracing` records at all.
    pub trace: bool,
    /// Which action names are traced when `trace` is on.
    pub filter: LogFilter,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_ACTION_NAME.to_string(),
            trace: true,
            filter: LogFilter::default(),
        }
    }
}

impl ActionConfig {
    /// Default config with a specific name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Turn tracing on or off.
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Replace the filter with comma-separated include/exclude patterns.
    pub fn with_filter_patterns(mut self, include: Option<&str>, exclude: Option<&str>) -> Self {
        self.filter = LogFilter::new(include, exclude);
        self
    }

    /// Whether this action's records pass both the switch and the filter.
    pub fn should_trace(&self) -> bool {
        self.trace && self.filter.matches(&self.name)
    }
}

/// Include/exclude filter over action names using glob patterns.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// # Examples
///
/// - `save*` matches save, saveDraft, etc.
/// - `*refresh*` matches any name containing "refresh"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFilter {
    /// If non-empty, only names matching one of these patterns pass
    pub include_patterns: Vec<String>,
    /// Names matching these patterns never pass (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl LogFilter {
    /// Create a filter from comma-separated pattern strings
    ///
    /// # Example
    /// ```
    /// use reactive_action_core::LogFilter;
    ///
    /// let filter = LogFilter::new(Some("load*,save"), Some("loadThumbnail"));
    /// assert!(filter.matches("loadProfile"));
    /// assert!(filter.matches("save"));
    /// assert!(!filter.matches("loadThumbnail"));
    /// assert!(!filter.matches("delete"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    /// Create a filter with specific pattern vectors
    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Check whether a name passes the include/exclude patterns
    pub fn matches(&self, name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| glob_match(p, name))
        {
            return false;
        }

        !self.exclude_patterns.iter().any(|p| glob_match(p, name))
    }
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Simple glob pattern matching supporting `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        match pattern.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == text[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((star_pi, star_ti)) => {
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    star = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}
