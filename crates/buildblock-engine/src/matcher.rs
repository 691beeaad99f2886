//! Environment matching for directive target lists.

use crate::grammar::Directive;
use crate::handlers::REMOVE;

/// Decides whether a directive applies to the active environment.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentMatcher {
    environment: Option<String>,
    strip: bool,
}

impl EnvironmentMatcher {
    /// Create a matcher for an optional active environment.
    #[must_use]
    pub fn new(environment: Option<&str>, strip: bool) -> Self {
        Self {
            environment: environment.map(str::to_owned),
            strip,
        }
    }

    /// Active environment label.
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Check a single directive.
    ///
    /// In strip mode every `remove` directive matches. Otherwise a directive
    /// without targets always matches, and a directive with targets matches when
    /// the active environment is one of them (exact, case-sensitive).
    #[must_use]
    pub fn matches(&self, directive: &Directive) -> bool {
        if self.strip && directive.block_type == REMOVE {
            return true;
        }
        if directive.targets.is_empty() {
            return true;
        }
        self.environment
            .as_deref()
            .is_some_and(|env| directive.targets.iter().any(|t| t == env))
    }

    /// First matching directive of a stack guarding one block.
    #[must_use]
    pub fn select<'d>(&self, directives: &'d [Directive]) -> Option<&'d Directive> {
        directives.iter().find(|d| self.matches(d))
    }
}
