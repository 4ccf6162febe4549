//! Dependency resolution errors.

/// A category that could not be given a priority slot.
///
/// These are reported, never fatal: the category keeps the host's default
/// rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The category depends on one that is neither declared nor resolvable.
    UnresolvedDependency { from: String, to: String },
    /// A cycle was found while following dependencies.
    CycleDetected { path: Vec<String> },
    /// The category must sit above `after` and below `before`, but `before`
    /// already sits lower than `after`.
    ConflictingOrder {
        name: String,
        after: String,
        before: String,
    },
}

impl ResolveError {
    /// The category the error is about.
    pub fn category(&self) -> &str {
        match self {
            ResolveError::UnresolvedDependency { from, .. } => from,
            ResolveError::CycleDetected { path } => path.first().map(String::as_str).unwrap_or(""),
            ResolveError::ConflictingOrder { name, .. } => name,
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::UnresolvedDependency { from, to } => {
                write!(f, "category '{}' depends on unresolvable category '{}'", from, to)
            }
            ResolveError::CycleDetected { path } => {
                write!(f, "cycle detected in category dependencies: {}", path.join(" -> "))
            }
            ResolveError::ConflictingOrder {
                name,
                after,
                before,
            } => {
                write!(
                    f,
                    "category '{}' cannot be placed after '{}' and before '{}'",
                    name, after, before
                )
            }
        }
    }
}

impl std::error::Error for ResolveError {}
