use thiserror::Error;

/// Type-erased error returned by consumer-supplied construction and disposal
/// closures. The locator never inspects these - they are carried through
/// unmodified as error sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors related to registering, resolving and disposing dependencies.
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Attempted to register a duplicated dependency with key: {0}")]
    AlreadyRegistered(String),
    #[error("Cannot find dependency with key: {0}")]
    NotFound(String),
    #[error("Dependency '{0}' cannot be downcast to the requested type")]
    IncompatibleType(String),
    #[error("Dependency '{0}' is already being constructed - resolution cycle detected")]
    ResolutionCycle(String),
    #[error("Failed to construct dependency '{key}': {source}")]
    Construction {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("Failed to dispose dependency '{key}': {source}")]
    Disposal {
        key: String,
        #[source]
        source: BoxError,
    },
}
