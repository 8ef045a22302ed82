//! A flat, name-keyed service locator decoupling object construction from object
//! use. Callers install named construction recipes ([bindings](binding)); other
//! code resolves instances by name without knowing how they are built.
//!
//! Two instantiation strategies are supported: *singleton* bindings cache and
//! reuse exactly one instance (constructed eagerly at registration or lazily on
//! first resolution), while *factory* bindings produce a fresh instance on every
//! resolution call. Each binding can carry an async disposer, which
//! [ServiceLocator::reset] runs per produced instance in reverse registration
//! order, so dependents are torn down before the dependencies they hold.
//!
//! ```
//! use servitor::binding::InstancePtr;
//! use servitor::ServiceLocator;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! # fn main() -> Result<(), servitor::LocatorError> {
//! let mut locator = ServiceLocator::new();
//! locator
//!     .register("database", |_| {
//!         Ok(Database {
//!             url: "localhost".to_string(),
//!         })
//!     })
//!     .finish()?;
//!
//! let database: InstancePtr<Database> = locator.resolve("database")?;
//! assert_eq!(database.url, "localhost");
//! # Ok(())
//! # }
//! ```
//!
//! This is not a full inversion-of-control framework - there is no automatic
//! constructor injection and no scope hierarchy. Recipes which depend on other
//! registered values simply call [ServiceLocator::resolve] on the locator handed
//! to them.

pub mod binding;
mod error;
pub mod global;
pub mod locator;

pub use error::{BoxError, LocatorError};
pub use locator::ServiceLocator;
