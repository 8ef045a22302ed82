//! Bindings are the stored recipes and state for producing and disposing values
//! under one locator key. A singleton binding caches a single instance, while a
//! factory binding produces a fresh one per resolution and logs everything it
//! created. The locator owns its bindings exclusively, and each binding
//! exclusively owns the instances it produced - consumers receive shared
//! pointers but never control instance lifecycle.

use crate::error::BoxError;
use crate::locator::ServiceLocator;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

/// Shared pointer to a resolved instance.
pub type InstancePtr<T> = Arc<T>;

/// Type-erased instance pointer, as stored inside bindings.
pub type InstanceAnyPtr = Arc<dyn Any + Send + Sync>;

/// Opaque argument bag forwarded to a factory binding on every resolution.
/// Interpretation is entirely consumer-defined; singleton bindings ignore it.
pub type FactoryArgs = Option<Box<dyn Any + Send>>;

/// Type-erased construction closure for singleton bindings. Receives the
/// locator so recipes can resolve their own dependencies recursively.
pub(crate) type CreateFn =
    Arc<dyn Fn(&mut ServiceLocator) -> Result<InstanceAnyPtr, BoxError> + Send + Sync>;

/// Type-erased construction closure for factory bindings.
pub(crate) type CreateWithArgsFn =
    Arc<dyn Fn(&mut ServiceLocator, FactoryArgs) -> Result<InstanceAnyPtr, BoxError> + Send + Sync>;

/// Type-erased async disposer, invoked once per owned instance during reset.
pub(crate) type DisposeFn =
    Box<dyn Fn(InstanceAnyPtr) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

pub(crate) enum Binding {
    /// Produces at most one instance, cached for the binding's lifetime.
    /// `instance` is populated at registration time for eager bindings and on
    /// first resolution for lazy ones.
    Singleton {
        create: CreateFn,
        instance: Option<InstanceAnyPtr>,
        dispose: Option<DisposeFn>,
    },
    /// Produces a new instance on every resolution. Every produced instance is
    /// appended to `created`, so disposal can later visit them all in
    /// production order.
    Factory {
        create: CreateWithArgsFn,
        created: VecDeque<InstanceAnyPtr>,
        dispose: Option<DisposeFn>,
    },
}

impl Binding {
    /// Disposes every instance this binding produced, in production order,
    /// awaiting each disposer to completion before starting the next.
    ///
    /// Successfully disposed instances are dropped from the binding as the
    /// sequence progresses, so a failed disposal leaves only the undisposed
    /// tail behind and the call can be retried.
    pub(crate) async fn dispose_all(&mut self) -> Result<(), BoxError> {
        match self {
            Binding::Singleton { instance, dispose, .. } => {
                if let (Some(held), Some(dispose)) = (instance.as_ref(), dispose.as_ref()) {
                    dispose(held.clone()).await?;
                }
                *instance = None;
            }
            Binding::Factory { created, dispose, .. } => {
                if let Some(dispose) = dispose.as_ref() {
                    while let Some(instance) = created.front().cloned() {
                        dispose(instance).await?;
                        created.pop_front();
                    }
                } else {
                    created.clear();
                }
            }
        }

        Ok(())
    }
}
