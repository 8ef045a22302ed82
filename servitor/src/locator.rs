//! Core functionality for registering and resolving named dependencies.
//!
//! [ServiceLocator] holds a flat map from string keys to
//! [bindings](crate::binding) and delegates instance production and caching to
//! them. It is an explicit context object - hosts wanting the classic
//! one-registry-per-process pattern should go through [crate::global], while
//! tests construct their own locator per case.

use crate::binding::{
    Binding, CreateFn, CreateWithArgsFn, DisposeFn, FactoryArgs, InstanceAnyPtr, InstancePtr,
};
use crate::error::{BoxError, LocatorError};
use futures::future;
use futures::FutureExt;
use fxhash::{FxHashMap, FxHashSet};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// Flat, name-keyed dependency registry. Keys are unique - re-registering a
/// taken key fails unless reassignment has been explicitly allowed via
/// [ServiceLocator::set_allow_reassignment].
///
/// All registration and resolution is synchronous; [ServiceLocator::reset] is
/// the single suspending operation, since it awaits consumer disposers. The
/// locator itself carries no lock - a host driving it from multiple threads
/// must serialize access externally, as [crate::global] does.
#[derive(Default)]
pub struct ServiceLocator {
    bindings: FxHashMap<String, Binding>,
    registration_order: Vec<String>,
    resolving: FxHashSet<String>,
    allow_reassignment: bool,
}

impl ServiceLocator {
    /// Creates an empty locator with reassignment disallowed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls whether registering an already-taken key replaces the previous
    /// binding instead of failing. Off by default. A replaced binding is
    /// discarded without running its disposer.
    pub fn set_allow_reassignment(&mut self, allow: bool) {
        self.allow_reassignment = allow;
    }

    /// Starts registering a singleton binding under `key`. The returned
    /// registration defaults to eager construction and no disposer; call
    /// [SingletonRegistration::finish] to install it.
    ///
    /// The recipe receives the locator itself, so it can resolve previously
    /// registered dependencies.
    pub fn register<T, F>(&mut self, key: impl Into<String>, create: F) -> SingletonRegistration<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&mut ServiceLocator) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let create: CreateFn = Arc::new(move |locator: &mut ServiceLocator| {
            create(locator).map(|value| Arc::new(value) as InstanceAnyPtr)
        });

        SingletonRegistration {
            locator: self,
            key: key.into(),
            create,
            lazy: false,
            dispose: None,
            marker: PhantomData,
        }
    }

    /// Starts registering a factory binding under `key`. Nothing is constructed
    /// at registration time; the recipe runs on every resolution, receiving the
    /// locator and the caller-supplied [FactoryArgs].
    pub fn register_factory<T, F>(
        &mut self,
        key: impl Into<String>,
        create: F,
    ) -> FactoryRegistration<'_, T>
    where
        T: Send + Sync + 'static,
        F: Fn(&mut ServiceLocator, FactoryArgs) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let create: CreateWithArgsFn = Arc::new(move |locator: &mut ServiceLocator, args| {
            create(locator, args).map(|value| Arc::new(value) as InstanceAnyPtr)
        });

        FactoryRegistration {
            locator: self,
            key: key.into(),
            create,
            dispose: None,
            marker: PhantomData,
        }
    }

    /// Resolves the instance registered under `key`, constructing it if the
    /// binding has not produced one yet (lazy singletons) or always (factory
    /// bindings, with no arguments).
    pub fn resolve<T: Send + Sync + 'static>(
        &mut self,
        key: &str,
    ) -> Result<InstancePtr<T>, LocatorError> {
        self.resolve_with(key, None)
    }

    /// Like [ServiceLocator::resolve], but forwards `args` to the recipe of a
    /// factory binding. Singleton bindings ignore the arguments, since their
    /// recipe runs at most once with the shape captured at registration.
    pub fn resolve_with<T: Send + Sync + 'static>(
        &mut self,
        key: &str,
        args: FactoryArgs,
    ) -> Result<InstancePtr<T>, LocatorError> {
        self.resolve_any(key, args)?
            .downcast::<T>()
            .map_err(|_| LocatorError::IncompatibleType(key.to_string()))
    }

    /// Checks if there's a binding with the given key.
    pub fn is_registered(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    /// Returns the number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Checks if no bindings are registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Disposes every produced instance and clears the locator, returning it to
    /// its freshly-created state. Bindings are processed in reverse
    /// registration order - dependents, registered later, are torn down before
    /// the dependencies they hold - and every disposer invocation is awaited to
    /// completion before the next one starts. Instances without a disposer are
    /// simply dropped.
    ///
    /// A disposer error aborts the sequence: already-disposed bindings stay
    /// removed, while the failing binding and everything registered before it
    /// remain intact, so `reset` can be retried. After a successful reset any
    /// resolution fails with [LocatorError::NotFound] until keys are registered
    /// again.
    pub async fn reset(&mut self) -> Result<(), LocatorError> {
        info!(
            "Disposing {} registered dependencies...",
            self.registration_order.len()
        );

        while let Some(key) = self.registration_order.last().cloned() {
            if let Some(binding) = self.bindings.get_mut(&key) {
                debug!("Disposing dependency '{}'...", key);
                binding
                    .dispose_all()
                    .await
                    .map_err(|source| LocatorError::Disposal {
                        key: key.clone(),
                        source,
                    })?;
            }

            self.registration_order.pop();
            self.bindings.remove(&key);
        }

        self.resolving.clear();
        self.allow_reassignment = false;

        debug!("Reset complete.");
        Ok(())
    }

    fn resolve_any(
        &mut self,
        key: &str,
        args: FactoryArgs,
    ) -> Result<InstanceAnyPtr, LocatorError> {
        enum Recipe {
            Singleton(CreateFn),
            Factory(CreateWithArgsFn),
        }

        let recipe = match self.bindings.get(key) {
            None => return Err(LocatorError::NotFound(key.to_string())),
            Some(Binding::Singleton {
                instance: Some(instance),
                ..
            }) => return Ok(instance.clone()),
            Some(Binding::Singleton { create, .. }) => Recipe::Singleton(create.clone()),
            Some(Binding::Factory { create, .. }) => Recipe::Factory(create.clone()),
        };

        if !self.resolving.insert(key.to_string()) {
            return Err(LocatorError::ResolutionCycle(key.to_string()));
        }

        debug!("Constructing dependency '{}'...", key);
        let constructed = match recipe {
            Recipe::Singleton(create) => create(self),
            Recipe::Factory(create) => create(self, args),
        };
        self.resolving.remove(key);

        let instance = constructed.map_err(|source| LocatorError::Construction {
            key: key.to_string(),
            source,
        })?;

        match self.bindings.get_mut(key) {
            Some(Binding::Singleton {
                instance: cached, ..
            }) => *cached = Some(instance.clone()),
            Some(Binding::Factory { created, .. }) => created.push_back(instance.clone()),
            // no synchronous operation removes a binding, so this arm is not
            // reachable through the public API; hand the instance out without
            // recording it rather than panic
            None => {}
        }

        Ok(instance)
    }

    fn ensure_key_free(&self, key: &str) -> Result<(), LocatorError> {
        if !self.allow_reassignment && self.bindings.contains_key(key) {
            return Err(LocatorError::AlreadyRegistered(key.to_string()));
        }

        Ok(())
    }

    fn install(&mut self, key: String, binding: Binding) {
        if self.bindings.insert(key.clone(), binding).is_some() {
            // a reassigned key counts as a fresh registration for disposal
            // ordering purposes
            self.registration_order.retain(|existing| *existing != key);
        }

        self.registration_order.push(key);
    }
}

/// In-progress singleton registration. Construction and installation happen in
/// [SingletonRegistration::finish].
#[must_use = "the binding is only installed by calling finish()"]
pub struct SingletonRegistration<'a, T> {
    locator: &'a mut ServiceLocator,
    key: String,
    create: CreateFn,
    lazy: bool,
    dispose: Option<DisposeFn>,
    marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> SingletonRegistration<'_, T> {
    /// Defers construction to the first resolution instead of running the
    /// recipe inside [SingletonRegistration::finish].
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Attaches an async disposer, invoked with the cached instance during
    /// [ServiceLocator::reset] if one was produced.
    pub fn on_dispose<D, Fut>(mut self, dispose: D) -> Self
    where
        D: Fn(InstancePtr<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.dispose = Some(erase_disposer(dispose));
        self
    }

    /// Installs the binding. With eager construction (the default) the recipe
    /// runs inside this call: a recipe error propagates to the caller and
    /// leaves the key unbound.
    pub fn finish(self) -> Result<(), LocatorError> {
        let Self {
            locator,
            key,
            create,
            lazy,
            dispose,
            ..
        } = self;

        locator.ensure_key_free(&key)?;

        let instance = if lazy {
            None
        } else {
            debug!("Eagerly constructing dependency '{}'...", key);
            Some(
                create(locator).map_err(|source| LocatorError::Construction {
                    key: key.clone(),
                    source,
                })?,
            )
        };

        debug!("Registering singleton dependency '{}'.", key);
        locator.install(
            key,
            Binding::Singleton {
                create,
                instance,
                dispose,
            },
        );

        Ok(())
    }
}

/// In-progress factory registration. Installation happens in
/// [FactoryRegistration::finish]; nothing is constructed before the first
/// resolution.
#[must_use = "the binding is only installed by calling finish()"]
pub struct FactoryRegistration<'a, T> {
    locator: &'a mut ServiceLocator,
    key: String,
    create: CreateWithArgsFn,
    dispose: Option<DisposeFn>,
    marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> FactoryRegistration<'_, T> {
    /// Attaches an async disposer, invoked once per produced instance during
    /// [ServiceLocator::reset], in production order.
    pub fn on_dispose<D, Fut>(mut self, dispose: D) -> Self
    where
        D: Fn(InstancePtr<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.dispose = Some(erase_disposer(dispose));
        self
    }

    /// Installs the binding.
    pub fn finish(self) -> Result<(), LocatorError> {
        let Self {
            locator,
            key,
            create,
            dispose,
            ..
        } = self;

        locator.ensure_key_free(&key)?;

        debug!("Registering factory dependency '{}'.", key);
        locator.install(
            key,
            Binding::Factory {
                create,
                created: Default::default(),
                dispose,
            },
        );

        Ok(())
    }
}

fn erase_disposer<T, D, Fut>(dispose: D) -> DisposeFn
where
    T: Send + Sync + 'static,
    D: Fn(InstancePtr<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Box::new(move |instance: InstanceAnyPtr| match instance.downcast::<T>() {
        Ok(instance) => dispose(instance).boxed(),
        // bindings only ever hold instances produced by their own recipe, so
        // this arm is unreachable through the public API
        Err(_) => future::ready(Err(BoxError::from(
            "disposer invoked with an unexpected instance type",
        )))
        .boxed(),
    })
}
