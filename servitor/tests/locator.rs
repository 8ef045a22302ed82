use serial_test::serial;
use servitor::binding::InstancePtr;
use servitor::{BoxError, LocatorError, ServiceLocator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type DisposalLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct Connection {
    name: &'static str,
}

struct Repository {
    connection: InstancePtr<Connection>,
}

struct Service {
    repository: InstancePtr<Repository>,
}

fn record(log: &DisposalLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

#[tokio::test]
async fn should_dispose_in_reverse_registration_order() {
    let log: DisposalLog = Default::default();
    let mut locator = ServiceLocator::new();

    let connection_log = log.clone();
    locator
        .register("connection", |_| Ok(Connection { name: "primary" }))
        .on_dispose(move |_| {
            let log = connection_log.clone();
            async move {
                record(&log, "connection");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let repository_log = log.clone();
    locator
        .register("repository", |locator: &mut ServiceLocator| {
            Ok(Repository {
                connection: locator.resolve("connection")?,
            })
        })
        .on_dispose(move |_| {
            let log = repository_log.clone();
            async move {
                record(&log, "repository");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let service_log = log.clone();
    locator
        .register("service", |locator: &mut ServiceLocator| {
            Ok(Service {
                repository: locator.resolve("repository")?,
            })
        })
        .on_dispose(move |_| {
            let log = service_log.clone();
            async move {
                record(&log, "service");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let service = locator.resolve::<Service>("service").unwrap();
    assert_eq!(service.repository.connection.name, "primary");
    drop(service);

    locator.reset().await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["service", "repository", "connection"]
    );
    assert!(matches!(
        locator.resolve::<Connection>("connection").unwrap_err(),
        LocatorError::NotFound(..)
    ));
}

// the wrapped-dependency scenario: a dependent registered after its dependency
// must be disposed first, while its dependency is still valid
#[tokio::test]
async fn should_dispose_dependents_before_dependencies() {
    let log: DisposalLog = Default::default();
    let mut locator = ServiceLocator::new();

    let connection_log = log.clone();
    locator
        .register("connection", |_| Ok(Connection { name: "primary" }))
        .on_dispose(move |_| {
            let log = connection_log.clone();
            async move {
                record(&log, "connection");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let repository_log = log.clone();
    locator
        .register("repository", |locator: &mut ServiceLocator| {
            Ok(Repository {
                connection: locator.resolve("connection")?,
            })
        })
        .on_dispose(move |repository: InstancePtr<Repository>| {
            let log = repository_log.clone();
            async move {
                // the dependency held by the dependent is still usable here
                assert_eq!(repository.connection.name, "primary");
                record(&log, "repository");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    locator.resolve::<Repository>("repository").unwrap();
    locator.reset().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["repository", "connection"]);
}

#[tokio::test]
async fn should_dispose_factory_instances_in_production_order() {
    let log: DisposalLog = Default::default();
    let mut locator = ServiceLocator::new();

    let connection_log = log.clone();
    locator
        .register_factory("connection", |_, args| {
            let name = args
                .and_then(|args| args.downcast::<&'static str>().ok())
                .map(|name| *name)
                .unwrap_or("anonymous");

            Ok(Connection { name })
        })
        .on_dispose(move |connection: InstancePtr<Connection>| {
            let log = connection_log.clone();
            async move {
                record(&log, connection.name);
                Ok(())
            }
        })
        .finish()
        .unwrap();

    locator
        .resolve_with::<Connection>("connection", Some(Box::new("first")))
        .unwrap();
    locator
        .resolve_with::<Connection>("connection", Some(Box::new("second")))
        .unwrap();
    locator.resolve::<Connection>("connection").unwrap();

    locator.reset().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "anonymous"]);
}

#[tokio::test]
async fn should_abort_reset_on_disposal_failure_and_allow_retry() {
    let log: DisposalLog = Default::default();
    let failures = Arc::new(AtomicUsize::new(0));
    let mut locator = ServiceLocator::new();

    let connection_log = log.clone();
    locator
        .register("connection", |_| Ok(Connection { name: "primary" }))
        .on_dispose(move |_| {
            let log = connection_log.clone();
            async move {
                record(&log, "connection");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let repository_log = log.clone();
    let repository_failures = failures.clone();
    locator
        .register("repository", |locator: &mut ServiceLocator| {
            Ok(Repository {
                connection: locator.resolve("connection")?,
            })
        })
        .on_dispose(move |_| {
            let log = repository_log.clone();
            let failures = repository_failures.clone();
            async move {
                if failures.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(BoxError::from("disposal failure"));
                }

                record(&log, "repository");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let service_log = log.clone();
    locator
        .register("service", |locator: &mut ServiceLocator| {
            Ok(Service {
                repository: locator.resolve("repository")?,
            })
        })
        .on_dispose(move |_| {
            let log = service_log.clone();
            async move {
                record(&log, "service");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    locator.resolve::<Service>("service").unwrap();

    let error = locator.reset().await.unwrap_err();
    assert!(matches!(&error, LocatorError::Disposal { key, .. } if key == "repository"));

    // the failing binding and everything registered before it survive
    assert!(locator.is_registered("repository"));
    assert!(locator.is_registered("connection"));
    assert!(!locator.is_registered("service"));

    locator.reset().await.unwrap();

    assert!(locator.is_empty());
    assert_eq!(
        *log.lock().unwrap(),
        vec!["service", "repository", "connection"]
    );
}

// a reassigned key becomes the most recent registration, so it is disposed
// before bindings that were registered after the original
#[tokio::test]
async fn should_dispose_reassigned_binding_first() {
    let log: DisposalLog = Default::default();
    let mut locator = ServiceLocator::new();
    locator.set_allow_reassignment(true);

    let stale_log = log.clone();
    locator
        .register("connection", |_| Ok(Connection { name: "stale" }))
        .on_dispose(move |connection: InstancePtr<Connection>| {
            let log = stale_log.clone();
            async move {
                record(&log, connection.name);
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let repository_log = log.clone();
    locator
        .register("repository", |locator: &mut ServiceLocator| {
            Ok(Repository {
                connection: locator.resolve("connection")?,
            })
        })
        .on_dispose(move |_| {
            let log = repository_log.clone();
            async move {
                record(&log, "repository");
                Ok(())
            }
        })
        .finish()
        .unwrap();

    let replacement_log = log.clone();
    locator
        .register("connection", |_| Ok(Connection { name: "replacement" }))
        .on_dispose(move |connection: InstancePtr<Connection>| {
            let log = replacement_log.clone();
            async move {
                record(&log, connection.name);
                Ok(())
            }
        })
        .finish()
        .unwrap();

    locator.reset().await.unwrap();

    // the replaced binding was discarded without running its disposer, so
    // "stale" never shows up
    assert_eq!(*log.lock().unwrap(), vec!["replacement", "repository"]);
}

#[tokio::test]
#[serial]
async fn should_reset_global_locator() {
    servitor::global::with_locator(|locator| {
        locator
            .register("connection", |_| Ok(Connection { name: "global" }))
            .finish()
    })
    .unwrap();

    let connection = servitor::global::with_locator(|locator| {
        locator.resolve::<Connection>("connection")
    })
    .unwrap();
    assert_eq!(connection.name, "global");

    servitor::global::reset().await.unwrap();

    assert!(matches!(
        servitor::global::with_locator(|locator| locator.resolve::<Connection>("connection"))
            .unwrap_err(),
        LocatorError::NotFound(..)
    ));
}

// on disposal failure the detached locator is reinstalled as the global, so
// the undisposed binding survives and the reset can be retried
#[tokio::test]
#[serial]
async fn should_retry_failed_global_reset() {
    let failures = Arc::new(AtomicUsize::new(0));
    let disposer_failures = failures.clone();

    servitor::global::with_locator(|locator| {
        locator
            .register("session", |_| Ok(Connection { name: "global" }))
            .on_dispose(move |_| {
                let failures = disposer_failures.clone();
                async move {
                    if failures.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(BoxError::from("disposal failure"));
                    }

                    Ok(())
                }
            })
            .finish()
    })
    .unwrap();

    let error = servitor::global::reset().await.unwrap_err();
    assert!(matches!(&error, LocatorError::Disposal { key, .. } if key == "session"));
    assert!(servitor::global::with_locator(|locator| locator.is_registered("session")));

    servitor::global::reset().await.unwrap();

    assert!(servitor::global::with_locator(|locator| locator.is_empty()));
    assert_eq!(failures.load(Ordering::SeqCst), 2);
}
