use servitor::binding::InstancePtr;
use servitor::ServiceLocator;

struct Connection {
    url: String,
}

struct Repository {
    connection: InstancePtr<Connection>,
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
#[tokio::main]
async fn main() {
    let mut locator = ServiceLocator::new();

    locator
        .register("connection", |_| {
            Ok(Connection {
                url: "localhost:5432".to_string(),
            })
        })
        .on_dispose(|connection: InstancePtr<Connection>| async move {
            // a real disposer would flush buffers or close sockets here
            println!("closing connection to {}", connection.url);
            Ok(())
        })
        .finish()
        .expect("error registering connection");

    locator
        .register("repository", |locator: &mut ServiceLocator| {
            Ok(Repository {
                connection: locator.resolve("connection")?,
            })
        })
        .on_dispose(|repository: InstancePtr<Repository>| async move {
            // runs before the connection disposer - dependents are torn down
            // first, so the held connection is still valid here
            println!("stopping repository using {}", repository.connection.url);
            Ok(())
        })
        .finish()
        .expect("error registering repository");

    locator
        .resolve::<Repository>("repository")
        .expect("error resolving repository");

    // prints "stopping repository...", then "closing connection..."
    locator.reset().await.expect("error disposing dependencies");
}
