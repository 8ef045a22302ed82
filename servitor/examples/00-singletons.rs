use servitor::binding::InstancePtr;
use servitor::ServiceLocator;

// a plain value the application wants to share
struct Configuration {
    greeting: String,
}

// a dependent value, wired up manually inside its recipe
struct Greeter {
    configuration: InstancePtr<Configuration>,
}

impl Greeter {
    fn greet(&self) {
        println!("{}", self.configuration.greeting);
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let mut locator = ServiceLocator::new();

    // eager registration - the recipe runs here and the instance is cached
    locator
        .register("configuration", |_| {
            Ok(Configuration {
                greeting: "Hello world!".to_string(),
            })
        })
        .finish()
        .expect("error registering configuration");

    // recipes receive the locator, so they can resolve what they depend on
    locator
        .register("greeter", |locator: &mut ServiceLocator| {
            Ok(Greeter {
                configuration: locator.resolve("configuration")?,
            })
        })
        .lazy()
        .finish()
        .expect("error registering greeter");

    // the greeter is constructed on this first resolution and reused afterwards
    let greeter = locator
        .resolve::<Greeter>("greeter")
        .expect("error resolving greeter");

    // prints "Hello world!"
    greeter.greet();
}
