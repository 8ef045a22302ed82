use servitor::ServiceLocator;

// factory bindings produce a fresh instance per resolution, optionally shaped
// by caller-supplied arguments
struct Session {
    user: String,
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let mut locator = ServiceLocator::new();

    locator
        .register_factory("session", |_, args| {
            // arguments arrive as an opaque bag - interpretation is up to the recipe
            let user = args
                .and_then(|args| args.downcast::<String>().ok())
                .map(|user| *user)
                .unwrap_or_else(|| "anonymous".to_string());

            Ok(Session { user })
        })
        .finish()
        .expect("error registering session factory");

    let alice = locator
        .resolve_with::<Session>("session", Some(Box::new("alice".to_string())))
        .expect("error resolving session");
    let anonymous = locator
        .resolve::<Session>("session")
        .expect("error resolving session");

    // two resolutions, two distinct instances
    println!("{} / {}", alice.user, anonymous.user);
}
