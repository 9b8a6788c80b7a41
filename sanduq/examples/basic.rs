//! A small wiring session: configuration values, derived classes, a lazy
//! service behind a proxy and a locator that reaches the container itself.
//!
//! Run with `RUST_LOG=sanduq_container=debug` to watch the resolutions.

use sanduq::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Injectable)]
struct Config {
    #[inject(name = "db.url")]
    url: String,
}

#[derive(Injectable)]
struct Database {
    config: Ref<Config>,
    #[inject(default)]
    pool_size: u32,
}

#[derive(Injectable)]
#[injectable(name = "Mailer")]
struct SmtpMailer {
    #[inject(name = "mail.sender")]
    sender: String,
}

#[derive(Injectable)]
struct Signup {
    database: Ref<Database>,
    #[inject(name = "Mailer")]
    mailer: Ref<SmtpMailer>,
}

#[derive(Injectable)]
struct Locator {
    container: Container,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let container = Container::builder()
        .define("db.url", value(String::from("postgres://localhost/app")))
        .define("mail.sender", value(String::from("noreply@example.com")))
        .define("Database", create::<Database>().constructor_parameter("pool_size", Argument::value(16u32)))
        .define("Mailer", create::<SmtpMailer>().lazy())
        .define("db", get("Database"))
        .build()?;

    let signup: Ref<Signup> = container.get("Signup")?;
    println!("database: {} ({} connections)", signup.database.config.url, signup.database.pool_size);

    // The mailer is only built when first touched.
    println!("mailer deferred: {}", signup.mailer.is_deferred());
    println!("mailer initialized: {}", signup.mailer.is_initialized());
    println!("sending as {}", signup.mailer.sender);
    println!("mailer initialized: {}", signup.mailer.is_initialized());

    let db: Ref<Database> = container.get("db")?;
    println!("alias shares the singleton: {}", Ref::ptr_eq(&db, &signup.database));

    let locator: Ref<Locator> = container.get("Locator")?;
    println!("locator sees Signup: {}", locator.container.has("Signup")?);

    match container.get::<String>("smtp.host") {
        Ok(host) => println!("smtp host: {}", *host),
        Err(err) => println!("lookup failed: {err}"),
    }

    Ok(())
}
