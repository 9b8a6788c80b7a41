use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use sanduq::prelude::*;
use sanduq::proxy::{DeferredProxyFactory, Initializer, ProxyFactory};
use sanduq::registry::DefinitionSource;
use sanduq::{ClassInfo, Definition};

// === Types for the tests ===

/// Shared construction counter, defined per container as "Stats".
#[derive(Default)]
struct Stats {
    built: AtomicUsize,
}

impl Stats {
    fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

/// Slow to build; counts its constructions.
struct Heavy {
    stats: Ref<Stats>,
}

impl Heavy {
    fn builds(&self) -> usize {
        self.stats.built()
    }
}

impl Injectable for Heavy {
    fn parameters() -> Vec<ParamSpec> {
        vec![ParamSpec::of::<Ref<Stats>>("stats")]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        let stats: Ref<Stats> = args.take("stats")?;
        thread::sleep(Duration::from_millis(5));
        stats.built.fetch_add(1, Ordering::SeqCst);
        Ok(Heavy { stats })
    }
}

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
struct Left {
    _right: Ref<Right>,
}

#[derive(Injectable)]
struct Right {
    _left: Ref<Left>,
}

#[derive(Injectable)]
#[injectable(name = "Mailer")]
struct SmtpMailer {
    #[inject(name = "mail.sender")]
    sender: String,
}

#[derive(Injectable)]
struct Newsletter {
    #[inject(name = "Mailer")]
    mailer: Ref<SmtpMailer>,
    #[inject(property, name = "newsletter.footer")]
    footer: Option<Ref<String>>,
}

#[derive(Injectable)]
struct Locator {
    container: Container,
}

#[derive(Injectable)]
struct Report {
    #[inject(name = "report.missing")]
    _title: String,
}

#[derive(Injectable)]
struct Front {
    #[inject(name = "back.alias")]
    _back: Ref<Back>,
}

#[derive(Injectable)]
struct Back {
    _front: Ref<Front>,
}

/// Lazy; needs a `Peer`.
struct Node {
    _peer: Ref<Peer>,
}

/// Uses its `Node` while being constructed.
struct Peer {
    _node: Ref<Node>,
}

impl Injectable for Node {
    fn parameters() -> Vec<ParamSpec> {
        vec![ParamSpec::of::<Ref<Peer>>("peer")]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Node { _peer: args.take("peer")? })
    }
}

impl Injectable for Peer {
    fn parameters() -> Vec<ParamSpec> {
        vec![ParamSpec::of::<Ref<Node>>("node")]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        let node: Ref<Node> = args.take("node")?;
        node.try_get()?;
        Ok(Peer { _node: node })
    }
}

fn assert_node_cycle(node: &Ref<Node>) {
    match node.try_get() {
        Err(SanduqError::CircularDependency(err)) => assert_eq!(err.entry, "Node"),
        Ok(_) => panic!("Expected CircularDependency, got a Node"),
        Err(other) => panic!("Expected CircularDependency, got: {other:?}"),
    }
}

fn heavy_container() -> Container {
    Container::builder()
        .register_class::<Heavy>()
        .define("Stats", value(Stats::default()))
        .build()
        .unwrap()
}

fn db_container() -> Container {
    Container::builder()
        .define("db.url", value(String::from("postgres://localhost")))
        .build()
        .unwrap()
}

// === Resolution ===

#[test]
fn singleton_resolution_is_idempotent() {
    let container = heavy_container();

    let a = container.get::<Heavy>("Heavy").unwrap();
    let b = container.get::<Heavy>("Heavy").unwrap();
    assert!(Ref::ptr_eq(&a, &b));
    assert_eq!(a.builds(), 1);
}

#[test]
fn prototype_resolution_is_fresh() {
    let container = heavy_container();
    container.set("Heavy", create::<Heavy>().prototype()).unwrap();

    let a = container.get::<Heavy>("Heavy").unwrap();
    let b = container.get::<Heavy>("Heavy").unwrap();
    assert!(!Ref::ptr_eq(&a, &b));
    assert_eq!(b.builds(), 2);
}

#[test]
fn alias_is_transparent() {
    let container = db_container();
    container.set("b", autowire::<Database>()).unwrap();
    container.set("a", get("b")).unwrap();

    let via_alias = container.get::<Database>("a").unwrap();
    let direct = container.get::<Database>("b").unwrap();
    assert!(Ref::ptr_eq(&via_alias, &direct));
    assert!(container.is_cached("b"));
    assert!(!container.is_cached("a"));
}

#[test]
fn derived_classes_are_autowired() {
    let container = db_container();

    let db = container.get::<Database>("Database").unwrap();
    assert_eq!(db.config.url, "postgres://localhost");
    assert_eq!(db.pool_size, 0);
    assert!(container.catalog().find("Database").is_some());
}

#[test]
fn default_parameter_takes_an_override() {
    let container = db_container();
    container
        .set("Database", create::<Database>().constructor_parameter("pool_size", Argument::value(8u32)))
        .unwrap();

    assert_eq!(container.get::<Database>("Database").unwrap().pool_size, 8);
}

#[test]
fn class_name_can_be_renamed() {
    let container = Container::new();
    container.set_value("mail.sender", String::from("noreply@example.com")).unwrap();

    let mailer = container.get::<SmtpMailer>("Mailer").unwrap();
    assert_eq!(mailer.sender, "noreply@example.com");
    assert!(!container.has("SmtpMailer").unwrap());
}

// === Failures ===

#[test]
fn circular_dependency_is_detected_every_time() {
    let container = Container::builder().validate(false).build().unwrap();

    for _ in 0..2 {
        match container.get::<Left>("Left") {
            Err(SanduqError::CircularDependency(err)) => {
                assert_eq!(err.chain, vec!["Left", "Right", "Left"]);
                assert!(err.to_string().contains("Left → Right → Left"));
            }
            Ok(_) => panic!("Expected CircularDependency, got a Left"),
            Err(other) => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }
    assert!(container.has("Left").unwrap());
}

#[test]
fn circular_dependency_is_rejected_at_build() {
    let result = Container::builder().define("Left", autowire::<Left>()).build();
    assert!(matches!(result, Err(SanduqError::CircularDependency(_))));

    let lazy = Container::builder().define("Right", autowire::<Right>().lazy()).build();
    assert!(lazy.is_ok());
}

#[test]
fn lazy_class_behind_an_alias_passes_build() {
    let container = Container::builder()
        .define("Front", autowire::<Front>())
        .define("Back", autowire::<Back>().lazy())
        .define("back.alias", get("Back"))
        .build()
        .unwrap();

    let front = container.get::<Front>("Front").unwrap();
    assert!(front._back.is_deferred());
}

#[test]
fn threads_entering_a_cycle_from_both_ends_fail() {
    let container = Container::new();
    let barrier = std::sync::Barrier::new(2);

    let (left, right) = thread::scope(|s| {
        let left = s.spawn(|| {
            barrier.wait();
            container.get::<Left>("Left").map(|_| ())
        });
        let right = s.spawn(|| {
            barrier.wait();
            container.get::<Right>("Right").map(|_| ())
        });
        (left.join().unwrap(), right.join().unwrap())
    });

    assert!(matches!(left, Err(SanduqError::CircularDependency(_))));
    assert!(matches!(right, Err(SanduqError::CircularDependency(_))));
}

#[test]
fn missing_entry_is_not_found() {
    let container = Container::new();

    assert!(matches!(
        container.resolve("DoesNotExist", false),
        Err(SanduqError::NotFound(_))
    ));
    assert!(!container.has("DoesNotExist").unwrap());
}

#[test]
fn unresolvable_parameter_is_a_dependency_error() {
    let container = Container::new();

    match container.get::<Report>("Report") {
        Err(SanduqError::Dependency(err)) => {
            assert_eq!(err.class, "Report");
            assert_eq!(err.point, "_title");
        }
        Ok(_) => panic!("Expected Dependency error, got a Report"),
        Err(other) => panic!("Expected Dependency error, got: {other:?}"),
    }
}

#[test]
fn failed_factory_is_retried() {
    let attempts = std::sync::Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .set("flaky", factory({
            let attempts = attempts.clone();
            move |_: &dyn Resolver| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SanduqError::construction("flaky", "connection refused"))
                } else {
                    Ok(7u8)
                }
            }
        }))
        .unwrap();

    assert!(matches!(
        container.get::<u8>("flaky"),
        Err(SanduqError::ConstructionFailed { .. })
    ));
    assert!(!container.is_cached("flaky"));
    assert_eq!(*container.get::<u8>("flaky").unwrap(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn wrong_type_is_reported() {
    let container = Container::new();
    container.set_value("port", 5432u16).unwrap();

    assert!(matches!(
        container.get::<String>("port"),
        Err(SanduqError::TypeMismatch { .. })
    ));
}

// === Proxies ===

#[test]
fn proxy_defers_construction_until_first_use() {
    let container = heavy_container();
    let stats = container.get::<Stats>("Stats").unwrap();

    let heavy = container.get_proxy::<Heavy>("Heavy").unwrap();
    assert!(heavy.is_deferred());
    assert_eq!(stats.built(), 0);

    assert_eq!(heavy.builds(), 1);
    assert_eq!(heavy.builds(), 1);
    assert_eq!(stats.built(), 1);
}

#[test]
fn concurrent_proxy_use_builds_once() {
    let container = heavy_container();
    let heavy = container.get_proxy::<Heavy>("Heavy").unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| assert_eq!(heavy.builds(), 1));
        }
    });
}

#[test]
fn singleton_proxy_used_during_its_own_build_fails() {
    let container = Container::builder()
        .define("Node", create::<Node>().lazy())
        .define("Peer", create::<Peer>())
        .build()
        .unwrap();

    let node = container.get::<Node>("Node").unwrap();
    assert!(node.is_deferred());

    assert_node_cycle(&node);
    assert_node_cycle(&node);
    assert!(!node.is_initialized());
}

#[test]
fn prototype_proxy_used_during_its_own_build_fails() {
    let container = Container::builder()
        .define("Node", create::<Node>().lazy().prototype())
        .define("Peer", create::<Peer>().prototype())
        .build()
        .unwrap();

    let node = container.get::<Node>("Node").unwrap();
    assert_node_cycle(&node);
    assert_node_cycle(&container.get::<Node>("Node").unwrap());
}

// === Mutation ===

#[test]
fn redefinition_replaces_the_cached_value() {
    let container = Container::new();
    container.set_value("x", 1i32).unwrap();
    assert_eq!(*container.get::<i32>("x").unwrap(), 1);

    container.set_value("x", 2i32).unwrap();
    assert_eq!(*container.get::<i32>("x").unwrap(), 2);
}

#[test]
fn add_definitions_last_write_wins() {
    let container = Container::new();
    container
        .add_definitions(vec![
            ("level", value(1u8)),
            ("alias", get("level")),
            ("level", value(2u8)),
        ])
        .unwrap();

    assert_eq!(*container.get::<u8>("alias").unwrap(), 2);
}

#[test]
fn concurrent_set_never_leaves_a_stale_value() {
    let container = Container::new();
    container.set_value("generation", 0usize).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for generation in 1..=100usize {
                container.set_value("generation", generation).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    let _ = container.get::<usize>("generation").unwrap();
                }
            });
        }
    });

    assert_eq!(*container.get::<usize>("generation").unwrap(), 100);
}

#[test]
fn factory_may_return_an_instance() {
    let container = db_container();
    container
        .set("db.primary", factory_instance(|r: &dyn Resolver| r.resolve("db.url", false)))
        .unwrap();

    let url = container.get::<String>("db.primary").unwrap();
    assert!(Ref::ptr_eq(&url, &container.get::<String>("db.url").unwrap()));
}

// === Self-registration and injection ===

#[test]
fn container_resolves_itself() {
    let container = Container::new();
    container.set("Locator", create::<Locator>().prototype()).unwrap();

    let locator = container.get::<Locator>("Locator").unwrap();
    locator.container.set_value("through.locator", 3u8).unwrap();
    assert_eq!(*container.get::<u8>("through.locator").unwrap(), 3);

    let me = container.get::<Container>(SELF_NAME).unwrap();
    assert!(me.has("through.locator").unwrap());
}

#[test]
fn inject_on_fills_properties_only() {
    let container = Container::new();
    container.set_value("mail.sender", String::from("news@example.com")).unwrap();
    container.set_value("newsletter.footer", String::from("Unsubscribe")).unwrap();

    let newsletter = container.get::<Newsletter>("Newsletter").unwrap();
    assert_eq!(newsletter.mailer.sender, "news@example.com");
    assert_eq!(newsletter.footer.as_deref().map(String::as_str), Some("Unsubscribe"));

    let mut handmade = Newsletter {
        mailer: Ref::new(SmtpMailer {
            sender: String::from("me@example.com"),
        }),
        footer: None,
    };
    container.inject_on(&mut handmade).unwrap();
    assert_eq!(handmade.mailer.sender, "me@example.com");
    assert!(handmade.footer.is_some());
}

// === Concurrency ===

#[test]
fn concurrent_first_resolution_builds_once() {
    let container = heavy_container();

    let handles: Vec<Ref<Heavy>> = thread::scope(|s| {
        let workers: Vec<_> = (0..16)
            .map(|_| s.spawn(|| container.get::<Heavy>("Heavy").unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert!(handles.windows(2).all(|pair| Ref::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(handles[0].builds(), 1);
}

#[test]
fn concurrent_independent_builds_are_not_cycles() {
    let container = heavy_container();
    container.set("Heavy", create::<Heavy>().prototype()).unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| container.get::<Heavy>("Heavy").unwrap());
        }
    });
    assert_eq!(container.get::<Stats>("Stats").unwrap().built(), 8);
}

// === Configuration ===

#[test]
fn settings_from_json() {
    let settings: Settings = serde_json::from_str(r#"{ "autowiring": false }"#).unwrap();
    assert!(settings.discover_classes);
    assert!(settings.validate);

    let container = Container::builder().settings(settings).build().unwrap();
    assert!(!container.has("Database").unwrap());
    assert!(!container.settings().autowiring);
}

struct MailProvider;

impl Provider for MailProvider {
    fn register(&self, registry: &mut dyn ProviderRegistry) {
        registry.define("mail.sender", value(String::from("provider@example.com")));
        registry.define("mailer", get("Mailer"));
        registry.register_class(ClassInfo::of::<Heavy>());
    }
}

#[test]
fn provider_definitions_are_used() {
    let container = Container::builder()
        .add_provider(&MailProvider)
        .define("Stats", value(Stats::default()))
        .build()
        .unwrap();

    assert_eq!(container.get::<SmtpMailer>("mailer").unwrap().sender, "provider@example.com");
    assert!(container.has("Heavy").unwrap());
}

/// Serves `env.*` names from a fixed list.
struct EnvSource(Vec<(&'static str, &'static str)>);

impl DefinitionSource for EnvSource {
    fn lookup(&self, name: &str) -> Option<Definition> {
        let key = name.strip_prefix("env.")?;
        self.0
            .iter()
            .find(|(var, _)| *var == key)
            .map(|(_, val)| value(val.to_string()).into_definition(name))
    }
}

#[test]
fn extra_sources_are_consulted_after_definitions() {
    let container = Container::builder()
        .add_source(EnvSource(vec![("DB_URL", "postgres://env"), ("PORT", "5432")]))
        .define("env.PORT", value(String::from("6543")))
        .define("db.url", get("env.DB_URL"))
        .build()
        .unwrap();

    assert_eq!(*container.get::<String>("db.url").unwrap(), "postgres://env");
    assert_eq!(*container.get::<String>("env.PORT").unwrap(), "6543");
    assert!(!container.has("env.HOME").unwrap());
}

/// Counts the proxies it hands out.
#[derive(Default)]
struct CountingProxies {
    created: std::sync::Arc<AtomicUsize>,
}

impl ProxyFactory for CountingProxies {
    fn create(&self, class: &ClassInfo, initializer: Initializer) -> Result<Instance> {
        self.created.fetch_add(1, Ordering::SeqCst);
        DeferredProxyFactory.create(class, initializer)
    }
}

#[test]
fn custom_proxy_factory_is_used() {
    let proxies = CountingProxies::default();
    let created = proxies.created.clone();

    let container = Container::builder()
        .register_class::<Heavy>()
        .define("Stats", value(Stats::default()))
        .define("Heavy", create::<Heavy>().lazy().prototype())
        .proxy_factory(proxies)
        .build()
        .unwrap();

    let a = container.get::<Heavy>("Heavy").unwrap();
    let b = container.get::<Heavy>("Heavy").unwrap();
    assert!(a.is_deferred() && b.is_deferred());
    assert_eq!(created.load(Ordering::SeqCst), 2);
}
