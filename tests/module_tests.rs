//! Module lifecycle: grouped registration, unregistration and rollback.

use refract::prelude::*;
use refract::{RegistrationError, primitives};

#[derive(Clone, Debug, Default, Reflect)]
#[reflect(name = "audio::Channel", default)]
struct Channel {
    volume: f32,
    muted: bool,
}

#[derive(Clone, Debug, Default, Reflect)]
#[reflect(name = "audio::Mixer", default)]
struct Mixer {
    master: Channel,
}

fn install(scope: &mut refract::ModuleScope<'_>) -> Result<(), RegistrationError> {
    scope.register::<Mixer>();
    scope.function("audio::db_to_gain", |db: f32| 10f32.powf(db / 20.0))?;
    Ok(())
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn module_owns_what_it_registers() {
    static AUDIO: ModuleRegistrar = ModuleRegistrar::new("audio.owns");
    let registry = Registry::new();

    assert!(AUDIO.ensure_initialized(&registry, install).unwrap());
    assert!(!AUDIO.ensure_initialized(&registry, install).unwrap());
    assert!(AUDIO.is_initialized(&registry));

    let mixer = Type::find(&registry, "audio::Mixer").unwrap();
    let channel = Type::find(&registry, "audio::Channel").unwrap();
    assert_eq!(mixer.module(), AUDIO.id());
    assert_eq!(channel.module(), AUDIO.id());

    let info = registry.module_info(AUDIO.id()).unwrap();
    assert_eq!(info.name.as_deref(), Some("audio.owns"));
    assert_eq!(info.types, 2);
    assert_eq!(info.functions, 1);

    let gain = registry
        .invoke_function("audio::db_to_gain", &[Value::new(0i32)])
        .unwrap();
    assert_eq!(gain.get::<f32>(), Some(&1.0));
}

#[test]
fn unregistering_invalidates_handles() {
    static AUDIO: ModuleRegistrar = ModuleRegistrar::new("audio.unregister");
    let registry = Registry::new();
    AUDIO.ensure_initialized(&registry, install).unwrap();

    let mixer = Type::find(&registry, "audio::Mixer").unwrap();
    let volume = Type::find(&registry, "audio::Channel")
        .unwrap()
        .field("volume")
        .unwrap();
    let function = Function::find_all(&registry, "audio::db_to_gain")[0];

    assert_eq!(AUDIO.unregister(&registry), 3);
    assert!(!AUDIO.is_initialized(&registry));

    assert!(Type::find(&registry, "audio::Mixer").is_none());
    assert!(Type::find(&registry, "audio::Channel").is_none());
    assert!(Function::find_all(&registry, "audio::db_to_gain").is_empty());
    assert!(registry.module_info(AUDIO.id()).is_none());

    assert!(!mixer.is_valid());
    assert_eq!(mixer.generation(), 0);
    assert_eq!(mixer.type_hash(), TypeHash::EMPTY);
    assert!(mixer.fields().is_empty());
    assert!(!volume.is_valid());
    assert_eq!(
        volume.get(&Channel::default()).unwrap_err(),
        ReflectError::StaleHandle
    );
    assert!(!function.is_valid());
    assert_eq!(function.invoke(&[]).unwrap_err(), ReflectError::StaleHandle);

    // primitives always belong to the host
    assert!(Type::find_by_hash(&registry, primitives::F32).is_some());
    assert!(registry.find_name("audio::Mixer").is_none());
}

#[test]
fn reinitializing_after_unregister() {
    static AUDIO: ModuleRegistrar = ModuleRegistrar::new("audio.reinit");
    let registry = Registry::new();

    AUDIO.ensure_initialized(&registry, install).unwrap();
    let first = Type::find(&registry, "audio::Mixer").unwrap();
    AUDIO.unregister(&registry);

    assert!(AUDIO.ensure_initialized(&registry, install).unwrap());
    let second = Type::find(&registry, "audio::Mixer").unwrap();
    assert_ne!(first, second);
    assert!(second.is_valid());
    assert!(!first.is_valid());
}

#[test]
fn host_types_are_not_claimed_by_modules() {
    static AUDIO: ModuleRegistrar = ModuleRegistrar::new("audio.host");
    let registry = Registry::new();
    let host_channel = Type::in_registry::<Channel>(&registry);

    AUDIO.ensure_initialized(&registry, install).unwrap();
    assert_eq!(host_channel.module(), refract::ModuleId::HOST);

    // Channel and its f32 and bool fields stay with the host
    AUDIO.unregister(&registry);
    assert!(host_channel.is_valid());
    assert!(Type::find(&registry, "audio::Channel").is_some());
    assert!(Type::find(&registry, "audio::Mixer").is_none());
}

#[test]
fn failed_initialization_rolls_back() {
    init_logging();
    static AUDIO: ModuleRegistrar = ModuleRegistrar::new("audio.failing");
    let registry = Registry::new();

    let err = AUDIO
        .ensure_initialized(&registry, |scope| {
            scope.register::<Mixer>();
            Err(scope.error("device missing"))
        })
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ModuleInit { .. }));
    assert!(!AUDIO.is_initialized(&registry));
    assert!(Type::find(&registry, "audio::Mixer").is_none());
    assert!(Type::find(&registry, "audio::Channel").is_none());
    assert!(registry.module_info(AUDIO.id()).is_none());

    assert!(AUDIO.ensure_initialized(&registry, install).unwrap());
    assert!(Type::find(&registry, "audio::Mixer").is_some());
}

#[test]
fn duplicate_function_across_modules_is_an_error() {
    init_logging();
    static FIRST: ModuleRegistrar = ModuleRegistrar::new("audio.first");
    static SECOND: ModuleRegistrar = ModuleRegistrar::new("audio.second");
    let registry = Registry::new();

    FIRST.ensure_initialized(&registry, install).unwrap();
    let err = SECOND.ensure_initialized(&registry, install).unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));
    assert!(!SECOND.is_initialized(&registry));
    assert_eq!(
        Function::find_all(&registry, "audio::db_to_gain")[0].module(),
        FIRST.id()
    );
}
