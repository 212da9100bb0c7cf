//! Registration and query tests against isolated registries.

use std::sync::Arc;
use std::thread;

use refract::prelude::*;
use refract::{AttributeValue, ModuleId, RegistryConfig, primitives};

#[derive(Clone, Debug, Default, Reflect)]
#[reflect(name = "geo::Vec2", default, attr(unit = "metre", dims = 2))]
struct Vec2 {
    #[reflect(attr(min = -100.0, max = 100.0))]
    x: f32,
    y: f32,
    #[reflect(skip)]
    #[allow(dead_code)]
    cache: Option<u64>,
}

#[derive(Clone, Debug, Default)]
struct Segment {
    from: Vec2,
    to: Vec2,
}

impl Typed for Segment {
    fn type_name() -> &'static str {
        "geo::Segment"
    }
}

impl Reflect for Segment {
    fn describe(t: &mut TypeBuilder<'_, Self>) {
        t.field("from", |s| &s.from, |s| &mut s.from);
        t.field("to", |s| &s.to, |s| &mut s.to);
        t.property("length", |s: &Segment| {
            let (dx, dy) = (s.to.x - s.from.x, s.to.y - s.from.y);
            (dx * dx + dy * dy).sqrt()
        });
        // refers back to Segment while Segment is still being described
        t.method("joins", |a: &Segment, b: Segment| {
            a.to.x == b.from.x && a.to.y == b.from.y
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
#[reflect(name = "geo::Axis")]
enum Axis {
    Horizontal = 1,
    Vertical = 2,
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn registration_is_idempotent() {
    let registry = Registry::new();
    let first = registry.ensure_registered::<Vec2>();
    let count = registry.type_count();

    assert_eq!(registry.ensure_registered::<Vec2>(), first);
    assert_eq!(registry.type_count(), count);
    assert_eq!(Type::in_registry::<Vec2>(&registry).handle(), first);
}

#[test]
fn referenced_types_are_registered_transitively() {
    let registry = Registry::new();
    let segment = Type::in_registry::<Segment>(&registry);

    assert!(Type::find(&registry, "geo::Vec2").is_some());
    assert!(Type::find_by_hash(&registry, primitives::F32).is_some());
    assert!(Type::find_by_hash(&registry, primitives::BOOL).is_some());

    let from = segment.field("from").unwrap();
    assert_eq!(from.type_hash(), Vec2::type_hash());
    assert_eq!(segment.methods_named("joins").len(), 1);
    assert_eq!(
        segment.methods_named("joins")[0].params(),
        vec![Segment::type_hash()]
    );
}

#[test]
fn type_identity() {
    let registry = Registry::new();
    let vec2 = Type::in_registry::<Vec2>(&registry);

    assert_eq!(&*vec2.name(), "geo::Vec2");
    assert_eq!(vec2.type_hash(), TypeHash::from_name("geo::Vec2"));
    assert_eq!(vec2.module(), ModuleId::HOST);
    assert_eq!(vec2.size(), size_of::<Vec2>());
    assert_eq!(vec2.align(), align_of::<Vec2>());
    assert!(!vec2.is_enum());
    assert!(!vec2.is_primitive());
    assert!(Type::in_registry::<f32>(&registry).is_primitive());
}

#[test]
fn lookup_misses_return_none() {
    let registry = Registry::new();
    registry.ensure_registered::<Vec2>();

    assert!(Type::find(&registry, "geo::Vec3").is_none());
    assert!(Type::find_by_hash(&registry, TypeHash::from_name("geo::Vec3")).is_none());
    assert!(
        Type::in_registry::<Vec2>(&registry)
            .field("z")
            .is_none()
    );
}

// =============================================================================
// Members
// =============================================================================

#[test]
fn fields_keep_declaration_order_and_skip() {
    let registry = Registry::new();
    let vec2 = Type::in_registry::<Vec2>(&registry);

    let names: Vec<_> = vec2.fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec![Arc::from("x"), Arc::from("y")]);
    assert_eq!(vec2.field("y").unwrap().offset(), Some(std::mem::offset_of!(Vec2, y)));
}

#[test]
fn attributes_at_type_and_field_level() {
    let registry = Registry::new();
    let vec2 = Type::in_registry::<Vec2>(&registry);

    assert_eq!(
        vec2.attribute("unit"),
        Some(AttributeValue::String(Arc::from("metre")))
    );
    assert_eq!(vec2.attribute("dims"), Some(AttributeValue::Int(2)));
    assert_eq!(vec2.attributes().len(), 2);

    let x = vec2.field("x").unwrap();
    assert_eq!(x.attribute("min"), Some(AttributeValue::from(-100.0)));
    assert_eq!(x.attribute("max"), Some(AttributeValue::from(100.0)));
    assert_eq!(x.attribute("unit"), None);
}

#[test]
fn properties_are_read_only_without_setter() {
    let registry = Registry::new();
    let segment = Type::in_registry::<Segment>(&registry);
    let length = segment.property("length").unwrap();
    assert!(length.is_read_only());
    assert_eq!(length.type_hash(), primitives::F32);

    let mut s = Segment {
        from: Vec2::default(),
        to: Vec2 {
            x: 3.0,
            y: 4.0,
            cache: None,
        },
    };
    assert_eq!(length.get(&s).unwrap().get::<f32>(), Some(&5.0));
    assert_eq!(
        length.set(&mut s, &Value::new(1.0f32)),
        Err(ReflectError::ReadOnlyProperty("length".to_string()))
    );
}

#[test]
fn enum_values_both_directions() {
    let registry = Registry::new();
    let axis = Type::in_registry::<Axis>(&registry);

    assert!(axis.is_enum());
    assert_eq!(axis.enum_values().len(), 2);
    assert_eq!(axis.enum_value("Vertical"), Some(Axis::Vertical as i64));
    assert_eq!(axis.enum_name(1).as_deref(), Some("Horizontal"));
    assert_eq!(axis.enum_name(7), None);
}

#[test]
fn extend_adds_members_to_a_registered_type() {
    let registry = Registry::new();
    let vec2 = Type::in_registry::<Vec2>(&registry);
    let before = vec2.methods().len();

    registry.extend::<Vec2>(|t| {
        t.method("dot", |a: &Vec2, b: Vec2| a.x * b.x + a.y * b.y);
        t.attribute("extended", true);
    });
    // duplicates of existing members are ignored
    registry.extend::<Vec2>(|t| {
        t.method("dot", |a: &Vec2, b: Vec2| a.x * b.x + a.y * b.y);
    });

    assert_eq!(vec2.methods().len(), before + 1);
    assert_eq!(vec2.attribute("extended"), Some(AttributeValue::Bool(true)));
    assert!(vec2.is_valid());
}

#[test]
fn default_constructors_follow_config() {
    let registry = Registry::with_config(RegistryConfig::default().with_default_constructors(false));
    let vec2 = Type::in_registry::<Vec2>(&registry);
    assert!(vec2.constructors().is_empty());
    assert_eq!(
        vec2.construct_default().unwrap_err(),
        ReflectError::NotConstructible
    );

    let registry = Registry::new();
    let vec2 = Type::in_registry::<Vec2>(&registry);
    assert_eq!(vec2.constructors().len(), 1);
    assert!(vec2.construct_default().unwrap().is::<Vec2>());
}

#[test]
fn concurrent_registration_yields_one_row() {
    let registry = Registry::new();

    let handles: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.ensure_registered::<Segment>()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
    let segments = registry
        .types()
        .into_iter()
        .filter(|&h| Type::from_handle(&registry, h).type_hash() == Segment::type_hash())
        .count();
    assert_eq!(segments, 1);
}
