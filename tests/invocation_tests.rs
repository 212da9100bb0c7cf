//! Overload resolution and invocation through the public wrappers.

use refract::prelude::*;
use refract::{ArgBinding, DiagnosticCode, primitives};

#[derive(Clone, Debug, Default, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Typed for Point {
    fn type_name() -> &'static str {
        "Point"
    }
}

impl Reflect for Point {
    fn describe(t: &mut TypeBuilder<'_, Self>) {
        t.field("x", |p| &p.x, |p| &mut p.x);
        t.field("y", |p| &p.y, |p| &mut p.y);
        t.constructor(|x: i32, y: i32| Point { x, y });

        t.static_method("mul", |a: i32, b: i32| a * b);
        t.static_method("mul", |a: f64, b: f64| a * b);

        t.method("scaled", |p: &Point, k: i32| Point {
            x: p.x * k,
            y: p.y * k,
        });
        t.method_mut("translate", |p: &mut Point, dx: i32, dy: i32| {
            p.x += dx;
            p.y += dy;
        });
        t.property_rw("sum", |p: &Point| p.x + p.y, |p: &mut Point, v: i32| {
            p.x = v;
            p.y = 0;
        });
    }
}

#[derive(Clone, Debug, Default)]
struct Named {
    point: Point,
    label: String,
}

impl Typed for Named {
    fn type_name() -> &'static str {
        "NamedPoint"
    }
}

impl Reflect for Named {
    fn describe(t: &mut TypeBuilder<'_, Self>) {
        t.base::<Point, _, _>(|n| &n.point, |n| &mut n.point);
        t.field("label", |n| &n.label, |n| &mut n.label);
    }
}

fn pick(a: f32, b: f64) -> f64 {
    f64::from(a) + b
}

// =============================================================================
// Constructors
// =============================================================================

#[test]
fn construct_with_exact_arguments() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    let p = point
        .construct(&[Value::new(3i32), Value::new(4i32)])
        .unwrap();
    assert_eq!(p.get::<Point>(), Some(&Point { x: 3, y: 4 }));
}

#[test]
fn construct_with_converting_arguments() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    let p = point
        .construct(&[Value::new(3.5f64), Value::new(4.0f32)])
        .unwrap();
    assert_eq!(p.get::<Point>(), Some(&Point { x: 3, y: 4 }));
}

#[test]
fn construct_reports_arity_problems() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    let err = point.construct(&[Value::new(1i32)]).unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(diagnostics.candidates.len(), 1);
    assert_eq!(diagnostics.candidates[0].code, DiagnosticCode::ArityMismatch);
}

#[test]
fn resolved_constructor_is_reusable() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    let ctor = point
        .resolve_constructor(&[primitives::I64, primitives::I64])
        .unwrap();
    assert!(!ctor.is_exact());
    for i in 0..3i64 {
        let p = ctor
            .invoke(Receiver::None, &[Value::new(i), Value::new(-i)])
            .unwrap();
        assert_eq!(p.get::<Point>(), Some(&Point { x: i as i32, y: -i as i32 }));
    }
}

// =============================================================================
// Methods
// =============================================================================

#[test]
fn mixed_arguments_select_the_floating_overload() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    let result = point
        .invoke_static("mul", &[Value::new(3i32), Value::new(2.5f64)])
        .unwrap();
    assert_eq!(result.get::<f64>(), Some(&7.5));

    let result = point
        .invoke_static("mul", &[Value::new(3i32), Value::new(2i32)])
        .unwrap();
    assert_eq!(result.get::<i32>(), Some(&6));
}

#[test]
fn f32_argument_prefers_the_f64_overload() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    let call = point
        .resolve_method("mul", &[primitives::F32, primitives::F32])
        .unwrap();
    assert_eq!(call.params(), &[primitives::F64, primitives::F64]);
    assert_eq!(call.bindings(), &[ArgBinding::Convert, ArgBinding::Convert]);
}

#[test]
fn instance_methods_need_a_receiver() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);
    let p = Point { x: 1, y: 2 };

    let scaled = point
        .invoke(Receiver::shared(&p), "scaled", &[Value::new(3u8)])
        .unwrap();
    assert_eq!(scaled.get::<Point>(), Some(&Point { x: 3, y: 6 }));

    let err = point
        .invoke(Receiver::None, "scaled", &[Value::new(3i32)])
        .unwrap_err();
    assert!(matches!(err, ReflectError::MissingReceiver(_)));
}

#[test]
fn mutating_methods_write_through() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);
    let mut p = Point::default();

    let result = point
        .invoke(
            Receiver::exclusive(&mut p),
            "translate",
            &[Value::new(5i32), Value::new(-2i16)],
        )
        .unwrap();
    assert!(result.is_void());
    assert_eq!(p, Point { x: 5, y: -2 });

    let translate = &point.methods_named("translate")[0];
    assert!(translate.is_mutating());
    assert!(!translate.is_static());
    assert_eq!(
        translate
            .invoke(Receiver::shared(&p), &[Value::new(1i32), Value::new(1i32)])
            .unwrap_err(),
        ReflectError::MissingReceiver("Point".to_string())
    );
}

#[test]
fn unknown_method_and_bad_arguments() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);

    assert_eq!(
        point.invoke_static("divide", &[]).unwrap_err(),
        ReflectError::not_found("method", "Point::divide")
    );

    let err = point
        .invoke_static("mul", &[Value::new(String::from("3")), Value::new(1i32)])
        .unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(diagnostics.candidates.len(), 2);
    assert!(
        diagnostics
            .candidates
            .iter()
            .all(|c| c.code == DiagnosticCode::NotConvertible)
    );
}

#[test]
fn methods_are_found_through_bases() {
    let registry = Registry::new();
    let named = Type::in_registry::<Named>(&registry);
    assert!(named.derives_from(Point::type_hash()));
    assert!(!Type::in_registry::<Point>(&registry).derives_from(Named::type_hash()));

    let n = Named {
        point: Point { x: 2, y: 5 },
        label: "origin".to_string(),
    };
    let scaled = named
        .invoke(Receiver::shared(&n), "scaled", &[Value::new(2i32)])
        .unwrap();
    assert_eq!(scaled.get::<Point>(), Some(&Point { x: 4, y: 10 }));

    let call = named.resolve_method("scaled", &[primitives::I32]).unwrap();
    assert_eq!(call.upcast_depth(), 1);

    let base = &named.bases()[0];
    assert_eq!(base.base_type().unwrap().name().as_ref(), "Point");
    let projected = base.project(&n).unwrap();
    assert_eq!(projected.get::<Point>(), Some(&n.point));
}

// =============================================================================
// Fields and properties
// =============================================================================

#[test]
fn field_get_and_set() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);
    let mut p = Point { x: 7, y: 8 };

    let x = point.field("x").unwrap();
    assert_eq!(x.get(&p).unwrap().get::<i32>(), Some(&7));
    x.set(&mut p, &Value::new(40i64)).unwrap();
    assert_eq!(p.x, 40);

    assert_eq!(
        point.get_field(&p, "y").unwrap().get::<i32>(),
        Some(&8)
    );
    assert!(matches!(
        x.set(&mut p, &Value::new(String::from("nope"))),
        Err(ReflectError::TypeMismatch { .. })
    ));
    assert!(matches!(
        x.get(&String::new()),
        Err(ReflectError::MissingReceiver(_))
    ));
}

#[test]
fn read_write_property() {
    let registry = Registry::new();
    let point = Type::in_registry::<Point>(&registry);
    let mut p = Point { x: 1, y: 2 };

    let sum = point.property("sum").unwrap();
    assert!(!sum.is_read_only());
    assert_eq!(sum.get(&p).unwrap().get::<i32>(), Some(&3));

    sum.set(&mut p, &Value::new(10u8)).unwrap();
    assert_eq!(p, Point { x: 10, y: 0 });
}

// =============================================================================
// Global functions
// =============================================================================

#[test]
fn global_function_overloads() {
    let registry = Registry::new();
    registry
        .register_function(refract::ModuleId::HOST, "pick", pick)
        .unwrap();
    registry
        .register_function(refract::ModuleId::HOST, "pick", |a: i64| a)
        .unwrap();

    let functions = Function::find_all(&registry, "pick");
    assert_eq!(functions.len(), 2);
    assert_eq!(functions[0].params(), vec![primitives::F32, primitives::F64]);

    let result = registry
        .invoke_function("pick", &[Value::new(1.5f32), Value::new(2i32)])
        .unwrap();
    assert_eq!(result.get::<f64>(), Some(&3.5));

    let result = functions[1].invoke(&[Value::new(9u16)]).unwrap();
    assert_eq!(result.get::<i64>(), Some(&9));

    assert_eq!(
        registry.invoke_function("missing", &[]).unwrap_err().kind(),
        refract::ErrorKind::NotFound
    );
}
