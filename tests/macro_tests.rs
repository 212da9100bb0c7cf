//! Tests for `#[derive(Reflect)]`.

use std::sync::Arc;

use refract::prelude::*;
use refract::{AttributeValue, primitives};

#[derive(Clone, Debug, Default, PartialEq, Reflect)]
struct Plain {
    count: u32,
    r#type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Reflect)]
#[reflect(name = "ui::Widget", default)]
struct Widget {
    #[reflect(name = "id", attr(readonly = true))]
    widget_id: u64,
    visible: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Reflect)]
#[reflect(name = "ui::Button", describe = "Button::describe_extra")]
struct Button {
    #[reflect(base)]
    widget: Widget,
    caption: String,
}

impl Button {
    fn describe_extra(t: &mut TypeBuilder<'_, Self>) {
        t.method("caption_len", |b: &Button| b.caption.len() as u64);
        t.attribute("clickable", true);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Reflect)]
struct Rgb(u8, u8, u8);

#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
#[reflect(attr(flags = false))]
enum Level {
    Low,
    Mid = 5,
    High,
}

#[test]
fn default_name_is_the_identifier() {
    assert_eq!(Plain::type_name(), "Plain");
    assert_eq!(Widget::type_name(), "ui::Widget");
    assert_eq!(Widget::type_hash(), TypeHash::from_name("ui::Widget"));
}

#[test]
fn raw_identifiers_are_unescaped() {
    let registry = Registry::new();
    let plain = Type::in_registry::<Plain>(&registry);

    let names: Vec<_> = plain.fields().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec![Arc::from("count"), Arc::from("type")]);
    assert_eq!(plain.field("type").unwrap().type_hash(), primitives::STRING);
}

#[test]
fn renamed_field_with_attributes() {
    let registry = Registry::new();
    let widget = Type::in_registry::<Widget>(&registry);

    assert!(widget.field("widget_id").is_none());
    let id = widget.field("id").unwrap();
    assert_eq!(id.type_hash(), primitives::U64);
    assert_eq!(id.attribute("readonly"), Some(AttributeValue::Bool(true)));
    assert_eq!(id.offset(), Some(std::mem::offset_of!(Widget, widget_id)));
}

#[test]
fn default_attribute_registers_a_constructor() {
    let registry = Registry::new();
    let widget = Type::in_registry::<Widget>(&registry);
    assert_eq!(widget.constructors().len(), 1);
    assert!(widget.constructors()[0].params().is_empty());
    assert_eq!(
        widget.construct_default().unwrap().get::<Widget>(),
        Some(&Widget::default())
    );

    // no `default`, no constructor
    let button = Type::in_registry::<Button>(&registry);
    assert!(button.constructors().is_empty());
}

#[test]
fn base_fields_become_base_links() {
    let registry = Registry::new();
    let button = Type::in_registry::<Button>(&registry);

    assert_eq!(button.fields().len(), 1);
    assert_eq!(button.bases().len(), 1);
    assert_eq!(button.bases()[0].type_hash(), Widget::type_hash());
    assert!(button.derives_from(Widget::type_hash()));

    let b = Button {
        widget: Widget {
            widget_id: 9,
            visible: true,
        },
        caption: "OK".to_string(),
    };
    let widget = button.bases()[0].upcast(&b).unwrap();
    assert_eq!(widget.downcast_ref::<Widget>(), Some(&b.widget));
}

#[test]
fn describe_hook_runs_after_generated_members() {
    let registry = Registry::new();
    let button = Type::in_registry::<Button>(&registry);
    let b = Button {
        caption: "Apply".to_string(),
        ..Button::default()
    };

    assert_eq!(button.attribute("clickable"), Some(AttributeValue::Bool(true)));
    let len = button
        .invoke(Receiver::shared(&b), "caption_len", &[])
        .unwrap();
    assert_eq!(len.get::<u64>(), Some(&5));
}

#[test]
fn tuple_fields_are_named_by_position() {
    let registry = Registry::new();
    let rgb = Type::in_registry::<Rgb>(&registry);
    let color = Rgb(10, 20, 30);

    assert_eq!(rgb.fields().len(), 3);
    assert_eq!(
        rgb.get_field(&color, "1").unwrap().get::<u8>(),
        Some(&20)
    );
}

#[test]
fn unit_enums_register_their_discriminants() {
    let registry = Registry::new();
    let level = Type::in_registry::<Level>(&registry);

    assert!(level.is_enum());
    let values: Vec<_> = level
        .enum_values()
        .iter()
        .map(|v| (v.name().to_string(), v.value()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("Low".to_string(), 0),
            ("Mid".to_string(), 5),
            ("High".to_string(), 6),
        ]
    );
    assert_eq!(level.attribute("flags"), Some(AttributeValue::Bool(false)));
}
