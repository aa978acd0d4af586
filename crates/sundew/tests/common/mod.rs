#![allow(dead_code)]

use serde_json::Value as Json;
use sundew::dom::{MemoryDocument, NodeId};
use sundew::{BindConfig, Object, Registrar, Value};

pub type TestRegistrar = Registrar<MemoryDocument>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn model(json: Json) -> Object {
    match Value::from(json) {
        Value::Object(object) => object,
        other => panic!("model must be an object, got {other:?}"),
    }
}

/// Bind `markup` against a JSON model with the default config.
pub fn setup(markup: &str, json: Json) -> (TestRegistrar, Object) {
    setup_with_config(markup, json, BindConfig::default())
}

pub fn setup_with_config(markup: &str, json: Json, config: BindConfig) -> (TestRegistrar, Object) {
    init_logging();
    let document = MemoryDocument::parse(markup).expect("test markup parses");
    let root = model(json);
    let registrar = sundew::bind_with_config(document, None, Some(root.clone()), config);
    (registrar, root)
}

pub fn node(registrar: &TestRegistrar, id: &str) -> NodeId {
    registrar
        .document()
        .find_by_id(id)
        .unwrap_or_else(|| panic!("no element with id `{id}`"))
}

pub fn text(registrar: &TestRegistrar, id: &str) -> String {
    registrar.document().text_content(node(registrar, id))
}

pub fn attribute(registrar: &TestRegistrar, id: &str, name: &str) -> Option<String> {
    use sundew::dom::Document;
    registrar.document().attribute(node(registrar, id), name)
}
