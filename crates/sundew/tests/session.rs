//! Session-level behavior: configuration, diagnostics, scheduling, teardown.

mod common;

use common::{node, setup, setup_with_config, text};
use serde_json::json;
use sundew::dom::{Document, MemoryDocument};
use sundew::parser::ParseErrorKind;
use sundew::{BindConfig, DiagnosticKind, Object, Value};

#[test]
fn unknown_directives_are_reported_and_skipped() {
    let (registrar, _root) = setup(r#"<p id="p" sd-iff="x"></p>"#, json!({}));
    let p = node(&registrar, "p");

    assert!(!registrar.is_registered(p));
    let entries = registrar.diagnostics().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attribute, "sd-iff");
    assert_eq!(entries[0].kind, DiagnosticKind::UnknownDirective("sd-iff".into()));
}

#[test]
fn malformed_sub_bindings_do_not_block_the_rest() {
    let (mut registrar, _root) = setup(
        r#"<p id="p" sd-attr="title:t; oops; lang:l"></p>"#,
        json!({"t": "T", "l": "en"}),
    );
    let entries = registrar.diagnostics().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiagnosticKind::Parse(ParseErrorKind::MissingSeparator));
    assert_eq!(entries[0].span, 9..13);

    let report = entries[0].report();
    assert!(report.contains("expected `name:reference`"), "{report}");

    registrar.tick();
    let p = node(&registrar, "p");
    assert_eq!(registrar.document().attribute(p, "title").as_deref(), Some("T"));
    assert_eq!(registrar.document().attribute(p, "lang").as_deref(), Some("en"));
}

#[test]
fn custom_prefix() {
    let config = BindConfig::from_json(r#"{"prefix": "x-"}"#).unwrap();
    let (mut registrar, _root) = setup_with_config(
        r#"<p id="a" x-html="msg"></p><p id="b" sd-html="msg"></p>"#,
        json!({"msg": "hi"}),
        config,
    );
    registrar.tick();
    assert_eq!(text(&registrar, "a"), "hi");
    assert_eq!(text(&registrar, "b"), "");
    assert!(registrar.diagnostics().is_empty());
}

#[test]
fn diagnostics_are_capped() {
    let config = BindConfig {
        max_diagnostics: 1,
        ..BindConfig::default()
    };
    let (registrar, _root) = setup_with_config(r#"<p sd-one="" sd-two=""></p>"#, json!({}), config);
    assert_eq!(registrar.diagnostics().len(), 1);
    assert_eq!(registrar.diagnostics().dropped(), 1);
}

#[test]
fn advance_runs_due_ticks_and_respects_pause() {
    let config = BindConfig {
        interval_ms: 50,
        ..BindConfig::default()
    };
    let (mut registrar, root) = setup_with_config(
        r#"<b id="v" sd-html="v"></b>"#,
        json!({"v": "one"}),
        config,
    );

    assert!(registrar.advance(40).is_empty());
    let reports = registrar.advance(80);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].changed, 1);
    assert_eq!(reports[1].changed, 0);
    assert_eq!(text(&registrar, "v"), "one");

    registrar.pause();
    root.insert("v", "two");
    assert!(registrar.advance(1000).is_empty());
    assert_eq!(text(&registrar, "v"), "one");

    registrar.resume();
    let reports = registrar.advance(50);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tick, 3);
    assert_eq!(text(&registrar, "v"), "two");
    assert_eq!(registrar.ticks(), 3);
}

#[test]
fn start_paused_waits_for_resume() {
    let config = BindConfig::from_json(r#"{"start_paused": true, "interval_ms": 10}"#).unwrap();
    let (mut registrar, _root) = setup_with_config(r#"<b id="v" sd-html="v"></b>"#, json!({"v": 1}), config);

    assert!(registrar.is_paused());
    assert!(registrar.advance(100).is_empty());
    registrar.resume();
    assert_eq!(registrar.advance(25).len(), 2);
    assert_eq!(text(&registrar, "v"), "1");
}

#[test]
fn unregister_is_idempotent() {
    let (mut registrar, _root) = setup(
        r#"<div sd-if="on"><a sd-attr="href:url" sd-on="click:go"></a></div><p sd-html="x"></p>"#,
        json!({"on": true, "url": "/"}),
    );
    registrar.tick();
    assert_eq!(registrar.element_count(), 3);

    let body = registrar.document().body();
    assert_eq!(registrar.unregister(body), 3);
    assert_eq!(registrar.dependency_count(), 0);
    assert_eq!(registrar.listener_count(), 0);
    assert_eq!(registrar.document().listener_count(), 0);
    assert_eq!(registrar.unregister(body), 0);
}

#[test]
fn bind_targets_a_subtree() {
    let document = MemoryDocument::parse(
        r#"<section id="inside"><b id="in" sd-html="v"></b></section><b id="out" sd-html="v"></b>"#,
    )
    .unwrap();
    let inside = document.find_by_id("inside").unwrap();
    let root = Object::new();
    root.insert("v", Value::from("bound"));

    let mut registrar = sundew::bind(document, Some(inside), Some(root));
    registrar.tick();
    assert_eq!(text(&registrar, "in"), "bound");
    assert_eq!(text(&registrar, "out"), "");
}

#[test]
fn sessions_default_to_the_shared_globals() {
    sundew::globals().insert("session_greeting", "hello");
    let document = MemoryDocument::parse(r#"<b id="g" sd-html="session_greeting"></b>"#).unwrap();

    let mut registrar = sundew::bind(document, None, None);
    registrar.tick();
    assert_eq!(text(&registrar, "g"), "hello");
    assert!(registrar.root().ptr_eq(&sundew::globals()));
    sundew::globals().remove("session_greeting");
}

#[test]
fn registering_twice_does_not_duplicate_dependencies() {
    let (mut registrar, _root) = setup(r#"<p sd-html="x" sd-attr="title:x"></p>"#, json!({"x": "y"}));
    assert_eq!(registrar.dependency_count(), 2);

    let body = registrar.document().body();
    registrar.register(body, sundew::Scope::new());
    assert_eq!(registrar.dependency_count(), 2);
    assert_eq!(registrar.element_count(), 1);
}
