use pflow::core::template::{
    has_templates, interpolate, resolution_context, resolve_nested, resolve_string,
    resolve_value, template_paths, variable_exists,
};
use serde_json::{json, Map, Value};

fn context(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn json_text_output_is_traversed_by_later_references() {
    let ctx = context(json!({
        "first": {"stdout": "{\"items\": [1, 2, 3], \"meta\": {\"ok\": true}}"}
    }));

    assert_eq!(resolve_value("first.stdout.items[0]", &ctx), Some(json!(1)));
    assert_eq!(resolve_value("first.stdout.meta.ok", &ctx), Some(json!(true)));
    assert_eq!(
        resolve_string("echo ${first.stdout.items[2]}", &ctx),
        json!("echo 3")
    );
    assert!(!variable_exists("first.stdout.items[7]", &ctx));
}

#[test]
fn simple_templates_keep_their_type_and_text_templates_stringify() {
    let ctx = context(json!({
        "count": 42,
        "flag": false,
        "config": {"retries": 3},
        "nothing": null
    }));

    assert_eq!(resolve_string("${count}", &ctx), json!(42));
    assert_eq!(resolve_string("${config}", &ctx), json!({"retries": 3}));
    assert_eq!(resolve_string("${nothing}", &ctx), Value::Null);
    assert_eq!(
        resolve_string("n=${count} flag=${flag} none=[${nothing}]", &ctx),
        json!("n=42 flag=False none=[]")
    );
}

#[test]
fn unresolved_markers_survive_verbatim() {
    let ctx = context(json!({"known": "yes"}));
    assert_eq!(
        interpolate("${known} and ${unknown.path}", &ctx),
        "yes and ${unknown.path}"
    );
    assert_eq!(resolve_string("${unknown}", &ctx), json!("${unknown}"));
}

#[test]
fn nested_params_resolve_and_inline_json_is_parsed() {
    let ctx = context(json!({
        "fetch": {"body": "{\"id\": 7}"},
        "token": "abc"
    }));
    let params = json!({
        "headers": {"Authorization": "Bearer ${token}"},
        "payload": {"record": "${fetch.body}"},
        "ids": ["${fetch.body.id}", "literal"]
    });

    assert!(has_templates(&params));
    assert_eq!(
        resolve_nested(&params, &ctx),
        json!({
            "headers": {"Authorization": "Bearer abc"},
            "payload": {"record": {"id": 7}},
            "ids": [7, "literal"]
        })
    );
}

#[test]
fn initial_params_shadow_store_values() {
    let shared = context(json!({"topic": "from-store", "other": 1}));
    let initial = context(json!({"topic": "from-planner"}));
    let ctx = resolution_context(&shared, &initial);

    assert_eq!(resolve_string("${topic}", &ctx), json!("from-planner"));
    assert_eq!(resolve_string("${other}", &ctx), json!(1));
}

#[test]
fn extracts_paths_in_order() {
    assert_eq!(
        template_paths("${a.b} then ${c[0].d} then ${a.b}"),
        vec!["a.b", "c[0].d", "a.b"]
    );
}
