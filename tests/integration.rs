//! Integration tests for sepcon.
//!
//! These drive whole scopes through the public API: definitions, tags,
//! mounting into a headless document, events and debounced global data.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use sepcon::change::ChangeSet;
use sepcon::sequence::Phase;
use sepcon::tag::refs;
use sepcon::testing::{Pilot, Recorder};
use sepcon::{
    ComponentDefinition, DataDefinition, Diagnostic, Hook, ModifierDefinition, ScopeConfig,
    SequenceName, SequenceOutcome, SequenceStatus,
};

fn keys(changes: &ChangeSet) -> String {
    changes.keys().collect::<Vec<_>>().join(",")
}

fn number(value: Option<Value>) -> i64 {
    value.and_then(|v| v.as_i64()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Referenced props
// ---------------------------------------------------------------------------

/// Parent bumps `path` after mount; child references it as `check`.
fn bump_referenced(propagate: bool, initial: Value, path: &'static str, patch: fn(i64) -> Value) -> Vec<String> {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    let child = scope
        .create_component(ComponentDefinition::new("child").on_change({
            let log = log.clone();
            move |_, changes| {
                if let Some(v) = changes.new_value("check") {
                    log.push(format!("check {v}"));
                }
                true
            }
        }))
        .unwrap();
    let parent = scope
        .create_component(
            ComponentDefinition::new("parent")
                .local_prop(path.split('.').next().unwrap(), initial)
                .on(Hook::PostMount, move |ctx, _| {
                    let n = number(ctx.get_prop(path));
                    ctx.set_props(patch(n + 1), propagate);
                })
                .on_change(|_, _| false)
                .render(move |_, _| Some(child.create_tag().ref_props(refs([("check", path)])).render())),
        )
        .unwrap();

    pilot.mount(&parent.create_tag().id("p").render()).unwrap();
    assert_eq!(pilot.props("p/child:0").unwrap()["check"], json!(1));
    log.take()
}

#[test]
fn referenced_prop_follows_parent_once() {
    for propagate in [true, false] {
        let log = bump_referenced(propagate, json!(0), "passedProp", |n| json!({"passedProp": n}));
        assert_eq!(log, vec!["check 1"], "propagate = {propagate}");
    }
}

#[test]
fn referenced_sub_property_follows_parent() {
    for propagate in [true, false] {
        let log = bump_referenced(
            propagate,
            json!({"passedProp": 0}),
            "mainObj.passedProp",
            |n| json!({"mainObj": {"passedProp": n}}),
        );
        assert_eq!(log, vec!["check 1"], "propagate = {propagate}");
    }
}

#[test]
fn references_cascade_through_grandchildren() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    let child = scope
        .create_component(ComponentDefinition::new("child").on_change({
            let log = log.clone();
            move |_, changes| {
                if let (Some(a), Some(b)) = (changes.new_value("checkChild1"), changes.new_value("checkChild2")) {
                    log.push(format!("child {a} {b}"));
                }
                true
            }
        }))
        .unwrap();
    let parent = scope
        .create_component(
            ComponentDefinition::new("parent")
                .on_change({
                    let log = log.clone();
                    move |_, changes| {
                        if let (Some(a), Some(b)) =
                            (changes.new_value("checkParent1"), changes.new_value("checkParent2"))
                        {
                            log.push(format!("parent {a} {b}"));
                        }
                        true
                    }
                })
                .render(move |_, _| {
                    Some(
                        child
                            .create_tag()
                            .ref_props([("checkChild1", "checkParent1"), ("checkChild2", "checkParent2")])
                            .render(),
                    )
                }),
        )
        .unwrap();
    let grandparent = scope
        .create_component(
            ComponentDefinition::new("grandparent")
                .local_prop("mainObj", json!({"passedProp": 0}))
                .local_prop("mainProp", json!("a"))
                .on_change(|_, _| false)
                .render(move |_, _| {
                    Some(
                        parent
                            .create_tag()
                            .ref_props([("checkParent1", "mainObj.passedProp"), ("checkParent2", "mainProp")])
                            .render(),
                    )
                }),
        )
        .unwrap();

    pilot.mount(&grandparent.create_tag().id("gp").render()).unwrap();
    assert!(log.is_empty());
    assert_eq!(
        Value::Object(pilot.props("gp/parent:0/child:0").unwrap()),
        json!({"checkChild1": 0, "checkChild2": "a"})
    );

    let gp = pilot.instance("gp").unwrap();
    scope.set_props(gp, json!({"mainObj": {"passedProp": 1}, "mainProp": "b"}), true);
    assert_eq!(log.take(), vec![r#"parent 1 "b""#, r#"child 1 "b""#]);
    assert_eq!(
        Value::Object(pilot.props("gp/parent:0/child:0").unwrap()),
        json!({"checkChild1": 1, "checkChild2": "b"})
    );
}

#[test]
fn external_prop_can_be_referenced() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    let child = scope
        .create_component(ComponentDefinition::new("child").on(Hook::Mount, {
            let log = log.clone();
            move |ctx, _| log.push(format!("check {}", number(ctx.get_prop("check"))))
        }))
        .unwrap();
    let parent = scope
        .create_component(ComponentDefinition::new("parent").render(move |ctx, _| {
            assert_eq!(ctx.get_prop("passedProp"), Some(json!(1)));
            Some(child.create_tag().ref_props([("check", "passedProp")]).render())
        }))
        .unwrap();

    pilot
        .mount(&parent.create_tag().prop("passedProp", json!(1)).render())
        .unwrap();
    assert_eq!(log.take(), vec!["check 1"]);
    assert!(pilot.take_diagnostics().is_empty());
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

#[test]
fn tag_methods_references_and_next() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    let child = scope
        .create_component(
            ComponentDefinition::new("child")
                .local_method("notify", {
                    let log = log.clone();
                    move |ctx, args| {
                        log.push(format!("child notify, next: {}", ctx.has_next()));
                        ctx.call_next(args)
                    }
                })
                .on(Hook::PostMount, {
                    let log = log.clone();
                    move |ctx, _| {
                        log.push(format!("notify={}", ctx.call("notify", &[json!(2)])));
                        log.push(format!("onSave={}", ctx.call("onSave", &[])));
                    }
                }),
        )
        .unwrap();
    let parent = scope
        .create_component(
            ComponentDefinition::new("parent")
                .local_method("save", {
                    let log = log.clone();
                    move |ctx, _| {
                        log.push(format!("save in {}", ctx.identifier()));
                        json!("saved")
                    }
                })
                .render({
                    let log = log.clone();
                    move |_, _| {
                        let log = log.clone();
                        Some(
                            child
                                .create_tag()
                                .method("notify", move |ctx, args| {
                                    log.push(format!("tag notify for {}", ctx.identifier()));
                                    args.first().cloned().unwrap_or(Value::Null)
                                })
                                .ref_methods([("onSave", "save")])
                                .render(),
                        )
                    }
                }),
        )
        .unwrap();

    pilot.mount(&parent.create_tag().id("p").render()).unwrap();
    assert_eq!(
        log.take(),
        vec![
            "child notify, next: true",
            "tag notify for p/child:0",
            "notify=2",
            "save in p",
            r#"onSave="saved""#,
        ]
    );
}

#[test]
fn unknown_method_is_reported() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let lonely = scope
        .create_component(ComponentDefinition::new("lonely").on(Hook::Mount, |ctx, _| {
            assert_eq!(ctx.call("ghost", &[]), Value::Null);
            assert_eq!(ctx.call_next(&[]), Value::Null);
        }))
        .unwrap();
    pilot.mount(&lonely.create_tag().id("l").render()).unwrap();
    assert_eq!(
        pilot.take_diagnostics(),
        vec![Diagnostic::MissingHandler {
            component: "l".into(),
            handler: "ghost".into(),
        }]
    );
}

// ---------------------------------------------------------------------------
// Local state
// ---------------------------------------------------------------------------

#[test]
fn own_state_update_rerenders() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    let counter = scope
        .create_component(
            ComponentDefinition::new("counter")
                .local_prop("count", json!(0))
                .on(Hook::Mount, |ctx, _| {
                    ctx.set_props(json!({"count": 1}), false);
                })
                .on_change({
                    let log = log.clone();
                    move |_, changes| {
                        let change = changes.get("count").unwrap();
                        log.push(format!(
                            "count {} -> {}",
                            change.old_value.clone().unwrap_or_default(),
                            change.new_value.clone().unwrap_or_default()
                        ));
                        true
                    }
                })
                .render({
                    let log = log.clone();
                    move |ctx, _| {
                        log.push("render");
                        Some(format!("<p>{}</p>", number(ctx.get_prop("count"))))
                    }
                }),
        )
        .unwrap();

    pilot.mount(&counter.create_tag().id("c").render()).unwrap();
    assert_eq!(log.take(), vec!["render", "count 0 -> 1", "render"]);
    assert_eq!(pilot.html("c").as_deref(), Some("<p>1</p>"));

    // Writing the same value again changes nothing.
    let c = pilot.instance("c").unwrap();
    assert!(scope.set_props(c, json!({"count": 1}), false).is_empty());
    assert!(log.is_empty());
}

#[test]
fn start_sequence_reports_its_outcome() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let picky = scope
        .create_component(
            ComponentDefinition::new("picky")
                .on_change(|_, changes| changes.contains("wanted"))
                .render(|_, _| Some("<i></i>".into())),
        )
        .unwrap();
    pilot.mount(&picky.create_tag().id("p").render()).unwrap();
    let p = pilot.instance("p").unwrap();

    let mut vetoed = scope.start_sequence(p, SequenceName::GlobalChange, ChangeSet::new());
    assert_eq!(
        vetoed.try_recv().unwrap(),
        SequenceOutcome {
            name: SequenceName::GlobalChange,
            status: SequenceStatus::Vetoed,
        }
    );

    let mut resumed = scope.start_sequence(p, SequenceName::Resume, ChangeSet::new());
    assert_eq!(
        resumed.try_recv().unwrap().status,
        SequenceStatus::Completed { rendered: false }
    );
    assert_eq!(scope.phase_of(p), Some(Phase::Mounted));
}

// ---------------------------------------------------------------------------
// Extension
// ---------------------------------------------------------------------------

#[test]
fn extended_component_keeps_parent_props_and_methods() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    scope
        .create_data(DataDefinition::new("globals", json!({"number": 5, "propToChange": null})))
        .unwrap();
    let parent = scope
        .create_component(
            ComponentDefinition::new("parent")
                .local_prop("number", json!(0))
                .local_prop("text", json!(""))
                .global_prop("num", "globals", "number")
                .local_method("printNumber", |ctx, _| ctx.get_prop("number").unwrap_or_default())
                .on(Hook::Mount, |ctx, _| {
                    ctx.set_props(json!({"number": 7, "text": "seven"}), true);
                })
                .render(|ctx, _| {
                    let props = ctx.props();
                    Some(format!("{} {} {}<br>", props["text"], props["number"], props["num"]))
                }),
        )
        .unwrap();
    let child = scope
        .create_component(
            ComponentDefinition::new("child")
                .extend(&parent)
                .local_prop("array", json!([]))
                .on(Hook::PostMount, {
                    let log = log.clone();
                    move |ctx, _| log.push(format!("printNumber={}", ctx.call("printNumber", &[])))
                }),
        )
        .unwrap();

    pilot.mount(&child.create_tag().id("c").render()).unwrap();
    assert_eq!(log.take(), vec!["printNumber=7"]);
    assert_eq!(
        Value::Object(pilot.props("c").unwrap()),
        json!({"array": [], "num": 5, "number": 7, "text": "seven"})
    );
    assert_eq!(pilot.html("c").as_deref(), Some(r#""seven" 7 5<br>"#));

    // Handles expose definitions as declared.
    assert!(parent.proto().state.hooks.contains_key(&Hook::Mount));
    assert!(parent.proto().state.methods.local.contains_key("printNumber"));
    assert!(child.proto().state.methods.local.is_empty());
    assert_eq!(child.proto().state.props.local.keys().collect::<Vec<_>>(), vec!["array"]);
}

#[test]
fn extended_modifier_inherits_and_adds_methods() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let data = scope
        .create_data(DataDefinition::new("globals", json!({"number": 5})))
        .unwrap();

    let parent = scope
        .create_modifier(
            ModifierDefinition::new("parent")
                .method("updateNumber", |ctx, args| {
                    let number = args.first().cloned().unwrap_or(json!(1000));
                    ctx.set_props("globals", json!({"number": number}));
                    Value::Null
                })
                .method("resetNumber", |ctx, _| {
                    ctx.set_props("globals", json!({"number": 0}));
                    ctx.get_prop("globals", "number").unwrap_or_default()
                }),
        )
        .unwrap();
    let base = parent.proto().get("updateNumber").unwrap();
    let child = scope
        .create_modifier(
            ModifierDefinition::new("child")
                .extend(&parent)
                .method("updateNumber", move |ctx, args| {
                    let doubled: Vec<Value> = args.iter().map(|a| json!(a.as_i64().unwrap_or(0) * 2)).collect();
                    base(ctx, &doubled)
                })
                .method("setNumber", |ctx, _| {
                    ctx.call("updateNumber", &[]);
                    ctx.get_prop("globals", "number").unwrap_or_default()
                }),
        )
        .unwrap();

    assert_eq!(child.proto().methods.len(), 2);
    assert!(child.proto().get("resetNumber").is_none());

    child.call("updateNumber", &[json!(21)]).unwrap();
    assert_eq!(data.get_prop("number"), Some(json!(42)));
    assert_eq!(child.call("resetNumber", &[]).unwrap(), json!(0));
    assert_eq!(child.call("setNumber", &[]).unwrap(), json!(1000));
    assert_eq!(parent.call("setNumber", &[]).unwrap(), Value::Null);
    assert_eq!(
        pilot.take_diagnostics(),
        vec![Diagnostic::MissingHandler {
            component: "parent".into(),
            handler: "setNumber".into(),
        }]
    );

    // A component reaches the inherited method through its global method.
    let widget = scope
        .create_component(
            ComponentDefinition::new("widget")
                .global_method("update", "child", "updateNumber")
                .on(Hook::Mount, |ctx, _| {
                    ctx.call("update", &[json!(4)]);
                }),
        )
        .unwrap();
    pilot.mount(&widget.create_tag().render()).unwrap();
    assert_eq!(data.get_prop("number"), Some(json!(8)));
}

#[test]
fn extended_data_starts_from_parent_value() {
    let scope = sepcon::create_scope();
    let base = scope
        .create_data(DataDefinition::new("base", json!({"a": 1, "nested": {"x": 1}})))
        .unwrap();
    let more = scope
        .create_data(DataDefinition::new("more", json!({"b": 2, "nested": {"y": 2}})).extend(&base))
        .unwrap();
    assert_eq!(
        Value::Object(more.value().unwrap()),
        json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 2}})
    );
    assert_eq!(Value::Object(base.value().unwrap()), json!({"a": 1, "nested": {"x": 1}}));
}

// ---------------------------------------------------------------------------
// Global data
// ---------------------------------------------------------------------------

fn reader_scope(log: &Recorder) -> (Pilot, sepcon::ModifierHandle) {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    scope
        .create_data(DataDefinition::new("globals", json!({"number": 5, "text": "a", "other": 0})))
        .unwrap();
    let modifier = scope
        .create_modifier(ModifierDefinition::new("globals").method("update", |ctx, args| {
            ctx.set_props("globals", json!({"number": args.first().cloned().unwrap_or_default()}));
            ctx.set_props("globals", json!({"text": "b"}));
            ctx.set_props("globals", json!({"other": 1}));
            Value::Null
        }))
        .unwrap();
    let reader = scope
        .create_component(
            ComponentDefinition::new("reader")
                .global_prop("num", "globals", "number")
                .global_prop("txt", "globals", "text")
                .on_change({
                    let log = log.clone();
                    move |ctx, changes| {
                        log.push(format!("{} {}", ctx.identifier(), keys(changes)));
                        true
                    }
                })
                .render(|ctx, _| {
                    let txt = ctx.get_prop("txt").unwrap_or_default();
                    Some(format!("<p>{} {}</p>", number(ctx.get_prop("num")), txt.as_str().unwrap_or("")))
                }),
        )
        .unwrap();
    let html = format!(
        "{}{}",
        reader.create_tag().id("r1").render(),
        reader.create_tag().id("r2").render()
    );
    pilot.mount(&html).unwrap();
    (pilot, modifier)
}

#[tokio::test(start_paused = true)]
async fn global_changes_are_debounced_per_subscriber() {
    let log = Recorder::new();
    let (pilot, modifier) = reader_scope(&log);
    assert_eq!(pilot.html("r1").as_deref(), Some("<p>5 a</p>"));

    modifier.call("update", &[json!(6)]).unwrap();
    assert!(log.is_empty());
    assert!(!pilot.scope().is_idle());

    pilot.advance(Duration::from_millis(5)).await;
    assert!(log.is_empty());

    pilot.advance(Duration::from_millis(5)).await;
    assert_eq!(log.take(), vec!["r1 num,txt", "r2 num,txt"]);
    assert_eq!(pilot.html("r1").as_deref(), Some("<p>6 b</p>"));
    assert_eq!(pilot.html("r2").as_deref(), Some("<p>6 b</p>"));
    assert!(pilot.scope().is_idle());
}

#[tokio::test(start_paused = true)]
async fn reverted_global_write_inside_the_window_is_silent() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    scope
        .create_data(DataDefinition::new("d", json!({"n": 0})))
        .unwrap();
    let writer = scope
        .create_modifier(ModifierDefinition::new("w").method("set", |ctx, args| {
            ctx.set_props("d", json!({"n": args[0]}));
            Value::Null
        }))
        .unwrap();
    let view = scope
        .create_component(
            ComponentDefinition::new("view")
                .global_prop("n", "d", "n")
                .on_change({
                    let log = log.clone();
                    move |_, changes| {
                        log.push(format!("change {}", keys(changes)));
                        true
                    }
                })
                .render({
                    let log = log.clone();
                    move |ctx, _| {
                        let n = number(ctx.get_prop("n"));
                        log.push(format!("render {n}"));
                        Some(format!("<i>{n}</i>"))
                    }
                }),
        )
        .unwrap();
    pilot.mount(&view.create_tag().render()).unwrap();
    assert_eq!(log.take(), vec!["render 0"]);

    writer.call("set", &[json!(1)]).unwrap();
    writer.call("set", &[json!(0)]).unwrap();
    pilot.settle().await;
    assert!(log.is_empty());
    assert!(pilot.scope().is_idle());

    writer.call("set", &[json!(1)]).unwrap();
    writer.call("set", &[json!(0)]).unwrap();
    writer.call("set", &[json!(2)]).unwrap();
    pilot.settle().await;
    assert_eq!(log.take(), vec!["change n", "render 2"]);
}

#[tokio::test(start_paused = true)]
async fn settle_fires_pending_global_changes() {
    let log = Recorder::new();
    let (pilot, modifier) = reader_scope(&log);
    modifier.call("update", &[json!(9)]).unwrap();
    pilot.settle().await;
    assert_eq!(log.take(), vec!["r1 num,txt", "r2 num,txt"]);
    assert_eq!(pilot.props("r2").unwrap()["num"], json!(9));
}

#[tokio::test(start_paused = true)]
async fn run_until_idle_waits_for_the_deadline() {
    let log = Recorder::new();
    let (pilot, modifier) = reader_scope(&log);
    modifier.call("update", &[json!(3)]).unwrap();

    let scope = pilot.scope().clone();
    let mut idle = tokio_test::task::spawn(async move { scope.run_until_idle().await });
    tokio_test::assert_pending!(idle.poll());
    assert!(log.is_empty());

    tokio::time::advance(Duration::from_millis(10)).await;
    tokio_test::assert_ready!(idle.poll());
    assert_eq!(log.take(), vec!["r1 num,txt", "r2 num,txt"]);
}

#[tokio::test(start_paused = true)]
async fn destroyed_subscriber_gets_nothing() {
    let log = Recorder::new();
    let (pilot, modifier) = reader_scope(&log);
    modifier.call("update", &[json!(7)]).unwrap();
    pilot.unmount().unwrap();
    pilot.settle().await;
    assert!(log.is_empty());
    assert_eq!(pilot.scope().data_value("globals").unwrap()["number"], json!(7));
}

#[tokio::test(start_paused = true)]
async fn debounce_window_is_configurable() {
    let pilot = Pilot::with_config(ScopeConfig::new().with_debounce(Duration::from_millis(50)));
    let scope = pilot.scope();
    let log = Recorder::new();
    scope
        .create_data(DataDefinition::new("d", json!({"n": 0})))
        .unwrap();
    let writer = scope
        .create_modifier(ModifierDefinition::new("w").method("set", |ctx, args| {
            ctx.set_props("d", json!({"n": args[0]}));
            Value::Null
        }))
        .unwrap();
    let view = scope
        .create_component(ComponentDefinition::new("view").global_prop("n", "d", "n").on_change({
            let log = log.clone();
            move |_, changes| {
                log.push(format!("n={}", changes.new_value("n").unwrap()));
                true
            }
        }))
        .unwrap();
    pilot.mount(&view.create_tag().render()).unwrap();

    writer.call("set", &[json!(1)]).unwrap();
    pilot.advance(Duration::from_millis(30)).await;
    writer.call("set", &[json!(2)]).unwrap();
    pilot.advance(Duration::from_millis(30)).await;
    assert!(log.is_empty(), "each write pushes the deadline out");
    pilot.advance(Duration::from_millis(20)).await;
    assert_eq!(log.take(), vec!["n=2"]);
}

// ---------------------------------------------------------------------------
// Resume and destroy
// ---------------------------------------------------------------------------

fn lifecycle_logger(name: &str, log: &Recorder) -> ComponentDefinition {
    let mut definition = ComponentDefinition::new(name);
    for (hook, label) in [
        (Hook::Mount, "mount"),
        (Hook::Resume, "resume"),
        (Hook::Destroy, "destroy"),
    ] {
        let log = log.clone();
        definition = definition.on(hook, move |ctx, _| log.push(format!("{} {label}", ctx.identifier())));
    }
    let log = log.clone();
    definition.on_change(move |ctx, changes| {
        log.push(format!("{} change {}", ctx.identifier(), keys(changes)));
        true
    })
}

#[test]
fn explicit_id_resumes_instead_of_remounting() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let kid = scope
        .create_component(
            lifecycle_logger("kid", &log)
                .external_prop("label", json!(""))
                .render(|ctx, _| {
                    let label = ctx.get_prop("label").unwrap_or_default();
                    Some(format!("<b>{}</b>", label.as_str().unwrap_or("")))
                }),
        )
        .unwrap();

    let html = kid.create_tag().id("k").prop("label", json!("x")).render();
    pilot.mount(&html).unwrap();
    let k = pilot.instance("k").unwrap();
    pilot.unmount().unwrap();
    assert!(!scope.is_active(k));
    assert_eq!(scope.phase_of(k), Some(Phase::Destroyed));

    pilot.mount(&html).unwrap();
    assert_eq!(log.take(), vec!["k mount", "k destroy", "k resume"]);
    assert_eq!(pilot.instance("k"), Some(k));
    assert_eq!(scope.instance_count(), 1);
    // The element came back empty; the current HTML was put back.
    assert_eq!(scope.document().inner_html(scope.element_of(k).unwrap()), Some("<b>x</b>"));

    pilot.unmount().unwrap();
    let html = kid.create_tag().id("k").prop("label", json!("y")).render();
    pilot.mount(&html).unwrap();
    assert_eq!(log.take(), vec!["k destroy", "k change label"]);
    assert_eq!(pilot.html("k").as_deref(), Some("<b>y</b>"));
}

#[test]
fn moved_child_resumes_with_its_state() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let child = scope
        .create_component(
            lifecycle_logger("child", &log)
                .local_prop("clicks", json!(0))
                .render(|ctx, _| Some(format!("<em>{}</em>", number(ctx.get_prop("clicks"))))),
        )
        .unwrap();
    let shell = scope
        .create_component(
            lifecycle_logger("shell", &log)
                .local_prop("wrapped", json!(false))
                .render(move |ctx, _| {
                    let tag = child.create_tag().id("stable").render();
                    Some(match ctx.get_prop("wrapped") {
                        Some(Value::Bool(true)) => format!("<section>{tag}</section>"),
                        _ => tag,
                    })
                }),
        )
        .unwrap();

    pilot.mount(&shell.create_tag().id("s").render()).unwrap();
    let stable = pilot.instance("stable").unwrap();
    scope.set_props(stable, json!({"clicks": 3}), false);
    log.take();

    let s = pilot.instance("s").unwrap();
    scope.set_props(s, json!({"wrapped": true}), false);
    assert_eq!(log.take(), vec!["s change wrapped", "stable resume"]);
    assert_eq!(pilot.instance("stable"), Some(stable));
    assert_eq!(pilot.props("stable").unwrap()["clicks"], json!(3));
    assert_eq!(scope.parent_of(stable), pilot.instance("s"));
    insta::assert_snapshot!(pilot.tree(), @r#"
    div
      sc-shell data-sc-id="s"
        section
          sc-child data-sc-id="stable"
            em
    "#);
}

#[test]
fn moved_child_with_changed_reference_still_resumes() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let child = scope
        .create_component(
            lifecycle_logger("child", &log)
                .render(|ctx, _| Some(format!("<em>{}</em>", number(ctx.get_prop("check"))))),
        )
        .unwrap();
    let shell = scope
        .create_component(
            lifecycle_logger("shell", &log)
                .local_prop("wrapped", json!(false))
                .local_prop("v", json!(0))
                .render(move |ctx, _| {
                    let tag = child
                        .create_tag()
                        .id("stable")
                        .ref_props(refs([("check", "v")]))
                        .render();
                    Some(match ctx.get_prop("wrapped") {
                        Some(Value::Bool(true)) => format!("<section>{tag}</section>"),
                        _ => tag,
                    })
                }),
        )
        .unwrap();

    pilot.mount(&shell.create_tag().id("s").render()).unwrap();
    let stable = pilot.instance("stable").unwrap();
    log.take();

    let s = pilot.instance("s").unwrap();
    scope.set_props(s, json!({"wrapped": true, "v": 1}), false);
    assert_eq!(
        log.take(),
        vec!["s change v,wrapped", "stable change check", "stable resume"]
    );
    assert_eq!(pilot.instance("stable"), Some(stable));
    assert_eq!(pilot.props("stable").unwrap()["check"], json!(1));
    assert_eq!(pilot.html("stable").as_deref(), Some("<em>1</em>"));
    assert_eq!(scope.phase_of(stable), Some(Phase::Mounted));
}

#[tokio::test(start_paused = true)]
async fn global_writes_while_detached_are_adopted_on_resume() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    scope
        .create_data(DataDefinition::new("d", json!({"n": 0})))
        .unwrap();
    let writer = scope
        .create_modifier(ModifierDefinition::new("w").method("set", |ctx, args| {
            ctx.set_props("d", json!({"n": args[0]}));
            Value::Null
        }))
        .unwrap();
    let gauge = scope
        .create_component(lifecycle_logger("gauge", &log).global_prop("n", "d", "n"))
        .unwrap();
    let html = gauge.create_tag().id("g").render();

    pilot.mount(&html).unwrap();
    pilot.unmount().unwrap();
    writer.call("set", &[json!(4)]).unwrap();
    pilot.settle().await;

    pilot.mount(&html).unwrap();
    pilot.settle().await;
    assert_eq!(log.take(), vec!["g mount", "g destroy", "g resume"]);
    assert_eq!(pilot.props("g").unwrap()["n"], json!(4));
}

#[test]
fn auto_id_children_are_purged_with_their_parent() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let leaf = scope
        .create_component(lifecycle_logger("leaf", &log).render(|_, _| Some("<i>leaf</i>".into())))
        .unwrap();
    let tree = scope
        .create_component(lifecycle_logger("tree", &log).render(move |_, _| {
            Some(format!("{}{}", leaf.create_tag().render(), leaf.create_tag().render()))
        }))
        .unwrap();

    pilot.mount(&tree.create_tag().render()).unwrap();
    assert_eq!(scope.instance_count(), 3);
    assert!(pilot.instance("tree:0/leaf:1").is_some());
    log.take();

    pilot.unmount().unwrap();
    assert_eq!(
        log.take(),
        vec!["tree:0 destroy", "tree:0/leaf:0 destroy", "tree:0/leaf:1 destroy"]
    );
    assert_eq!(scope.instance_count(), 0);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn rerendering_rebinds_exactly_one_listener() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let counter = scope
        .create_component(
            ComponentDefinition::new("counter")
                .local_prop("count", json!(0))
                .local_method("inc", {
                    let log = log.clone();
                    move |ctx, args| {
                        log.push(format!("{}", args[0]["detail"]));
                        let n = number(ctx.get_prop("count"));
                        ctx.set_props(json!({"count": n + 1}), false);
                        Value::Null
                    }
                })
                .render(|ctx, _| {
                    Some(format!(r#"<button class="inc">{}</button>"#, number(ctx.get_prop("count"))))
                })
                .event_on("click", "button.inc", "inc"),
        )
        .unwrap();
    pilot.mount(&counter.create_tag().id("c").render()).unwrap();
    let c = pilot.instance("c").unwrap();

    for step in 1..=3 {
        assert_eq!(pilot.dispatch(".inc", "click", json!(step)).unwrap(), 1);
        assert_eq!(scope.bound_listeners(c), 1);
    }
    assert_eq!(log.take(), vec!["1", "2", "3"]);
    assert_eq!(pilot.html("c").as_deref(), Some(r#"<button class="inc">3</button>"#));

    let button = scope.document().query_selector_all(pilot.host(), "button.inc").unwrap()[0];
    assert_eq!(scope.document().listener_count(button, Some("click")), 1);
    assert!(pilot.take_diagnostics().is_empty());
}

#[test]
fn listeners_replaced_by_a_handler_do_not_fire() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let panel = scope
        .create_component(
            ComponentDefinition::new("panel")
                .local_prop("n", json!(0))
                .local_method("bump", {
                    let log = log.clone();
                    move |ctx, _| {
                        log.push("bump");
                        let n = number(ctx.get_prop("n"));
                        ctx.set_props(json!({"n": n + 1}), false);
                        Value::Null
                    }
                })
                .local_method("noted", {
                    let log = log.clone();
                    move |_, _| {
                        log.push("noted");
                        Value::Null
                    }
                })
                .render(|ctx, _| {
                    Some(format!(
                        r#"<div class="box"><span class="hit">{}</span></div>"#,
                        number(ctx.get_prop("n"))
                    ))
                })
                .event_on("click", "span.hit", "bump")
                .event_on("click", "div.box", "noted"),
        )
        .unwrap();
    pilot.mount(&panel.create_tag().id("p").render()).unwrap();

    // The bump re-renders the box away before the click reaches it.
    assert_eq!(pilot.click("span.hit").unwrap(), 1);
    assert_eq!(log.take(), vec!["bump"]);
    assert_eq!(
        pilot.html("p").as_deref(),
        Some(r#"<div class="box"><span class="hit">1</span></div>"#)
    );

    assert_eq!(pilot.click("div.box").unwrap(), 1);
    assert_eq!(log.take(), vec!["noted"]);
}

#[test]
fn root_events_bubble_from_children() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();
    let card = scope
        .create_component(
            ComponentDefinition::new("card")
                .local_method("picked", {
                    let log = log.clone();
                    move |_, args| {
                        log.push(args[0]["type"].as_str().unwrap_or_default());
                        Value::Null
                    }
                })
                .render(|_, _| Some("<ul><li>a</li><li>b</li></ul>".into()))
                .event("pick", "picked"),
        )
        .unwrap();
    pilot.mount(&card.create_tag().render()).unwrap();
    assert_eq!(pilot.dispatch("li", "pick", Value::Null).unwrap(), 2);
    assert_eq!(log.take(), vec!["pick", "pick"]);
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn sequences_run_in_fifo_order() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let log = Recorder::new();

    let hooks = |name: &'static str, definition: ComponentDefinition| {
        let mut definition = definition;
        for (hook, label) in [
            (Hook::PreMount, "preMount"),
            (Hook::Mount, "mount"),
            (Hook::PostMount, "postMount"),
        ] {
            let log = log.clone();
            definition = definition.on(hook, move |_, _| log.push(format!("{name} {label}")));
        }
        let log = log.clone();
        definition.on(Hook::DescendantChange, move |ctx, _| {
            log.push(format!("{name} descendantChange {}", ctx.descendant().unwrap_or("?")));
        })
    };

    let child = scope
        .create_component(hooks(
            "child",
            ComponentDefinition::new("child").render({
                let log = log.clone();
                move |_, _| {
                    log.push("child render");
                    Some("<i>x</i>".into())
                }
            }),
        ))
        .unwrap();
    let parent = scope
        .create_component(hooks(
            "parent",
            ComponentDefinition::new("parent").render({
                let log = log.clone();
                move |_, _| {
                    log.push("parent render");
                    Some(child.create_tag().render())
                }
            }),
        ))
        .unwrap();

    pilot.mount(&parent.create_tag().id("p").render()).unwrap();
    assert_eq!(
        log.take(),
        vec![
            "parent preMount",
            "parent mount",
            "parent render",
            "parent postMount",
            "child preMount",
            "child mount",
            "child render",
            "child postMount",
            "parent descendantChange p/child:0",
        ]
    );
    assert!(scope.is_idle());
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[test]
fn recoverable_problems_become_diagnostics() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let broken = scope
        .create_component(
            ComponentDefinition::new("broken")
                .external_prop("label", json!("x"))
                .local_method("inc", |_, _| Value::Null)
                .on(Hook::Mount, |ctx, _| {
                    assert_eq!(ctx.get_prop("nope.deep"), None);
                    ctx.set_props(json!({"label": "mine"}), false);
                })
                .render(|_, _| Some("<p>hi</p>".into()))
                .event("click", "nope")
                .event_on("click", ".missing", "inc"),
        )
        .unwrap();
    pilot.mount(&broken.create_tag().id("b").render()).unwrap();

    assert_eq!(
        pilot.take_diagnostics(),
        vec![
            Diagnostic::MissingProp {
                owner: "b".into(),
                path: "nope.deep".into(),
                snapshot: json!({"label": "x"}),
            },
            Diagnostic::ForeignWrite {
                component: "b".into(),
                name: "label".into(),
                partition: "external",
            },
            Diagnostic::MissingHandler {
                component: "b".into(),
                handler: "nope".into(),
            },
            Diagnostic::MissingTarget {
                component: "b".into(),
                selector: Some(".missing".into()),
                event: "click".into(),
                binding: true,
            },
        ]
    );
    assert_eq!(pilot.props("b").unwrap()["label"], json!("x"));
}

#[test]
fn unknown_and_duplicate_tags_are_reported() {
    let pilot = Pilot::new();
    let scope = pilot.scope();
    let solo = scope.create_component(ComponentDefinition::new("solo")).unwrap();

    pilot.mount(r#"<sc-ghost data-sc-id="ghost"></sc-ghost>"#).unwrap();
    assert_eq!(
        pilot.take_diagnostics(),
        vec![Diagnostic::UnknownTag {
            identifier: "ghost".into(),
        }]
    );

    let tag = solo.create_tag().id("one").render();
    pilot.mount(&format!("{tag}{tag}")).unwrap();
    assert_eq!(
        pilot.take_diagnostics(),
        vec![Diagnostic::DuplicateMount {
            identifier: "one".into(),
        }]
    );
    assert_eq!(scope.instance_count(), 1);
}

#[test]
fn partition_conflicts_are_resolved_at_registration() {
    let scope = sepcon::create_scope();
    let mut definition = ComponentDefinition::new("clash").local_prop("x", json!(1));
    definition
        .state
        .props
        .global
        .insert("x".into(), sepcon::definition::GlobalKey { data: "d".into(), key: "x".into() });
    scope.create_component(definition).unwrap();
    let diagnostics = scope.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        &diagnostics[0],
        Diagnostic::PartitionConflict { component, name, .. } if component == "clash" && name == "x"
    ));
}
