// tests/engine_dedup.rs

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use hashmake::engine::{CallKey, Context};
use hashmake::registry::TaskRegistry;
use hashmake::types::TaskOutput;
use hashmake_test_utils::probe::TaskProbe;
use hashmake_test_utils::{init_tracing, mock_engine, with_timeout};
use serde_json::json;

async fn shared(probe: TaskProbe) -> anyhow::Result<TaskOutput> {
    probe.record("shared");
    tokio::time::sleep(Duration::from_millis(30)).await;
    TaskOutput::value(42)
}

async fn side(ctx: Context, name: &'static str, probe: TaskProbe) -> anyhow::Result<TaskOutput> {
    probe.record(name);
    let n: i64 = ctx.value("shared", vec![]).await?;
    TaskOutput::value(n + 1)
}

async fn top(ctx: Context) -> anyhow::Result<TaskOutput> {
    let (left, right) = tokio::join!(
        ctx.value::<i64>("left", vec![]),
        ctx.value::<i64>("right", vec![])
    );
    TaskOutput::value(left? + right?)
}

/// top -> {left, right} -> shared
fn diamond(probe: &TaskProbe) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    let p = probe.clone();
    registry.register("shared", move |_, _| shared(p.clone()));
    let p = probe.clone();
    registry.register("left", move |ctx, _| side(ctx, "left", p.clone()));
    let p = probe.clone();
    registry.register("right", move |ctx, _| side(ctx, "right", p.clone()));
    registry.register("top", |ctx, _| top(ctx));
    registry
}

#[tokio::test]
async fn diamond_executes_shared_dependency_once() {
    init_tracing();
    let probe = TaskProbe::new();
    let (_fs, engine) = mock_engine(diamond(&probe));

    let report = with_timeout(engine.build(&CallKey::task("top"))).await.unwrap();

    assert_eq!(report.value.as_value(), Some(&json!(86)));
    assert_eq!(probe.count("shared"), 1);
    assert_eq!(probe.count("left"), 1);
    assert_eq!(probe.count("right"), 1);
    assert_eq!(report.executed.len(), 4);
}

#[tokio::test]
async fn diamond_verifies_shared_dependency_once() {
    init_tracing();
    let probe = TaskProbe::new();
    let (_fs, engine) = mock_engine(diamond(&probe));
    engine.build(&CallKey::task("top")).await.unwrap();

    // Force `shared` to re-execute; it yields the same value, so nothing
    // above it runs and it runs only once despite two paths reaching it.
    engine.store().invalidate(&CallKey::task("shared"));
    let report = with_timeout(engine.build(&CallKey::task("top"))).await.unwrap();

    assert_eq!(probe.count("shared"), 2);
    assert_eq!(probe.count("left"), 1);
    assert_eq!(probe.count("right"), 1);
    assert_eq!(report.executed, vec![CallKey::task("shared")]);
}

async fn twice(ctx: Context) -> anyhow::Result<TaskOutput> {
    let (a, b) = tokio::join!(ctx.call("shared", vec![]), ctx.call("shared", vec![]));
    assert_eq!(a?, b?);
    TaskOutput::value("done")
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_execution() {
    init_tracing();
    let probe = TaskProbe::new();
    let mut registry = TaskRegistry::new();
    let p = probe.clone();
    registry.register("shared", move |_, _| shared(p.clone()));
    registry.register("twice", |ctx, _| twice(ctx));
    let (_fs, engine) = mock_engine(registry);

    with_timeout(engine.build(&CallKey::task("twice"))).await.unwrap();

    assert_eq!(probe.count("shared"), 1);
    let entry = engine.store().get(&CallKey::task("twice")).unwrap();
    // Both requests are recorded, in call order.
    assert_eq!(
        entry.dependencies,
        vec![CallKey::task("shared"), CallKey::task("shared")]
    );
}

async fn tagged(ctx: Context, tag: &'static str) -> anyhow::Result<TaskOutput> {
    ctx.depends_on_file("a.txt").await?;
    let text = ctx.fs().read_to_string(Path::new("a.txt"))?;
    TaskOutput::value(format!("{}-{tag}", text.trim()))
}

async fn joined(ctx: Context) -> anyhow::Result<TaskOutput> {
    let left: String = ctx.value("left", vec![]).await?;
    let right: String = ctx.value("right", vec![]).await?;
    TaskOutput::value(format!("{left}|{right}"))
}

/// top -> left -> file(a.txt), then top -> right -> file(a.txt). Nothing
/// sleeps, so the first path settles `file` before the second reaches it.
fn sequential_readers() -> TaskRegistry {
    let mut registry = TaskRegistry::with_builtins(".", BTreeMap::new());
    registry.register("left", |ctx, _| tagged(ctx, "L"));
    registry.register("right", |ctx, _| tagged(ctx, "R"));
    registry.register("top", |ctx, _| joined(ctx));
    registry
}

#[tokio::test]
async fn change_seen_by_one_reader_reaches_every_reader() {
    init_tracing();
    let (fs, engine) = mock_engine(sequential_readers());
    let top = CallKey::task("top");
    fs.add_file("a.txt", "v1");
    let first = with_timeout(engine.build(&top)).await.unwrap();
    assert_eq!(first.value.as_value(), Some(&json!("v1-L|v1-R")));

    fs.add_file("a.txt", "v2");
    let second = with_timeout(engine.build(&top)).await.unwrap();
    assert_eq!(second.value.as_value(), Some(&json!("v2-L|v2-R")));
    let mut tasks: Vec<String> = second.executed.iter().map(|key| key.task.clone()).collect();
    tasks.sort();
    assert_eq!(tasks, vec!["file", "left", "right", "top"]);

    let third = with_timeout(engine.build(&top)).await.unwrap();
    assert_eq!(third.value.as_value(), Some(&json!("v2-L|v2-R")));
    assert!(third.executed.is_empty(), "re-executed {:?}", third.executed);
}
