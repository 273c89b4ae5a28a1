// core/tests/context_management_tests.rs
mod common;

use common::*;
use lightbox_flow::{ContextData, Pipeline, PipelineControl};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn later_steps_observe_earlier_writes() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new("shared", &[("seed", false, None), ("extend", false, None)]);

  pipeline.on("seed", |ctx: ContextData<TestContext>| async move {
    ctx.update(|c| {
      c.counter = 10;
      c.trail.push("seed".to_string());
    });
    Ok::<_, TestError>(PipelineControl::Continue)
  });
  pipeline.on("extend", |ctx: ContextData<TestContext>| async move {
    let seen = ctx.with(|c| c.counter);
    assert_eq!(seen, 10);
    ctx.write().counter += 5;
    Ok::<_, TestError>(PipelineControl::Continue)
  });

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().counter, 15);
}

#[tokio::test]
#[serial]
async fn clones_share_the_same_data() {
  setup_tracing();
  let original = ContextData::new(TestContext::default());
  let handle = original.clone();

  original.write().counter = 5;
  assert_eq!(handle.read().counter, 5);

  handle.update(|c| c.counter = 7);
  assert_eq!(original.with(|c| c.counter), 7);
}

#[tokio::test]
#[serial]
async fn guards_released_before_await_allow_progress() {
  setup_tracing();
  let ctx = ContextData::new(TestContext::default());
  let before = ctx.with(|c| c.counter);
  tokio::time::sleep(std::time::Duration::from_millis(1)).await;
  ctx.update(|c| c.counter = before + 1);
  assert_eq!(ctx.read().counter, 1);
}
