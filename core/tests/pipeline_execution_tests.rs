// core/tests/pipeline_execution_tests.rs
mod common;

use common::*;
use lightbox_flow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;
use std::sync::Arc;

fn three_steps() -> Pipeline<TestContext, TestError> {
  let mut pipeline = Pipeline::<TestContext, TestError>::new(
    "three_steps",
    &[("validate", false, None), ("persist", false, None), ("notify", false, None)],
  );
  pipeline.on("validate", recording_handler("validate"));
  pipeline.on("persist", recording_handler("persist"));
  pipeline.on("notify", recording_handler("notify"));
  pipeline
}

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  let pipeline = three_steps();
  assert_eq!(pipeline.step_names(), vec!["validate", "persist", "notify"]);

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(result, PipelineResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.trail, vec!["validate", "persist", "notify"]);
}

#[tokio::test]
#[serial]
async fn stop_halts_remaining_steps() {
  setup_tracing();
  let pipeline = three_steps();
  let ctx = ContextData::new(TestContext {
    stop_at: Some("persist".to_string()),
    ..Default::default()
  });

  let result = pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(result, PipelineResult::Stopped);
  assert_eq!(ctx.read().trail, vec!["validate", "persist"]);
}

#[tokio::test]
#[serial]
async fn handler_error_is_returned_and_later_steps_do_not_run() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(
    "failing",
    &[("first", false, None), ("broken", false, None), ("never", false, None)],
  );
  pipeline.on("first", recording_handler("first"));
  pipeline.on("broken", failing_handler("broken", "upstream down"));
  pipeline.on("never", recording_handler("never"));

  let ctx = ContextData::new(TestContext::default());
  let err = pipeline.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("upstream down".to_string()));
  assert_eq!(ctx.read().trail, vec!["first", "broken"]);
}

#[tokio::test]
#[serial]
async fn skip_condition_is_evaluated_against_current_context() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(
    "skipping",
    &[
      ("first", false, None),
      (
        "only_when_empty",
        false,
        Some(Arc::new(|ctx: ContextData<TestContext>| ctx.read().counter > 0)),
      ),
      ("last", false, None),
    ],
  );
  pipeline.on("first", recording_handler("first"));
  pipeline.on("only_when_empty", recording_handler("only_when_empty"));
  pipeline.on("last", recording_handler("last"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().trail, vec!["first", "last"]);
}

#[tokio::test]
#[serial]
async fn skip_condition_can_be_replaced_after_construction() {
  setup_tracing();
  let mut pipeline = three_steps();
  pipeline.set_skip_condition("notify", Some(Arc::new(|_ctx: ContextData<TestContext>| true)));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["validate", "persist"]);
}

#[tokio::test]
#[serial]
async fn required_step_without_handlers_fails() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new("incomplete", &[("wired", false, None), ("unwired", false, None)]);
  pipeline.on("wired", recording_handler("wired"));

  let err = pipeline.run(ContextData::new(TestContext::default())).await.unwrap_err();
  match err {
    TestError::Flow(msg) => {
      assert!(msg.contains("HandlerMissing"));
      assert!(msg.contains("unwired"));
    }
    other => panic!("expected a flow error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_passed_over() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new("optional", &[("hook", true, None), ("work", false, None)]);
  pipeline.on("work", recording_handler("work"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().trail, vec!["work"]);

  pipeline.set_optional("hook", false);
  assert!(pipeline.run(ContextData::new(TestContext::default())).await.is_err());
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new("phases", &[("step", false, None)]);
  pipeline.after("step", recording_handler("after"));
  pipeline.on("step", recording_handler("on"));
  pipeline.before("step", recording_handler("before"));
  pipeline.on("step", recording_handler("on_again"));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().trail, vec!["before", "on", "on_again", "after"]);
}

#[tokio::test]
#[serial]
async fn stop_from_after_hook_halts_pipeline() {
  setup_tracing();
  let mut pipeline = three_steps();
  pipeline.after("validate", |_ctx: ContextData<TestContext>| async move {
    Ok::<_, FlowError>(PipelineControl::Stop)
  });

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().trail, vec!["validate"]);
}

#[test]
#[should_panic(expected = "has no step named 'missing'")]
fn registering_on_unknown_step_panics() {
  let mut pipeline = Pipeline::<TestContext, TestError>::new("strict", &[("present", false, None)]);
  pipeline.on("missing", recording_handler("missing"));
}
