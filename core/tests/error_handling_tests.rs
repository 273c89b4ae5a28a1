// core/tests/error_handling_tests.rs
mod common;

use common::*;
use lightbox_flow::{ContextData, FlowError, Pipeline, PipelineControl};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn flow_error_as_handler_error_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, FlowError>::new("bare", &[("task", false, None)]);
  pipeline.on("task", |ctx: ContextData<TestContext>| async move {
    ctx.write().counter = 1;
    Ok::<_, FlowError>(PipelineControl::Continue)
  });

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().counter, 1);

  let empty = Pipeline::<TestContext, FlowError>::new("bare", &[("task", false, None)]);
  match empty.run(ContextData::new(TestContext::default())).await {
    Err(FlowError::HandlerMissing { step_name }) => assert_eq!(step_name, "task"),
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[test]
fn flow_errors_render_readable_messages() {
  let missing = FlowError::HandlerMissing {
    step_name: "persist".to_string(),
  };
  assert_eq!(missing.to_string(), "Handler missing for non-optional step: persist");

  let unregistered = FlowError::NotRegistered { type_name: "OrderCtx" };
  assert!(unregistered.to_string().contains("OrderCtx"));
}
