// core/src/pipeline/execution.rs

use crate::context::ContextData;
use crate::control::{PipelineControl, PipelineResult};
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use crate::step::StepDef;
use tracing::{debug, error, info, info_span, instrument, Instrument};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// Stops at the first handler error, or with [`PipelineResult::Stopped`] when a
  /// handler returns [`PipelineControl::Stop`].
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(pipeline = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    debug!("Pipeline execution starting.");
    for (step_index, step_def) in self.steps.iter().enumerate() {
      let span = info_span!("pipeline_step", step_name = %step_def.name, step_index);
      match self.run_step(step_def, &ctx_data).instrument(span).await? {
        PipelineControl::Continue => {}
        PipelineControl::Stop => {
          info!(step_name = %step_def.name, "Pipeline stopped by a handler.");
          return Ok(PipelineResult::Stopped);
        }
      }
    }
    debug!("Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: &ContextData<TData>) -> Result<PipelineControl, Err> {
    if let Some(skip_if) = &step_def.skip_if {
      if skip_if(ctx_data.clone()) {
        debug!("Step skipped by its condition.");
        return Ok(PipelineControl::Continue);
      }
    }

    let phases = [
      ("before", self.before.get(&step_def.name)),
      ("on", self.on.get(&step_def.name)),
      ("after", self.after.get(&step_def.name)),
    ];

    if phases.iter().all(|(_, handlers)| handlers.map_or(true, |h| h.is_empty())) {
      if step_def.optional {
        debug!("Optional step has no handlers.");
        return Ok(PipelineControl::Continue);
      }
      error!("Non-optional step has no handlers.");
      return Err(Err::from(FlowError::HandlerMissing {
        step_name: step_def.name.clone(),
      }));
    }

    for (phase, handlers) in phases {
      for handler in handlers.into_iter().flatten() {
        match handler(ctx_data.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => {
            debug!(phase, "Handler requested stop.");
            return Ok(PipelineControl::Stop);
          }
          Err(e) => {
            error!(phase, error = %e, "Handler failed.");
            return Err(e);
          }
        }
      }
    }
    Ok(PipelineControl::Continue)
  }
}
