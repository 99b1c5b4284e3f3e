//! Request interceptors.
//!
//! An explicit, ordered list of stages every verification request passes
//! through before and after the core pipeline runs. This replaces ad-hoc
//! handler wrapping: each stage has a defined pre/post contract and the
//! composition order is visible at construction time. A stage that rejects
//! in `before` stops the chain; `after` runs in reverse order for the stages
//! whose `before` succeeded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::admission::AdmissionController;
use crate::error::PipelineError;

/// Mutable per-request context shared by the stages.
pub struct RequestContext {
    pub caller: String,
    pub claim_text: String,
    pub started_at: Instant,
    pub elapsed: Option<Duration>,
}

impl RequestContext {
    pub fn new(caller: impl Into<String>, claim_text: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            claim_text: claim_text.into(),
            started_at: Instant::now(),
            elapsed: None,
        }
    }
}

#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs before the pipeline. Returning an error rejects the request.
    async fn before(&self, _ctx: &mut RequestContext) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Runs after the pipeline, in reverse registration order.
    async fn after(&self, _ctx: &mut RequestContext) {}
}

/// Ordered stage composition.
#[derive(Default)]
pub struct InterceptorChain {
    stages: Vec<Arc<dyn RequestInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with(mut self, stage: Arc<dyn RequestInterceptor>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run every `before` in order. On rejection, `after` is run for the
    /// stages already entered, then the error propagates.
    pub async fn enter(&self, ctx: &mut RequestContext) -> Result<(), PipelineError> {
        for (idx, stage) in self.stages.iter().enumerate() {
            if let Err(e) = stage.before(ctx).await {
                for entered in self.stages[..idx].iter().rev() {
                    entered.after(ctx).await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run every `after` in reverse order.
    pub async fn exit(&self, ctx: &mut RequestContext) {
        for stage in self.stages.iter().rev() {
            stage.after(ctx).await;
        }
    }
}

/// First stage: count the request against the caller's rate window.
pub struct AdmissionInterceptor {
    controller: AdmissionController,
}

impl AdmissionInterceptor {
    pub fn new(controller: AdmissionController) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl RequestInterceptor for AdmissionInterceptor {
    fn name(&self) -> &'static str {
        "admission"
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<(), PipelineError> {
        if self.controller.allow(&ctx.caller) {
            Ok(())
        } else {
            Err(PipelineError::AdmissionDenied {
                caller: ctx.caller.clone(),
            })
        }
    }
}

/// Records wall-clock time for the request.
pub struct TimingInterceptor;

#[async_trait]
impl RequestInterceptor for TimingInterceptor {
    fn name(&self) -> &'static str {
        "timing"
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<(), PipelineError> {
        ctx.started_at = Instant::now();
        Ok(())
    }

    async fn after(&self, ctx: &mut RequestContext) {
        let elapsed = ctx.started_at.elapsed();
        ctx.elapsed = Some(elapsed);
        debug!(caller = %ctx.caller, elapsed_ms = elapsed.as_millis() as u64, "request finished");
    }
}
