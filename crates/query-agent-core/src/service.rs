//! Request pipeline: validator → agent factory → reasoning loop → extractor.

use tracing::Instrument;

use crate::context::RunContext;
use crate::error::{AgentError, Result, Stage};
use crate::factory::AgentFactory;
use crate::request::{validate, AllowedModels, ChatRequest, ChatResponse};
use crate::response::extract_response;

/// Stateless entry point; safe to share across concurrent requests
pub struct ChatService {
    factory: AgentFactory,
}

impl ChatService {
    pub const fn new(factory: AgentFactory) -> Self {
        Self { factory }
    }

    pub const fn allowed_models(&self) -> &AllowedModels {
        &self.factory.config().allowed_models
    }

    pub const fn factory(&self) -> &AgentFactory {
        &self.factory
    }

    /// Answer one request inside its run context
    pub async fn handle(&self, request: &ChatRequest, ctx: &RunContext) -> Result<ChatResponse> {
        let result = self.process(request, ctx).instrument(ctx.span.clone()).await;

        match &result {
            Ok(response) => {
                tracing::info!(parent: &ctx.span, chars = response.response.len(), "Chat request answered");
            }
            Err(err) => log_failure(err, ctx),
        }

        result
    }

    async fn process(&self, request: &ChatRequest, ctx: &RunContext) -> Result<ChatResponse> {
        ctx.span.record("model", request.model_name.as_str());
        tracing::info!(
            model = %request.model_name,
            messages = request.messages.len(),
            allow_search = request.allow_search,
            "Chat request received"
        );

        validate(request, self.allowed_models())
            .map_err(|e| e.at(Stage::Validator, None, ctx.request_id))?;

        let agent = self
            .factory
            .build(request)
            .map_err(|e| e.at(Stage::AgentFactory, None, ctx.request_id))?;

        tracing::debug!(
            backend = agent.provider_name(),
            tools = ?agent.tools().names(),
            max_iterations = agent.config().max_iterations,
            "Agent assembled"
        );

        let state = agent.run(&request.messages, ctx).await?;

        tracing::debug!(cycles = state.cycles(), steps = state.steps().len(), "Run finished");

        extract_response(&state)
            .map_err(|e| e.at(Stage::ResponseExtractor, Some(state.state()), ctx.request_id))
    }
}

fn log_failure(err: &AgentError, ctx: &RunContext) {
    let Some(failure) = err.failure() else {
        tracing::error!(parent: &ctx.span, request_id = %ctx.request_id, error = %err, "Chat request failed");
        return;
    };

    let state = failure.state.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
    match failure.stage {
        Stage::Validator => tracing::warn!(
            parent: &ctx.span,
            request_id = %failure.request_id,
            stage = %failure.stage,
            cause = %failure.cause,
            "Chat request rejected"
        ),
        _ => tracing::error!(
            parent: &ctx.span,
            request_id = %failure.request_id,
            stage = %failure.stage,
            state = %state,
            iteration = failure.iteration,
            cause = %failure.cause,
            "Chat request failed"
        ),
    }
}
