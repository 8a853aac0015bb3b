//! Per-request run context: request id, logging span, cancellation.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Passed explicitly into every component handling one request
#[derive(Clone, Debug)]
pub struct RunContext {
    pub request_id: Uuid,
    pub span: tracing::Span,
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Fresh context with its own `chat` span
    pub fn new() -> Self {
        let request_id = Uuid::new_v4();
        Self {
            request_id,
            span: tracing::info_span!("chat", %request_id, model = tracing::field::Empty),
            cancel: CancellationToken::new(),
        }
    }

    /// Tie this run to an outer token (e.g. server shutdown)
    #[must_use]
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let ctx = RunContext::new().with_parent(&parent);

        assert!(!ctx.is_cancelled());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RunContext::new().request_id, RunContext::new().request_id);
    }
}
