//! Response extraction from a finished run.

use crate::error::{AgentError, Result};
use crate::reasoning::{ConversationState, RunState};
use crate::request::ChatResponse;

/// Pull the final answer out of a `Done` state.
///
/// Any other state is a caller bug; failed runs surface their error instead.
pub fn extract_response(state: &ConversationState) -> Result<ChatResponse> {
    match (state.state(), state.answer()) {
        (RunState::Done, Some(answer)) => Ok(ChatResponse {
            response: answer.to_string(),
        }),
        (other, _) => Err(AgentError::NotTerminal(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::message::Conversation;
    use crate::mock::ScriptedProvider;
    use crate::reasoning::AgentBuilder;
    use std::sync::Arc;

    #[test]
    fn test_fresh_state_is_not_terminal() {
        let state = ConversationState::new(Conversation::with_system_prompt("sys"));
        let err = extract_response(&state).unwrap_err();
        assert!(matches!(err, AgentError::NotTerminal(RunState::Thinking)));
    }

    #[tokio::test]
    async fn test_extracts_recorded_answer() {
        let agent = AgentBuilder::new()
            .provider(Arc::new(ScriptedProvider::new(["The answer is 42."])))
            .build()
            .unwrap();
        let state = agent.run(&["q".into()], &RunContext::new()).await.unwrap();

        let response = extract_response(&state).unwrap();
        assert_eq!(response.response, "The answer is 42.");
    }
}
