//! End-to-end behavior of the request pipeline against deterministic stubs.

use std::sync::Arc;
use std::time::Duration;

use query_agent_core::mock::{ScriptedProvider, StubTool};
use query_agent_core::{
    AgentError, AgentFactory, ChatRequest, ChatService, CoreConfig, FixedResolver, RunContext,
    RunState, Stage,
};

const MODEL: &str = "llama3-70b-8192";

fn service(provider: Arc<ScriptedProvider>, search: Option<StubTool>, config: CoreConfig) -> ChatService {
    let mut factory = AgentFactory::new(Arc::new(FixedResolver::new(provider)), config);
    if let Some(tool) = search {
        factory = factory.with_search(Arc::new(tool));
    }
    ChatService::new(factory)
}

fn bounded(max_iterations: usize) -> CoreConfig {
    CoreConfig {
        max_iterations,
        ..CoreConfig::default()
    }
}

#[tokio::test]
async fn scenario_a_direct_answer_without_tools() {
    let provider = Arc::new(ScriptedProvider::new(["The capital of France is Paris."]));
    let search = StubTool::new("web_search", "should not be used");
    let service = service(provider.clone(), Some(search.clone()), CoreConfig::default());

    let request = ChatRequest::new(MODEL, vec!["What is the capital of France?".into()]);
    let response = service.handle(&request, &RunContext::new()).await.unwrap();

    assert!(response.response.contains("Paris"));
    assert_eq!(search.calls(), 0);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn scenario_b_unknown_model_touches_nothing() {
    let provider = Arc::new(ScriptedProvider::new(["unused"]));
    let search = StubTool::new("web_search", "unused");
    let service = service(provider.clone(), Some(search.clone()), CoreConfig::default());

    let request = ChatRequest::new("not-a-real-model", vec!["hello".into()]).with_search(true);
    let err = service.handle(&request, &RunContext::new()).await.unwrap_err();

    match err.root() {
        AgentError::Validation { field, allowed, .. } => {
            assert_eq!(*field, "model_name");
            assert!(allowed.iter().any(|m| m == MODEL));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.failure().unwrap().stage, Stage::Validator);
    assert_eq!(provider.calls(), 0);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn scenario_c_empty_search_degrades_gracefully() {
    let provider = Arc::new(ScriptedProvider::new([
        ScriptedProvider::tool_call("web_search", "obscure topic"),
        "I found nothing online, but here is what I know: it is obscure.".to_string(),
    ]));
    let search = StubTool::new("web_search", "No results found.");
    let service = service(provider.clone(), Some(search.clone()), CoreConfig::default());

    let request = ChatRequest::new(MODEL, vec!["Tell me about an obscure topic".into()]).with_search(true);
    let response = service.handle(&request, &RunContext::new()).await.unwrap();

    assert!(!response.response.is_empty());
    assert_eq!(search.calls(), 1);

    let seen = provider.seen();
    let observation = &seen[1].last().unwrap().content;
    assert!(observation.contains("No results found."));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_hanging_search_hits_the_bound() {
    let max = 3;
    let timeout = Duration::from_secs(2);
    let provider = Arc::new(ScriptedProvider::new([ScriptedProvider::tool_call("web_search", "retry")]));
    let search = StubTool::hanging("web_search").with_timeout(timeout);
    let service = service(provider.clone(), Some(search.clone()), bounded(max));

    let started = tokio::time::Instant::now();
    let request = ChatRequest::new(MODEL, vec!["q".into()]).with_search(true);
    let err = service.handle(&request, &RunContext::new()).await.unwrap_err();

    assert!(matches!(err.root(), AgentError::MaxIterations(3)));
    assert_eq!(search.calls(), max);
    assert!(started.elapsed() <= timeout * u32::try_from(max).unwrap());

    let seen = provider.seen();
    let last_observation = &seen.last().unwrap().last().unwrap().content;
    assert!(last_observation.starts_with("web_search failed: timed out"));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_hanging_search_answers_without_data() {
    let provider = Arc::new(ScriptedProvider::new([
        ScriptedProvider::tool_call("web_search", "weather"),
        "Search is unavailable right now; I cannot check the weather.".to_string(),
    ]));
    let search = StubTool::hanging("web_search").with_timeout(Duration::from_secs(5));
    let service = service(provider, Some(search), bounded(3));

    let request = ChatRequest::new(MODEL, vec!["Weather in Paris?".into()]).with_search(true);
    let response = service.handle(&request, &RunContext::new()).await.unwrap();
    assert!(response.response.contains("unavailable"));
}

#[tokio::test]
async fn no_tool_invoked_when_search_disabled() {
    // The model insists on a tool, but the agent exposes none.
    let provider = Arc::new(ScriptedProvider::new([ScriptedProvider::tool_call("web_search", "x")]));
    let search = StubTool::new("web_search", "unused");
    let service = service(provider, Some(search.clone()), CoreConfig::default());

    let request = ChatRequest::new(MODEL, vec!["q".into()]);
    let err = service.handle(&request, &RunContext::new()).await.unwrap_err();

    assert!(matches!(err.root(), AgentError::UnknownTool(_)));
    assert_eq!(err.failure().unwrap().state, Some(RunState::Acting));
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn cycles_never_exceed_the_bound() {
    for max in 0..5 {
        let provider = Arc::new(ScriptedProvider::new([ScriptedProvider::tool_call("web_search", "loop")]));
        let search = StubTool::new("web_search", "again");
        let service = service(provider.clone(), Some(search.clone()), bounded(max));

        let request = ChatRequest::new(MODEL, vec!["q".into()]).with_search(true);
        let err = service.handle(&request, &RunContext::new()).await.unwrap_err();

        assert!(matches!(err.root(), AgentError::MaxIterations(m) if *m == max));
        assert_eq!(search.calls(), max);
        assert_eq!(provider.calls(), max + 1);
    }
}

#[tokio::test]
async fn single_tool_failure_does_not_abort() {
    let provider = Arc::new(ScriptedProvider::new([
        ScriptedProvider::tool_call("web_search", "first try"),
        ScriptedProvider::tool_call("web_search", "second try"),
        "Answer after retrying.".to_string(),
    ]));
    let search = StubTool::failing("web_search", "HTTP 502");
    let service = service(provider, Some(search.clone()), bounded(5));

    let request = ChatRequest::new(MODEL, vec!["q".into()]).with_search(true);
    let response = service.handle(&request, &RunContext::new()).await.unwrap();

    assert_eq!(response.response, "Answer after retrying.");
    assert_eq!(search.calls(), 2);
}

#[tokio::test]
async fn identical_requests_give_identical_responses() {
    let script = [
        ScriptedProvider::tool_call("web_search", "france"),
        "Paris is the capital of France.".to_string(),
    ];
    let request = ChatRequest::new(MODEL, vec!["Capital of France?".into()])
        .with_system_prompt("Be brief.")
        .with_search(true);

    let mut transcripts = Vec::new();
    let mut responses = Vec::new();
    for _ in 0..2 {
        let provider = Arc::new(ScriptedProvider::new(script.clone()));
        let search = StubTool::new("web_search", "Paris, capital of France");
        let service = service(provider.clone(), Some(search), CoreConfig::default());

        responses.push(service.handle(&request, &RunContext::new()).await.unwrap());
        transcripts.push(
            provider
                .seen()
                .iter()
                .map(|turn| turn.iter().map(|m| (m.role, m.content.clone(), m.tool_call_id.clone())).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(responses[0], responses[1]);
    assert_eq!(transcripts[0], transcripts[1]);
}

#[tokio::test]
async fn concurrent_requests_share_nothing() {
    let provider = Arc::new(ScriptedProvider::new(["Same answer."]));
    let service = Arc::new(service(provider.clone(), None, CoreConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let request = ChatRequest::new(MODEL, vec![format!("question {i}")]);
                service.handle(&request, &RunContext::new()).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().response, "Same answer.");
    }

    // Each run saw only its own transcript: system prompt + one question.
    assert!(provider.seen().iter().all(|turn| turn.len() == 2));
}
