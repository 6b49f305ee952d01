//! Integration test for ReAct runs
//!
//! Drives the ReAct agent and handler end to end with a mock model and tools

use anyhow::Result;
use ark::agent::{Agent, AgentContext, AgentState, ReactAgent};
use ark::config::Configuration;
use ark::llm::{ModelClient, ToolCallRequest, ToolCallResponse};
use ark::memory::{Message, Role, ToolArguments, ToolCall};
use ark::orchestration::{sequenced_printer, AgentHandlerFactory, AgentType};
use ark::registry::{LocalTool, ToolRegistry};
use ark::sequencer::{message_type, EventMessage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

// Mock model replaying scripted replies
struct MockModel {
    responses: Arc<Mutex<Vec<ToolCallResponse>>>,
    requests: Arc<Mutex<usize>>,
}

impl MockModel {
    fn new(responses: Vec<ToolCallResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(0)),
        }
    }

    fn request_count(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn ask_tool(&self, _request: ToolCallRequest) -> Result<ToolCallResponse> {
        *self.requests.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ToolCallResponse::text("TASK_COMPLETE"))
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn ask(
        &self,
        _request_id: &str,
        _messages: Vec<Message>,
        _system: Option<Message>,
        _temperature: Option<f32>,
    ) -> Result<String> {
        Ok("Counted the items.$$$tally.csv".to_string())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// Tool that fails for a configured set of inputs
struct FlakyTool {
    failing: Vec<u64>,
}

#[async_trait]
impl LocalTool for FlakyTool {
    fn name(&self) -> &str {
        "count"
    }

    fn description(&self) -> &str {
        "Count to n"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"n": {"type": "integer"}}, "required": ["n"]})
    }

    async fn execute(&self, args: ToolArguments) -> Result<String> {
        let n = args.as_value()["n"].as_u64().unwrap_or_default();
        if self.failing.contains(&n) {
            anyhow::bail!("cannot count to {}", n);
        }
        Ok(format!("counted to {}", n))
    }
}

// Tool that sleeps for the requested time and records when it finished
struct SleepTool {
    finished: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl LocalTool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Sleep for a while"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"millis": {"type": "integer"}}})
    }

    async fn execute(&self, args: ToolArguments) -> Result<String> {
        let millis = args.as_value()["millis"].as_u64().unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(millis)).await;
        self.finished.lock().unwrap().push(millis);
        Ok(format!("slept {}ms", millis))
    }
}

fn sleep_call(id: &str, millis: u64) -> ToolCall {
    ToolCall::new(id, "sleep", json!({ "millis": millis }).to_string())
}

fn count_call(n: u64) -> ToolCall {
    ToolCall::new(format!("c{}", n), "count", json!({ "n": n }).to_string())
}

fn registry(failing: Vec<u64>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register_local(Arc::new(FlakyTool { failing })).unwrap();
    registry
}

fn drain(rx: &mut UnboundedReceiver<EventMessage>) -> Vec<EventMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_execute_many_isolates_failures() {
    let registry = registry(vec![2, 5]);
    let calls: Vec<ToolCall> = (1..=7).map(count_call).collect();

    let results = registry.execute_many(&calls).await;

    assert_eq!(results.len(), 7);
    for n in 1..=7 {
        let result = &results[&format!("c{}", n)];
        if n == 2 || n == 5 {
            assert!(result.starts_with("Error:"), "c{} should fail: {}", n, result);
        } else {
            assert_eq!(result, &format!("counted to {}", n));
        }
    }
}

#[tokio::test]
async fn test_memory_follows_call_order() {
    let config = Configuration::default();
    let (printer, mut events) = sequenced_printer("req-react", &config);
    let context = Arc::new(AgentContext::new(
        "req-react",
        "count things",
        printer,
        registry(vec![2]),
    ));
    let model = Arc::new(MockModel::new(vec![
        ToolCallResponse::with_calls("Counting", vec![count_call(1), count_call(2), count_call(3)]),
        ToolCallResponse::text("Counted 1 and 3"),
    ]));
    let mut agent = ReactAgent::react(context, model.clone(), &config);

    let output = agent.run("count things").await.unwrap();

    assert_eq!(output, "Counted 1 and 3");
    assert_eq!(agent.state(), AgentState::Finished);
    let roles: Vec<Role> = agent.core().memory.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Tool, Role::User, Role::Assistant]
    );
    let ids: Vec<&str> = agent
        .core()
        .memory
        .messages()
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);

    let results: Vec<EventMessage> = drain(&mut events)
        .into_iter()
        .filter(|e| e.message_type == message_type::TOOL_RESULT)
        .collect();
    let orders: Vec<u64> = results.iter().map(|e| e.message_order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert!(results[1].result_map["toolResult"]
        .as_str()
        .unwrap()
        .starts_with("Error:"));
}

#[tokio::test(start_paused = true)]
async fn test_memory_follows_call_order_when_completion_is_reversed() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    let tools = ToolRegistry::new();
    tools
        .register_local(Arc::new(SleepTool {
            finished: finished.clone(),
        }))
        .unwrap();

    let config = Configuration::default();
    let (printer, mut events) = sequenced_printer("req-slow", &config);
    let context = Arc::new(AgentContext::new("req-slow", "nap", printer, tools));
    let model = Arc::new(MockModel::new(vec![
        ToolCallResponse::with_calls(
            "Napping",
            vec![
                sleep_call("s1", 30),
                sleep_call("s2", 20),
                sleep_call("s3", 10),
            ],
        ),
        ToolCallResponse::text("Rested"),
    ]));
    let mut agent = ReactAgent::react(context, model, &config);

    let output = agent.run("nap").await.unwrap();

    assert_eq!(output, "Rested");
    assert_eq!(*finished.lock().unwrap(), vec![10, 20, 30]);

    let observations: Vec<(&str, &str)> = agent
        .core()
        .memory
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.as_deref().unwrap_or_default(), m.content.as_str()))
        .collect();
    assert_eq!(
        observations,
        vec![("s1", "slept 30ms"), ("s2", "slept 20ms"), ("s3", "slept 10ms")]
    );

    let results: Vec<(u64, String)> = drain(&mut events)
        .into_iter()
        .filter(|e| e.message_type == message_type::TOOL_RESULT)
        .map(|e| {
            let text = e.result_map["toolResult"].as_str().unwrap_or_default().to_string();
            (e.message_order, text)
        })
        .collect();
    assert_eq!(
        results,
        vec![
            (1, "slept 30ms".to_string()),
            (2, "slept 20ms".to_string()),
            (3, "slept 10ms".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_step_budget_truncates_run() {
    let mut config = Configuration::default();
    config.react.max_steps = 3;
    let (printer, _events) = sequenced_printer("req-budget", &config);
    let context = Arc::new(AgentContext::new(
        "req-budget",
        "count forever",
        printer,
        registry(vec![]),
    ));
    let model = Arc::new(MockModel::new(
        (1..=5)
            .map(|n| ToolCallResponse::with_calls("", vec![count_call(n)]))
            .collect(),
    ));
    let mut agent = ReactAgent::react(context, model.clone(), &config);

    let output = agent.run("count forever").await.unwrap();

    assert_eq!(output, "Terminated: Reached max steps (3)");
    assert_eq!(agent.state(), AgentState::Idle);
    assert_eq!(agent.core().current_step, 0);
    assert_eq!(model.request_count(), 3);
}

#[tokio::test]
async fn test_dispatch_streams_single_result() {
    let config = Arc::new(Configuration::default());
    let (printer, mut events) = sequenced_printer("req-dispatch", &config);
    let context = AgentContext::new("req-dispatch", "count to two", printer.clone(), registry(vec![]))
        .with_agent_type(AgentType::React);
    context.add_product_file(ark::agent::FileInfo::new("tally.csv", "Counts"));
    let model = Arc::new(MockModel::new(vec![
        ToolCallResponse::with_calls("", vec![count_call(2)]),
        ToolCallResponse::text("Reached two"),
    ]));

    let factory = AgentHandlerFactory::with_defaults(model, config);
    let payload = factory.dispatch(Arc::new(context)).await.unwrap().unwrap();

    assert_eq!(payload["taskSummary"], "Counted the items.");
    assert_eq!(payload["fileList"][0]["fileName"], "tally.csv");

    let events = drain(&mut events);
    let last = events.last().unwrap();
    assert_eq!(last.message_type, message_type::RESULT);
    assert!(last.finish);
    assert_eq!(
        events.iter().filter(|e| e.finish).count(),
        1,
        "exactly one terminal event"
    );
    assert_eq!(printer.snapshot().result, Some(payload));
}
