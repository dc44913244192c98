use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use stepwise::prelude::*;

fn builtin_registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::new().with_builtin_tools().expect("built-in names are distinct"))
}

fn rule_agent() -> Orchestrator {
    Orchestrator::new(Arc::new(RulePlanner::new()), builtin_registry())
}

fn scripted_agent(replies: &[&str]) -> Orchestrator {
    Orchestrator::new(Arc::new(ScriptedLlm::new(replies.iter().copied())), builtin_registry())
}

/// Records the parsed plan and the resolved arguments of every step.
#[derive(Default)]
struct Recorder {
    plan: Mutex<Option<Plan>>,
    started: Mutex<Vec<(String, Value)>>,
}

impl EventHandler for Recorder {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::PlanParsed { plan, .. } => {
                *self.plan.lock().unwrap() = Some((*plan).clone());
            }
            AgentEvent::StepStarted {
                call_id, arguments, ..
            } => {
                self.started
                    .lock()
                    .unwrap()
                    .push((call_id.to_string(), Value::Object((*arguments).clone())));
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn percentage_question_is_rounded() {
    let answer = rule_agent().answer("What is 12.5% of 243?").await.unwrap();
    assert_eq!(answer.text, "30.38");
}

#[tokio::test]
async fn average_temperature_runs_three_steps() {
    let recorder = Arc::new(Recorder::default());
    let agent = rule_agent().with_event_handler(recorder.clone());

    let answer = agent
        .answer("Add 10 to the average temperature in Paris and London right now.")
        .await
        .unwrap();

    let plan = recorder.plan.lock().unwrap().clone().expect("plan parsed");
    assert_eq!(plan.steps.len(), 3);
    assert_eq!(
        plan.steps.iter().map(|s| s.tool_name.as_str()).collect::<Vec<_>>(),
        vec!["weather", "weather", "calc"]
    );
    assert_eq!(
        answer.source,
        AnswerSource::ToolResult {
            call_id: "t2".into(),
            tool_name: "calc".into()
        }
    );
    // (18 + 17) / 2 + 10
    assert_eq!(answer.text, "27.5");

    let started = recorder.started.lock().unwrap();
    assert_eq!(started[2].1, json!({ "expr": "(18+17)/2+10" }));
}

#[tokio::test]
async fn whole_value_placeholder_passes_the_literal_result() {
    let recorder = Arc::new(Recorder::default());
    let agent = scripted_agent(&[
        r#"{"steps": [{"id": "t0", "tool": "calc", "args": {"expr": "2+3"}},
                      {"id": "t1", "tool": "calc", "args": {"expr": "t0"}}]}"#,
    ])
    .with_event_handler(recorder.clone());

    let answer = agent.answer("five, twice").await.unwrap();
    assert_eq!(answer.text, "5");
    let started = recorder.started.lock().unwrap();
    assert_eq!(started[1], ("t1".to_string(), json!({ "expr": "5" })));
}

#[tokio::test]
async fn forward_reference_fails_before_the_tool_runs() {
    let recorder = Arc::new(Recorder::default());
    let agent = scripted_agent(&[
        r#"{"steps": [{"id": "t0", "tool": "calc", "args": {"expr": "t1 + 1"}},
                      {"id": "t1", "tool": "calc", "args": {"expr": "1"}}]}"#,
    ])
    .with_event_handler(recorder.clone());

    let failure = agent.answer("anything").await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::UnresolvedPlaceholder);
    assert!(recorder.started.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tool_is_reported_at_execution() {
    let agent = scripted_agent(&[r#"{"steps": [{"tool": "stock_price", "args": {"symbol": "ACME"}}]}"#]);
    let failure = agent.answer("ACME price?").await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::UnknownTool);
    assert!(failure.message.contains("stock_price"));
    assert!(failure.message.contains("calc"));
}

#[tokio::test]
async fn wrapped_and_strict_replies_give_the_same_answer() {
    let strict = r#"{"steps": [{"id": "t0", "tool": "weather", "args": {"city": "Dhaka"}}], "final_answer": null}"#;
    let fenced = format!("Sure, here is my plan:\n```json\n{strict}\n```\nLet me know!");
    let prose = format!("I'll check the weather. {strict} That should do it.");

    for reply in [strict.to_string(), fenced, prose] {
        let answer = scripted_agent(&[reply.as_str()]).answer("Weather in Dhaka?").await.unwrap();
        assert_eq!(answer.text, "31", "reply: {reply}");
    }
}

#[tokio::test]
async fn malformed_json_is_repaired() {
    let reply = "{'steps': [{'tool': 'unit_converter', 'args': {'value': 100, 'from_unit': 'celsius', 'to_unit': 'fahrenheit',},},],}";
    let answer = scripted_agent(&[reply]).answer("100C in F").await.unwrap();
    assert_eq!(answer.text, "212");
}

#[tokio::test]
async fn direct_answer_passes_through() {
    let answer = scripted_agent(&[r#"{"steps": [], "final_answer": "Paris."}"#])
        .answer("Capital of France?")
        .await
        .unwrap();
    assert_eq!(answer.text, "Paris.");
    assert_eq!(answer.source, AnswerSource::Direct);

    let answer = rule_agent().answer("Sing me a song").await.unwrap();
    assert_eq!(answer.text, "I don't understand the query: Sing me a song");

    let answer = rule_agent().answer("Sing me a song [please]").await.unwrap();
    assert_eq!(answer.text, "I don't understand the query: Sing me a song [please]");
    assert_eq!(answer.source, AnswerSource::Direct);
}

#[tokio::test]
async fn defective_plan_wrapped_in_prose_still_runs() {
    let reply = "Sure thing: {'steps': [{'tool': 'weather', 'args': {'city': 'London'},},]} Let me know if that's all.";
    let answer = scripted_agent(&[reply]).answer("London weather").await.unwrap();
    assert_eq!(answer.text, "17");
}

#[tokio::test]
async fn bare_step_like_words_are_not_placeholders() {
    let answer = scripted_agent(&[
        r#"{"steps": [{"tool": "translator", "args": {"text": "hola t1", "from_lang": "spanish", "to_lang": "english"}}]}"#,
    ])
    .answer("translate hola t1")
    .await
    .unwrap();
    assert_eq!(answer.text, "Translated from spanish to english: hola t1");
}

#[tokio::test]
async fn query_length_limit_is_inclusive() {
    let config = AgentConfig::default().with_max_query_chars(40);
    let agent = rule_agent().with_config(config);

    let exact = "é".repeat(40);
    assert!(agent.answer(&exact).await.is_ok());

    let over = format!("{exact}y");
    let failure = agent.answer(&over).await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::InputTooLong);
}

fn flaky_tool(fail_times: u32, calls: Arc<AtomicU32>) -> FnTool {
    FnTool::new(
        ToolSpec::builder("flaky_feed", "Sometimes times out")
            .returns(ParamType::Number)
            .build(),
        move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= fail_times {
                    Err(ToolError::from_message("upstream timed out"))
                } else {
                    Ok(json!(42))
                }
            }
        },
    )
}

fn flaky_agent(fail_times: u32, calls: Arc<AtomicU32>) -> Orchestrator {
    let registry = ToolRegistry::new()
        .with_builtin_tools()
        .and_then(|r| r.with(flaky_tool(fail_times, calls)))
        .unwrap();
    Orchestrator::new(
        Arc::new(ScriptedLlm::new([r#"{"steps": [{"tool": "flaky_feed", "args": {}}]}"#])),
        Arc::new(registry),
    )
    .with_config(AgentConfig::default().with_tool_retry(RetryConfig::immediate(3)))
}

#[tokio::test]
async fn transient_tool_failures_are_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let answer = flaky_agent(2, calls.clone()).answer("feed").await.unwrap();
    assert_eq!(answer.text, "42");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_the_plan() {
    let calls = Arc::new(AtomicU32::new(0));
    let failure = flaky_agent(3, calls.clone()).answer("feed").await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::PlanExecution);
    assert!(failure.message.contains("timed out"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invalid_expression_is_not_retried() {
    let failure = scripted_agent(&[r#"{"steps": [{"tool": "calc", "args": {"expr": "2 +"}}]}"#])
        .answer("broken math")
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ErrorKind::ToolInvocation);
}

#[tokio::test]
async fn file_backed_knowledge_base() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"entries": [{{"name": "Margaret Hamilton", "summary": "Led Apollo flight software."}}]}}"#
    )
    .unwrap();
    let kb = KnowledgeBase::from_path(file.path()).unwrap();
    let registry = Arc::new(ToolRegistry::new().with_builtin_tools_using(kb).unwrap());
    let agent = Orchestrator::new(Arc::new(RulePlanner::new()), registry);

    let answer = agent.answer("Who is Margaret Hamilton?").await.unwrap();
    assert_eq!(answer.text, "Led Apollo flight software.");
    let answer = agent.answer("Who is Ada Lovelace?").await.unwrap();
    assert_eq!(answer.text, "No entry found.");
}

#[tokio::test]
async fn many_queries_share_one_registry() {
    let results = rule_agent()
        .answer_many([
            "What is 12.5% of 243?",
            "Convert 100 degrees Celsius to Fahrenheit",
            "Translate 'gracias' to english",
            "",
        ])
        .await;
    let texts: Vec<Result<&str, ErrorKind>> = results
        .iter()
        .map(|r| r.as_ref().map(|a| a.text.as_str()).map_err(|f| f.kind))
        .collect();
    assert_eq!(
        texts,
        vec![Ok("30.38"), Ok("212"), Ok("thank you"), Err(ErrorKind::EmptyInput)]
    );
}
