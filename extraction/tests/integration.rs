use agentkit_extraction::prelude::*;
use agentkit_extraction::extract::decode;
use agentkit_extraction::retry::{AttemptFailure, run};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(JsonSchema, Deserialize, Debug, PartialEq)]
struct Tags {
    items: Vec<String>,
}

/// Generator that replays `replies` in order, repeating the last one.
fn scripted(replies: Vec<Result<&'static str, GenerationError>>) -> (impl Generate, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let replies = Arc::new(replies);
    let generator = from_fn(move |_conversation: Vec<Message>| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let reply = replies[n.min(replies.len() - 1)].clone();
        async move { reply.map(str::to_string) }
    });
    (generator, calls)
}

fn conversation() -> Vec<Message> {
    vec![
        Message::system("Answer inside a ```json block."),
        Message::user("List three letters."),
    ]
}

#[test]
fn test_schema_less_extraction() {
    let extracted = StructuredOutputExtractor::new()
        .extract(r#"```json{"a": 1, "b": "x", "c": false}```"#)
        .unwrap();
    assert!(!extracted.is_validated());
    assert_eq!(extracted.into_value(), json!({"a": 1, "b": "x", "c": false}));
}

#[test]
fn test_bare_list_wrapped_into_single_list_field() {
    let extractor = StructuredOutputExtractor::for_type::<Tags>();
    let extracted = extractor.extract(r#"```json["a", "b", "c"]```"#).unwrap();
    assert!(extracted.is_validated());
    assert_eq!(extracted.value(), &json!({"items": ["a", "b", "c"]}));

    let tags: Tags = extractor.extract_as(r#"```json["a", "b", "c"]```"#).unwrap();
    assert_eq!(tags.items, vec!["a", "b", "c"]);
}

#[test]
fn test_last_block_supersedes_malformed_draft() {
    let text = "Draft:\n```json\n{\"a\": [1, 2\n```\nFinal:\n```json\n{\"a\": [1, 2, 3]}\n```";
    let config = ExtractConfig::default().strategy(DecodeStrategy::Strict);
    let extracted = StructuredOutputExtractor::with_config(config).extract(text).unwrap();
    assert_eq!(extracted.into_value(), json!({"a": [1, 2, 3]}));
}

#[test]
fn test_missing_required_field_never_succeeds() {
    let schema = SchemaDescriptor::from_json_schema(json!({
        "type": "object",
        "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
        "required": ["name", "age"]
    }))
    .unwrap();
    let extractor = StructuredOutputExtractor::with_config(ExtractConfig::default().schema(schema));

    for strategy_text in [
        r#"```json{"name": "Ada"}```"#,
        "```json{name: 'Ada'}```",
        "```json{'name': 'Ada', ```",
    ] {
        let err = extractor.extract(strategy_text).unwrap_err();
        assert!(
            matches!(&err, ExtractionFailure::SchemaMismatch { errors, .. } if errors.iter().any(|e| e.path == "/age")),
            "unexpected result for {strategy_text}: {err:?}"
        );
    }
}

#[test]
fn test_tolerant_agrees_with_strict_on_valid_input() {
    let samples = [
        r#"{"a": 1, "b": [true, null, 2.5], "c": {"d": "e\n"}}"#,
        r#"[1, -2, 3e2, "x", {"y": []}]"#,
        r#"{"unicode": "é😀", "empty": {}}"#,
    ];
    for sample in samples {
        let strict = decode(sample, DecodeStrategy::Strict).unwrap();
        let tolerant = decode(sample, DecodeStrategy::Tolerant).unwrap();
        assert_eq!(strict, tolerant);
    }
}

#[tokio::test]
async fn test_no_block_exhausts_after_exact_budget() {
    let (generator, calls) = scripted(vec![Ok("I cannot answer in JSON, sorry.")]);
    let controller = RetryingGenerationController::new(generator, ExtractConfig::default()).max_attempts(3);

    let failure = controller.run(&conversation()).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(failure.attempts(), 3);
    match failure {
        RunFailure::Exhausted { last, history, .. } => {
            assert_eq!(last.kind(), "no_candidate_found");
            assert_eq!(history.len(), 3);
            assert_eq!(
                history.iter().map(|r| r.attempt_number).collect::<Vec<_>>(),
                vec![1, 2, 3]
            );
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_always_failing_generation_terminates() {
    let (generator, calls) = scripted(vec![Err(GenerationError::Unavailable("connection refused".into()))]);
    let controller = RetryingGenerationController::new(generator, ExtractConfig::default()).max_attempts(4);

    let failure = controller.run(&conversation()).await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(matches!(failure, RunFailure::GenerationExhausted { attempts: 4, .. }));
}

#[tokio::test]
async fn test_success_short_circuits() {
    let (generator, calls) = scripted(vec![
        Ok("thinking..."),
        Ok("```json{\"items\": [\"a\"]}```"),
        Ok("never requested"),
    ]);
    let controller = RetryingGenerationController::new(generator, ExtractConfig::default()).max_attempts(5);

    let success = controller.run(&conversation()).await.unwrap();

    assert_eq!(success.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(success.value.value(), &json!({"items": ["a"]}));
}

#[tokio::test]
async fn test_success_on_last_attempt() {
    let (generator, calls) = scripted(vec![Ok("nope"), Ok("nope"), Ok("```json[]```")]);
    let success = run(&conversation(), &generator, ExtractConfig::default(), 3).await.unwrap();
    assert_eq!(success.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_same_conversation_sent_without_feedback() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let generator = from_fn(move |conversation: Vec<Message>| {
        let mut log = log.lock().unwrap();
        log.push(conversation);
        let reply = if log.len() < 3 { "no block" } else { "```json{}```" };
        async move { Ok(reply.to_string()) }
    });
    let input = conversation();

    let success = RetryingGenerationController::new(generator, ExtractConfig::default())
        .run(&input)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|c| c == &input));
    assert_eq!(success.conversation.len(), input.len() + 1);
    assert_eq!(success.conversation.last().unwrap().role, Role::Assistant);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_consumes_one_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let generator = from_fn(move |_conversation: Vec<Message>| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(r#"```json{"a": 1}```"#.to_string())
        }
    });
    let config = RetryConfig::default()
        .with_max_attempts(5)
        .with_attempt_timeout(Duration::from_secs(5));
    let controller = RetryingGenerationController::with_config(generator, ExtractConfig::default(), config);

    let success = controller.run(&conversation()).await.unwrap();

    assert_eq!(success.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(success.value.into_value(), json!({"a": 1}));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_history_records_generation_failure() {
    let generator = from_fn(|_conversation: Vec<Message>| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(String::new())
    });
    let config = RetryConfig::default()
        .with_max_attempts(2)
        .with_attempt_timeout(Duration::from_secs(1));
    let controller = RetryingGenerationController::with_config(generator, ExtractConfig::default(), config);

    let failure = controller.run(&conversation()).await.unwrap_err();

    assert_eq!(failure.kind(), "generation_exhausted");
    assert!(failure.history().iter().all(|r| matches!(
        r.failure,
        AttemptFailure::Generation(GenerationError::Timeout(d)) if d == Duration::from_secs(1)
    )));
}

#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let (generator, calls) = scripted(vec![Ok("```json{}```")]);
    let controller = RetryingGenerationController::new(generator, ExtractConfig::default());
    let token = CancellationToken::new();
    token.cancel();

    let failure = controller.run_with_cancel(&conversation(), &token).await.unwrap_err();

    assert!(matches!(failure, RunFailure::Cancelled { attempts: 0, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_mid_generation() {
    let generator = from_fn(|_conversation: Vec<Message>| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("```json{}```".to_string())
    });
    let controller = RetryingGenerationController::new(generator, ExtractConfig::default());
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        }
    };
    let conversation = conversation();
    let (result, ()) = tokio::join!(controller.run_with_cancel(&conversation, &token), canceller);

    let failure = result.unwrap_err();
    assert_eq!(failure.kind(), "cancelled");
    assert_eq!(failure.attempts(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let generator = from_fn(|conversation: Vec<Message>| async move {
        let question = conversation.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(format!("```json{{\"echo\": \"{question}\"}}```"))
    });
    let controller = Arc::new(RetryingGenerationController::new(generator, ExtractConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.run(&[Message::user(format!("q{i}"))]).await })
        })
        .collect();

    for (i, handle) in futures::future::join_all(handles).await.into_iter().enumerate() {
        let success = handle.unwrap().unwrap();
        assert_eq!(success.value.value(), &json!({"echo": format!("q{i}")}));
        assert_eq!(success.conversation.len(), 2);
    }
}

#[tokio::test]
async fn test_append_hint_carries_field_errors() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let generator = from_fn(move |conversation: Vec<Message>| {
        let mut log = log.lock().unwrap();
        log.push(conversation);
        let reply = if log.len() == 1 {
            r#"```json{"items": "a"}```"#
        } else {
            r#"```json{"items": ["a"]}```"#
        };
        async move { Ok(reply.to_string()) }
    });
    let extract = ExtractConfig::default().schema(SchemaDescriptor::for_type::<Tags>());
    let config = RetryConfig::default().with_feedback(FeedbackPolicy::AppendHint);

    let success = RetryingGenerationController::with_config(generator, extract, config)
        .run(&conversation())
        .await
        .unwrap();

    assert_eq!(success.attempts, 2);
    let seen = seen.lock().unwrap();
    let hint = &seen[1].last().unwrap().content;
    assert!(hint.contains("At path '/items'"));
    assert!(hint.contains("Expected schema:"));
}
