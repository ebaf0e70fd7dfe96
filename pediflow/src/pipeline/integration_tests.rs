//! End-to-end tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::core::{RunContext, RunStatus, Task, TaskKind};
    use crate::errors::{PediflowError, TaskErrorKind};
    use crate::events::{
        PIPELINE_COMPLETED, PIPELINE_FALLBACK, PIPELINE_STARTED, TASK_DEPENDENCIES_UNMET,
        TASK_RETRYING, TASK_RETRY_EXHAUSTED,
    };
    use crate::executor::TaskExecutor;
    use crate::gateway::{GatewayError, MockCompletionGateway};
    use crate::pipeline::{
        FallbackStrategy, PipelineBuilder, PipelineCoordinator, PipelineDefinition,
        PipelineRegistry, MEDICAL_ANALYSIS, SIMPLIFIED_CONFIDENCE,
    };
    use crate::prompts::{ROLE_CLASSIFIER, ROLE_MEDICAL_ANALYZER, ROLE_RECOMMENDER};
    use crate::testing::{
        assert_close, assert_event_emitted, assert_task_failed_with, assert_task_succeeded,
        pipeline_gateway, RecordingEventSink, ScriptedGateway, ANALYSIS_JSON, CLASSIFICATION_JSON,
        CRITICAL_ANALYSIS_JSON, RECOMMENDATION_JSON,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn coordinator(gateway: Arc<ScriptedGateway>) -> (PipelineCoordinator, Arc<RecordingEventSink>) {
        let events = Arc::new(RecordingEventSink::new());
        let coordinator =
            PipelineCoordinator::new(TaskExecutor::new(gateway)).with_events(events.clone());
        (coordinator, events)
    }

    fn classify_only(strategy: FallbackStrategy) -> PipelineBuilder {
        PipelineBuilder::new("classify_only")
            .step(Task::new("classify", TaskKind::Classification))
            .with_fallback(strategy)
    }

    fn broken_definition(strategy: FallbackStrategy) -> PipelineDefinition {
        let mut def = PipelineDefinition::new("broken");
        def.fallback_strategy = strategy;
        def.steps.push(Task::new("classify", TaskKind::Classification));
        def.steps
            .push(Task::new("extract", TaskKind::Analysis).with_dependency("missing"));
        def
    }

    #[tokio::test]
    async fn test_medical_analysis_happy_path() {
        let gateway = Arc::new(pipeline_gateway());
        let (coordinator, events) = coordinator(gateway.clone());

        let result = coordinator
            .process_input(json!("Baby has 38.5 fever"), RunContext::new().with_patient_age(12.0))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.steps_completed, 4);
        assert_eq!(result.total_steps, 4);
        assert!(result.errors.is_empty());
        // 0.9 classify, 0.85 analysis, 1.0 validation, 0.75 recommendation.
        assert_close(result.confidence, 0.875);
        assert!(result.data.classification.is_some());
        assert!(result.data.analysis.is_some());
        assert!(result.data.validation.as_ref().unwrap().result.is_valid);
        assert!(result.data.recommendation.is_some());

        // Validation never reaches the gateway.
        assert_eq!(gateway.call_count(), 3);
        let names = events.names();
        assert_eq!(names.first().map(String::as_str), Some(PIPELINE_STARTED));
        assert_eq!(names.last().map(String::as_str), Some(PIPELINE_COMPLETED));
    }

    #[tokio::test]
    async fn test_failed_dependency_blocks_downstream_tasks() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .route_err(ROLE_CLASSIFIER, GatewayError::QuotaExceeded)
                .route_ok(ROLE_MEDICAL_ANALYZER, CRITICAL_ANALYSIS_JSON)
                .route_ok(ROLE_RECOMMENDER, RECOMMENDATION_JSON),
        );
        let (coordinator, events) = coordinator(gateway.clone());
        let def = coordinator.registry().get("medical_analysis").unwrap();

        let run = coordinator
            .run_definition(&def, json!("text"), RunContext::new())
            .await;

        assert_eq!(run.status(), RunStatus::Completed);
        let results = run.results();
        assert_eq!(results.len(), 4);
        assert_task_failed_with(&results[0], TaskErrorKind::GatewayQuotaExceeded);
        for result in &results[1..] {
            assert_task_failed_with(result, TaskErrorKind::DependencyUnmet);
            assert_eq!(result.agent_used, "error");
        }
        // Quota errors are not retried and blocked tasks never run.
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(events.count(TASK_RETRYING), 0);
        assert_eq!(events.count(TASK_DEPENDENCIES_UNMET), 3);

        let consolidated = run.consolidated().unwrap();
        assert!(!consolidated.success);
        assert!(consolidated.confidence.abs() < f64::EPSILON);
        assert_eq!(consolidated.errors.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_keeps_final_attempt() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .then_delay(Duration::from_secs(2), "not json at all")
                .then_delay(Duration::from_millis(100), CLASSIFICATION_JSON),
        );
        let (coordinator, events) = coordinator(gateway.clone());
        let def = classify_only(FallbackStrategy::Skip)
            .with_max_retries(1)
            .build()
            .unwrap();

        let run = coordinator
            .run_definition(&def, json!("fever"), RunContext::new())
            .await;

        let result = run.result("classify").unwrap();
        assert_task_succeeded(result);
        assert!(result.processing_time_ms >= 100.0 && result.processing_time_ms < 1000.0);
        assert_eq!(run.results().len(), 1);
        assert!(run.consolidated().unwrap().success);
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(events.count(TASK_RETRYING), 1);
        assert_eq!(events.count(TASK_RETRY_EXHAUSTED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .then_err(GatewayError::Network("down".into()))
                .then_err(GatewayError::Timeout)
                .then_err(GatewayError::Network("still down".into())),
        );
        let (coordinator, events) = coordinator(gateway.clone());
        let def = classify_only(FallbackStrategy::Skip)
            .with_max_retries(2)
            .build()
            .unwrap();

        let run = coordinator
            .run_definition(&def, json!("fever"), RunContext::new())
            .await;

        assert_task_failed_with(&run.results()[0], TaskErrorKind::GatewayNetworkError);
        assert_eq!(gateway.call_count(), 3);
        assert_eq!(events.count(TASK_RETRYING), 2);
        assert_event_emitted(&events, TASK_RETRY_EXHAUSTED);
        assert_eq!(run.status(), RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_skip_fallback_never_calls_gateway() {
        let mut gateway = MockCompletionGateway::new();
        gateway.expect_complete().never();
        let events = Arc::new(RecordingEventSink::new());
        let coordinator =
            PipelineCoordinator::new(TaskExecutor::new(Arc::new(gateway))).with_events(events.clone());

        let run = coordinator
            .run_definition(&broken_definition(FallbackStrategy::Skip), json!("x"), RunContext::new())
            .await;

        assert_eq!(run.status(), RunStatus::Failed);
        assert!(run.results().is_empty());
        let result = run.consolidated().unwrap();
        assert!(result.skipped);
        assert!(!result.success);
        assert_eq!(result.fallback, Some(FallbackStrategy::Skip));
        assert!(result.error.as_deref().unwrap().contains("missing"));
        assert_event_emitted(&events, PIPELINE_FALLBACK);
    }

    #[tokio::test]
    async fn test_human_fallback() {
        let (coordinator, _) = coordinator(Arc::new(ScriptedGateway::new()));
        let run = coordinator
            .run_definition(&broken_definition(FallbackStrategy::Human), json!("x"), RunContext::new())
            .await;

        let result = run.consolidated().unwrap();
        assert!(result.requires_human_review);
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_panic_triggers_simplify() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .then_panic("gateway exploded")
                .then_ok(CLASSIFICATION_JSON),
        );
        let (coordinator, _) = coordinator(gateway.clone());
        let def = classify_only(FallbackStrategy::Simplify)
            .step(Task::new("validate", TaskKind::Validation).with_dependency("classify"))
            .build()
            .unwrap();

        let run = coordinator
            .run_definition(&def, json!({"temperature": 43}), RunContext::new())
            .await;

        assert_eq!(run.status(), RunStatus::Failed);
        let result = run.consolidated().unwrap();
        assert!(result.simplified);
        assert_close(result.confidence, SIMPLIFIED_CONFIDENCE);
        assert!(result.data.classification.is_some());
        let validation = result.data.validation.as_ref().unwrap();
        assert_eq!(validation.result.critical_alerts.len(), 1);
        assert!(result.data.analysis.is_none());
        assert_eq!(result.error.as_deref(), Some("task panicked: gateway exploded"));
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_budget_records_remaining_tasks() {
        let mut gateway = ScriptedGateway::new().route_ok(ROLE_CLASSIFIER, CLASSIFICATION_JSON);
        for _ in 0..4 {
            gateway = gateway.then_delay(Duration::from_secs(20), ANALYSIS_JSON);
        }
        let gateway = Arc::new(gateway);
        let (coordinator, events) = coordinator(gateway.clone());
        let def = PipelineRegistry::with_defaults().get(MEDICAL_ANALYSIS).unwrap();

        let run = coordinator
            .run_definition(&def, json!("Baby has a fever"), RunContext::new())
            .await;

        assert_eq!(run.status(), RunStatus::Completed);
        let results = run.results();
        assert_eq!(results.len(), 4);
        assert_task_succeeded(&results[0]);
        assert_task_failed_with(&results[1], TaskErrorKind::GatewayTimeout);
        assert!(results[1]
            .error_message()
            .unwrap()
            .contains("exhausted its 30000 ms budget"));
        assert_task_failed_with(&results[2], TaskErrorKind::DependencyUnmet);
        assert_task_failed_with(&results[3], TaskErrorKind::DependencyUnmet);

        let result = run.consolidated().unwrap();
        assert!(!result.success);
        assert!(!result.simplified);
        assert!(result.fallback.is_none());
        assert_eq!(result.errors.len(), 3);
        // 10 s attempt, 1 s backoff, 10 s attempt, 2 s backoff, then cut off.
        assert_eq!(gateway.calls_matching(ROLE_MEDICAL_ANALYZER), 3);
        assert_eq!(events.count(PIPELINE_FALLBACK), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_after_budget_never_start() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .then_delay(Duration::from_secs(4), CLASSIFICATION_JSON)
                .then_ok(CLASSIFICATION_JSON),
        );
        let (coordinator, _) = coordinator(gateway.clone());
        let def = classify_only(FallbackStrategy::Simplify)
            .step(Task::new("classify_again", TaskKind::Classification))
            .with_timeout_ms(1_000)
            .build()
            .unwrap();

        let run = coordinator
            .run_definition(&def, json!("x"), RunContext::new())
            .await;

        assert_eq!(run.status(), RunStatus::Completed);
        for result in run.results() {
            assert_task_failed_with(result, TaskErrorKind::GatewayTimeout);
        }
        assert!(run.results()[1].processing_time_ms.abs() < f64::EPSILON);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_fallback_reruns_after_panic() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .then_panic("gateway exploded")
                .then_ok(CLASSIFICATION_JSON),
        );
        let (coordinator, events) = coordinator(gateway.clone());
        let def = classify_only(FallbackStrategy::Retry).build().unwrap();

        let run = coordinator
            .run_definition(&def, json!("x"), RunContext::new())
            .await;

        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.consolidated().unwrap().success);
        assert_eq!(events.count(PIPELINE_FALLBACK), 1);
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_fallback_is_bounded() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .then_panic("one")
                .then_panic("two")
                .then_ok(CLASSIFICATION_JSON),
        );
        let (coordinator, _) = coordinator(gateway.clone());
        let def = classify_only(FallbackStrategy::Retry).build().unwrap();

        let run = coordinator
            .run_definition(&def, json!("x"), RunContext::new())
            .await;

        let result = run.consolidated().unwrap();
        assert!(!result.success);
        assert_eq!(result.fallback, Some(FallbackStrategy::Retry));
        assert_eq!(result.error.as_deref(), Some("task panicked: two"));
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_pipeline_is_an_error() {
        let (coordinator, _) = coordinator(Arc::new(ScriptedGateway::new()));
        let err = coordinator
            .run_pipeline("nope", json!("x"), RunContext::new())
            .await
            .unwrap_err();
        match err {
            PediflowError::Definition(e) => assert_eq!(e.code(), Some("PIPELINE-UNKNOWN")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_critical_values_reach_recommendation_prompt() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .route_ok(ROLE_CLASSIFIER, CLASSIFICATION_JSON)
                .route_ok(ROLE_MEDICAL_ANALYZER, CRITICAL_ANALYSIS_JSON)
                .route_ok(ROLE_RECOMMENDER, RECOMMENDATION_JSON),
        );
        let (coordinator, _) = coordinator(gateway.clone());

        let result = coordinator
            .process_input(json!("43 degrees"), RunContext::new())
            .await
            .unwrap();

        let validation = result.data.validation.unwrap();
        assert!(!validation.result.is_valid);
        assert_eq!(validation.result.critical_alerts.len(), 1);
        let recommend_call = gateway
            .calls()
            .into_iter()
            .find(|c| c[0].content.starts_with(ROLE_RECOMMENDER))
            .unwrap();
        assert!(recommend_call[1].content.contains("Critical alerts"));
    }

    #[tokio::test]
    async fn test_custom_registry() {
        let registry = Arc::new(PipelineRegistry::new());
        registry
            .register(classify_only(FallbackStrategy::Skip).build().unwrap())
            .unwrap();
        let gateway = Arc::new(ScriptedGateway::new().then_ok(CLASSIFICATION_JSON));
        let (coordinator, _) = coordinator(gateway);
        let coordinator = coordinator.with_registry(registry);

        let result = coordinator
            .run_pipeline("classify_only", json!("x"), RunContext::new())
            .await
            .unwrap();
        assert!(result.success);
        assert!(coordinator
            .run_pipeline("medical_analysis", json!("x"), RunContext::new())
            .await
            .is_err());
    }
}
