//! Integration tests for the storyboard request pipeline

use crate::integration::test_utils::{plan_json, reference_image, ScriptedClient};
use shotlist::config::{GenerationConfig, ModelSet};
use shotlist::generation::{FanOutCoordinator, ItemStatus, ReferenceInputs, ReferencePolicy};
use shotlist::provider::Part;
use shotlist::storyboard::{Language, Orientation, StoryboardInput, StoryboardPipeline};
use shotlist::{ItemId, StudioError};
use std::sync::Arc;
use std::time::Duration;

fn models() -> ModelSet {
    ModelSet {
        analysis: "analysis-model".to_string(),
        plan: "plan-model".to_string(),
        image: "image-model".to_string(),
        ..ModelSet::default()
    }
}

fn pipeline(client: Arc<ScriptedClient>, policy: ReferencePolicy) -> StoryboardPipeline<ScriptedClient> {
    let generation = GenerationConfig {
        reference_policy: policy,
        ..GenerationConfig::default()
    };
    StoryboardPipeline::new(client, models(), generation, Arc::new(FanOutCoordinator::new()))
}

fn input() -> StoryboardInput {
    StoryboardInput {
        references: ReferenceInputs {
            primary: Some(reference_image(b"shirt")),
            face: Some(reference_image(b"face")),
            background: None,
        },
        product_description: "Navy linen shirt".to_string(),
        selected_color: Some("navy".to_string()),
        orientation: Orientation::Portrait,
        language: Language::English,
        additional_prompt: None,
    }
}

#[tokio::test]
async fn test_storyboard_run_settles_every_shot_independently() {
    let client = Arc::new(
        ScriptedClient::new()
            .with_plan(plan_json(12))
            .failing_on("scene 5."),
    );
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);

    let run = pipeline.run(&input()).await.unwrap();

    assert_eq!(run.campaign.shots.len(), 12);
    assert_eq!(run.report.total, 12);
    assert_eq!(run.report.loaded, 11);
    assert_eq!(run.report.failed, 1);
    assert!(!run.report.superseded);
    assert!(run.state.is_settled());

    let ids: Vec<u32> = run.state.entries().iter().map(|e| e.id.as_u32()).collect();
    assert_eq!(ids, (1..=12).collect::<Vec<_>>());

    let failed = run.state.get(ItemId(5)).unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);
    assert!(failed.failure.as_deref().unwrap().contains("quota exceeded"));
    assert!(failed.payload.is_none());

    let loaded = run.state.get(ItemId(6)).unwrap();
    assert_eq!(loaded.status, ItemStatus::Loaded);
    let image = &loaded.payload.as_ref().unwrap().image;
    assert_eq!(image.mime_type(), "image/png");
    let bytes = image.decode().unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("scene 6."));
}

#[tokio::test]
async fn test_shot_requests_carry_references_in_order_and_aspect_ratio() {
    let client = Arc::new(ScriptedClient::new().with_plan(plan_json(3)));
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);
    let mut input = input();
    input.orientation = Orientation::Landscape;

    pipeline.run(&input).await.unwrap();

    let images = client.image_requests();
    assert_eq!(images.len(), 3);
    for request in &images {
        assert_eq!(request.model, "image-model");
        assert_eq!(request.settings.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(request.parts.len(), 3);
        assert!(matches!(request.parts[0], Part::InlineData { .. }));
        assert!(matches!(request.parts[1], Part::InlineData { .. }));
        assert!(matches!(request.parts[2], Part::Text(_)));
    }

    let plan_request = client
        .requests()
        .into_iter()
        .find(|r| r.settings.response_schema.is_some())
        .unwrap();
    assert_eq!(plan_request.model, "plan-model");
    assert!(plan_request
        .system_instruction
        .as_deref()
        .unwrap()
        .contains("Navy linen shirt"));
}

#[tokio::test]
async fn test_missing_primary_reference_fails_before_any_request() {
    let client = Arc::new(ScriptedClient::new().with_plan(plan_json(12)));
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);
    let mut input = input();
    input.references.primary = None;

    let err = pipeline.run(&input).await.unwrap_err();

    assert!(matches!(err, StudioError::Preflight(_)));
    assert!(client.requests().is_empty());
    assert!(pipeline.coordinator().snapshot().is_empty());
}

#[tokio::test]
async fn test_plan_failure_is_one_preflight_error_and_nothing_dispatches() {
    let client = Arc::new(ScriptedClient::new());
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);

    let err = pipeline.run(&input()).await.unwrap_err();

    match err {
        StudioError::Preflight(message) => assert!(message.contains("plan")),
        other => panic!("expected preflight error, got {:?}", other),
    }
    assert_eq!(client.requests().len(), 1);
    assert!(client.image_requests().is_empty());
    assert!(pipeline.coordinator().snapshot().is_empty());
}

#[tokio::test]
async fn test_malformed_plan_is_rejected() {
    let client = Arc::new(ScriptedClient::new().with_plan("{\"shots\": []}"));
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);

    let err = pipeline.run(&input()).await.unwrap_err();

    assert!(matches!(err, StudioError::Preflight(_)));
    assert!(client.image_requests().is_empty());
}

#[tokio::test]
async fn test_unusable_face_degrades_or_fails_by_policy() {
    let mut bad_face = input();
    bad_face.references.face = Some("%%% not an image %%%".to_string());

    let client = Arc::new(ScriptedClient::new().with_plan(plan_json(2)));
    let degraded = pipeline(Arc::clone(&client), ReferencePolicy::Degrade)
        .run(&bad_face)
        .await
        .unwrap();
    assert_eq!(degraded.dropped_references, vec!["face"]);
    assert_eq!(degraded.report.loaded, 2);
    for request in client.image_requests() {
        assert_eq!(request.parts.len(), 2);
    }

    let strict_client = Arc::new(ScriptedClient::new().with_plan(plan_json(2)));
    let err = pipeline(Arc::clone(&strict_client), ReferencePolicy::Strict)
        .run(&bad_face)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Preflight(_)));
    assert!(strict_client.requests().is_empty());
}

#[tokio::test]
async fn test_analysis_describes_product_in_requested_language() {
    let client = Arc::new(ScriptedClient::new().with_analysis("  A navy linen shirt.\n"));
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);

    let description = pipeline
        .analyze_product(&input().references, Language::BahasaIndonesia, Some("navy"))
        .await
        .unwrap();

    assert_eq!(description, "A navy linen shirt.");
    let request = &client.requests()[0];
    assert_eq!(request.model, "analysis-model");
    match request.parts.last() {
        Some(Part::Text(prompt)) => {
            assert!(prompt.contains("Bahasa Indonesia"));
            assert!(prompt.contains("navy"));
        }
        other => panic!("expected text prompt, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_observers_see_shots_settle_in_completion_order() {
    let client = Arc::new(
        ScriptedClient::new()
            .with_plan(plan_json(3))
            .delayed_on("scene 1.", Duration::from_millis(300))
            .delayed_on("scene 2.", Duration::from_millis(100))
            .delayed_on("scene 3.", Duration::from_millis(200)),
    );
    let pipeline = pipeline(Arc::clone(&client), ReferencePolicy::Degrade);
    let mut observer = pipeline.coordinator().subscribe();

    let watcher = tokio::spawn(async move {
        let mut settled_order = Vec::new();
        while observer.changed().await.is_ok() {
            let state = observer.borrow_and_update().clone();
            for entry in state.entries() {
                if !entry.is_loading() && !settled_order.contains(&entry.id.as_u32()) {
                    settled_order.push(entry.id.as_u32());
                }
            }
            if state.len() == 3 && state.is_settled() {
                break;
            }
        }
        settled_order
    });

    let run = pipeline.run(&input()).await.unwrap();
    assert_eq!(run.report.loaded, 3);

    let order = watcher.await.unwrap();
    assert_eq!(order, vec![2, 3, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_late_plan_does_not_replace_newer_request() {
    let coordinator = Arc::new(FanOutCoordinator::new());
    let older = StoryboardPipeline::new(
        Arc::new(
            ScriptedClient::new()
                .with_plan(plan_json(3))
                .with_plan_delay(Duration::from_millis(300)),
        ),
        models(),
        GenerationConfig::default(),
        Arc::clone(&coordinator),
    );
    let newer_client = Arc::new(ScriptedClient::new().with_plan(plan_json(12)));
    let newer = StoryboardPipeline::new(
        Arc::clone(&newer_client),
        models(),
        GenerationConfig::default(),
        Arc::clone(&coordinator),
    );

    let older_input = input();
    let (older_result, newer_result) = tokio::join!(older.run(&older_input), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        newer.run(&input()).await
    });

    let newer_run = newer_result.unwrap();
    assert_eq!(newer_run.report.loaded, 12);
    assert_eq!(newer_run.report.stale, 0);
    assert!(!newer_run.report.superseded);
    assert!(matches!(
        older_result,
        Err(StudioError::Superseded(id)) if id == newer_run.report.run_id
    ));

    let state = coordinator.snapshot();
    assert_eq!(state.run_id(), newer_run.report.run_id);
    assert_eq!(state.len(), 12);
    assert!(state.is_settled());
    assert_eq!(newer_client.image_requests().len(), 12);
}
