//! Integration tests for the pose-variant fan-out

use crate::integration::test_utils::{reference_image, ScriptedClient};
use shotlist::config::{GenerationConfig, ModelSet};
use shotlist::generation::{FanOutCoordinator, ItemStatus, ReferenceInputs};
use shotlist::pose::{PoseEditRequest, PoseEditor, POSE_VARIANTS, VARIANT_VIDEO_MODEL};
use shotlist::ItemId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn editor(client: Arc<ScriptedClient>, coordinator: Arc<FanOutCoordinator>) -> PoseEditor<ScriptedClient> {
    PoseEditor::new(
        client,
        ModelSet::default(),
        GenerationConfig::default(),
        coordinator,
    )
}

fn request() -> PoseEditRequest {
    PoseEditRequest {
        references: ReferenceInputs {
            primary: Some(reference_image(b"model")),
            face: None,
            background: Some(reference_image(b"studio")),
        },
        instruction: Some("keep the jacket open".to_string()),
        aspect_ratio: "9:16".to_string(),
        selected_color: Some("olive".to_string()),
    }
}

#[tokio::test]
async fn test_eight_variants_with_one_failure() {
    let client = Arc::new(ScriptedClient::new().failing_on("Angle: Low Angle."));
    let editor = editor(Arc::clone(&client), Arc::new(FanOutCoordinator::new()));

    let run = editor.run(&request()).await.unwrap();

    assert_eq!(run.report.total, 8);
    assert_eq!(run.report.loaded, 7);
    assert_eq!(run.report.failed, 1);
    assert_eq!(client.image_requests().len(), 8);

    let failed = run.state.get(ItemId(7)).unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);

    for (entry, variant) in run.state.entries().iter().zip(POSE_VARIANTS.iter()) {
        if entry.id == ItemId(7) {
            continue;
        }
        let payload = entry.payload.as_ref().unwrap();
        let video = payload.video_prompt.as_ref().unwrap();
        assert_eq!(video.model, VARIANT_VIDEO_MODEL);
        assert_eq!(video.config.camera_movement, variant.camera_movement);
        assert!(video.prompt.contains(variant.pose));
        assert!(video.prompt.contains("olive"));
    }
}

#[tokio::test]
async fn test_variant_prompts_carry_instruction_and_references() {
    let client = Arc::new(ScriptedClient::new());
    let editor = editor(Arc::clone(&client), Arc::new(FanOutCoordinator::new()));

    editor.run(&request()).await.unwrap();

    for request in client.image_requests() {
        // primary, background, prompt
        assert_eq!(request.parts.len(), 3);
        assert_eq!(request.settings.aspect_ratio.as_deref(), Some("9:16"));
        match request.parts.last() {
            Some(shotlist::provider::Part::Text(prompt)) => {
                assert!(prompt.contains("keep the jacket open"));
                assert!(!prompt.contains("face from the reference"));
            }
            other => panic!("expected text prompt, got {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_variants_are_dispatched_concurrently() {
    let client = Arc::new(ScriptedClient::new().delayed(Duration::from_millis(500)));
    let editor = editor(Arc::clone(&client), Arc::new(FanOutCoordinator::new()));

    let started = Instant::now();
    let run = editor.run(&request()).await.unwrap();

    assert_eq!(run.report.loaded, 8);
    assert!(started.elapsed() < Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_new_request_supersedes_run_in_flight() {
    let coordinator = Arc::new(FanOutCoordinator::new());
    let slow_client = Arc::new(ScriptedClient::new().delayed(Duration::from_secs(1)));
    let fast_client = Arc::new(ScriptedClient::new().delayed(Duration::from_millis(10)));
    let slow = editor(Arc::clone(&slow_client), Arc::clone(&coordinator));
    let fast = editor(Arc::clone(&fast_client), Arc::clone(&coordinator));

    let first_request = request();
    let second_request = request();
    let (first, second) = tokio::join!(slow.run(&first_request), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fast.run(&second_request).await
    });
    let first = first.unwrap();
    let second = second.unwrap();

    assert!(first.report.superseded);
    assert_eq!(first.report.stale, 8);
    assert_eq!(first.report.loaded, 0);
    assert!(!second.report.superseded);
    assert_eq!(second.report.loaded, 8);

    let current = coordinator.snapshot();
    assert_eq!(current.run_id(), second.report.run_id);
    assert_eq!(current.counts().loaded, 8);
    assert!(current.run_id() > first.report.run_id);
}
