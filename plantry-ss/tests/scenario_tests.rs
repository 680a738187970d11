//! End-to-end workflow scenarios
//!
//! Drives complete scan sessions through the session handle (spawned timer
//! and pipeline included) against in-memory fakes. Time-dependent tests run
//! on a paused tokio clock so the 2.5 s informational pause is exercised
//! deterministically.

mod helpers;

use helpers::{
    brandywine_extraction, log_entries, test_handle, wait_for_step, ExtractionOutcome,
    FixtureConfig,
};
use plantry_common::events::PlantryEvent;
use plantry_ss::models::{
    ExtractedSeedData, MatchAction, SaveSource, ScanStep, StashFields,
};
use plantry_ss::workflow::{WorkflowError, NOT_FOUND_ADVANCE};
use std::time::Duration;

/// Scenario A: happy path, barcode match
///
/// Scan "0123456789012" → found "Cherokee Purple Tomato" → edit stash
/// fields → confirm → saved exactly once with the edited values → success.
#[tokio::test]
async fn scenario_a_barcode_match_happy_path() {
    let (handle, fx) = test_handle(FixtureConfig::default());

    handle.select_barcode_path().await.unwrap();
    handle.on_barcode_decoded("0123456789012").await.unwrap();

    let snapshot = handle.snapshot().await;
    match &snapshot.step {
        ScanStep::Found { product, .. } => {
            assert_eq!(product.product_name, "Cherokee Purple Tomato");
            assert_eq!(product.vendor_name, "Baker Creek");
        }
        other => panic!("unexpected step {:?}", other),
    }

    handle
        .update_stash_fields(StashFields {
            quantity: 25,
            packed_for_year: 2025,
            storage_location: None,
        })
        .await
        .unwrap();

    handle.confirm().await.unwrap();
    assert_eq!(handle.snapshot().await.step.name(), "success");

    let saved = fx.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    let payload = &saved[0];
    assert_eq!(payload.scanned_barcode.as_deref(), Some("0123456789012"));
    assert_eq!(payload.stash.quantity, 25);
    assert_eq!(payload.stash.packed_for_year, 2025);
    match &payload.source {
        SaveSource::BarcodeMatch { product } => {
            assert_eq!(product.product_name, "Cherokee Purple Tomato");
        }
        other => panic!("unexpected save source {:?}", other),
    }
}

/// Scenario B: unknown barcode → photo flow
///
/// "999999999999" is unknown → 2.5 s informational pause auto-advances to
/// packet capture → captured frame runs the pipeline → review shows
/// "Brandywine" with a create_new verdict → confirm → success.
#[tokio::test(start_paused = true)]
async fn scenario_b_unknown_barcode_photo_flow() {
    let (handle, fx) = test_handle(FixtureConfig::default());
    let mut events = fx.bus.subscribe();

    handle.select_barcode_path().await.unwrap();
    handle.on_barcode_decoded("999999999999").await.unwrap();
    assert_eq!(handle.snapshot().await.step, ScanStep::NotFoundTransition);

    // Let the informational pause elapse
    tokio::time::sleep(NOT_FOUND_ADVANCE + Duration::from_millis(100)).await;
    let snapshot = wait_for_step(&handle, "packet_capture").await;
    assert!(snapshot.step.error().is_none());

    handle.on_frame(&helpers::tiny_png()).await.unwrap();
    let snapshot = wait_for_step(&handle, "review").await;

    match &snapshot.step {
        ScanStep::Review { draft, .. } => {
            assert_eq!(draft.extracted.variety_name, "Brandywine");
            assert_eq!(draft.verdict.action, MatchAction::CreateNew);
            assert_eq!(draft.packet_image_url, "/packet_images/test.png");
        }
        other => panic!("unexpected step {:?}", other),
    }
    assert_eq!(snapshot.scanned_barcode.as_deref(), Some("999999999999"));

    handle.confirm().await.unwrap();
    assert_eq!(handle.snapshot().await.step.name(), "success");

    // Progress moved through the documented bands, monotonically
    let mut percents = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PlantryEvent::ScanProgressUpdate { percent, .. } = event {
            percents.push(percent);
        }
    }
    assert_eq!(percents, vec![10, 30, 60, 95, 100]);

    // The barcode carried into the extraction request
    let log = log_entries(&fx.log);
    assert!(log
        .iter()
        .any(|e| e.contains("extractor.extract") && e.contains("999999999999")));
}

/// The not-found pause advances exactly once, and close cancels it
#[tokio::test(start_paused = true)]
async fn not_found_timer_cancelled_on_close() {
    let (handle, fx) = test_handle(FixtureConfig::default());

    handle.select_barcode_path().await.unwrap();
    handle.on_barcode_decoded("999999999999").await.unwrap();
    assert_eq!(handle.snapshot().await.step, ScanStep::NotFoundTransition);

    handle.close().await;

    // Even well past the deadline, no transition may happen after close
    tokio::time::sleep(NOT_FOUND_ADVANCE * 3).await;
    assert_eq!(handle.snapshot().await.step, ScanStep::NotFoundTransition);

    let err = handle.proceed_to_photo().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Closed));

    // No camera was ever acquired
    assert!(!log_entries(&fx.log).contains(&"camera.start".to_string()));
}

/// Manual "use photo instead" short-circuits the pause; the late timer
/// firing is a no-op
#[tokio::test(start_paused = true)]
async fn not_found_short_circuit_keeps_single_camera() {
    let (handle, fx) = test_handle(FixtureConfig::default());

    handle.select_barcode_path().await.unwrap();
    handle.on_barcode_decoded("999999999999").await.unwrap();

    handle.proceed_to_photo().await.unwrap();
    assert_eq!(handle.snapshot().await.step.name(), "packet_capture");

    tokio::time::sleep(NOT_FOUND_ADVANCE * 2).await;

    // Still exactly one camera acquisition; the stale timer did not re-enter
    let starts = log_entries(&fx.log)
        .iter()
        .filter(|e| *e == "camera.start")
        .count();
    assert_eq!(starts, 1);
}

/// Pipeline ordering: upload → extract → match, and extraction failure
/// means the matcher is never called
#[tokio::test]
async fn pipeline_runs_sequentially_and_fails_back_to_capture() {
    let config = FixtureConfig {
        extraction: ExtractionOutcome::Rejected("blurry image".to_string()),
        ..Default::default()
    };
    let (handle, fx) = test_handle(config);

    handle.select_photo_path().await.unwrap();
    handle.on_frame(&helpers::tiny_png()).await.unwrap();

    let snapshot = wait_for_step(&handle, "packet_capture").await;
    assert_eq!(snapshot.step.error(), Some("blurry image"));

    let log = log_entries(&fx.log);
    let store_idx = log.iter().position(|e| e == "images.store").unwrap();
    let extract_idx = log
        .iter()
        .position(|e| e.starts_with("extractor.extract"))
        .unwrap();
    assert!(store_idx < extract_idx, "extraction ran before upload: {:?}", log);
    assert!(
        !log.iter().any(|e| e.starts_with("matcher.match")),
        "matcher must not run after a failed extraction: {:?}",
        log
    );

    // Nothing from the failed attempt is retained: a later successful flow
    // starts from a clean draft (no extracted data accessible here)
    assert!(!log.iter().any(|e| e == "persister.save"));
}

/// Successful pipeline invokes the three calls strictly in order
#[tokio::test]
async fn pipeline_order_on_success() {
    let (handle, fx) = test_handle(FixtureConfig::default());

    handle.select_photo_path().await.unwrap();
    handle.on_upload(&helpers::tiny_png()).await.unwrap();
    wait_for_step(&handle, "review").await;

    let log = log_entries(&fx.log);
    let store_idx = log.iter().position(|e| e == "images.store").unwrap();
    let extract_idx = log
        .iter()
        .position(|e| e.starts_with("extractor.extract"))
        .unwrap();
    let match_idx = log
        .iter()
        .position(|e| e.starts_with("matcher.match"))
        .unwrap();
    assert!(store_idx < extract_idx && extract_idx < match_idx, "{:?}", log);
}

/// Review edits round-trip exactly into the save payload
#[tokio::test]
async fn review_edits_round_trip_to_save() {
    let (handle, fx) = test_handle(FixtureConfig::default());

    handle.select_photo_path().await.unwrap();
    handle.on_upload(&helpers::tiny_png()).await.unwrap();
    wait_for_step(&handle, "review").await;

    let edited = ExtractedSeedData {
        variety_name: "Brandywine Pink".to_string(),
        ..brandywine_extraction()
    };
    let stash = StashFields {
        quantity: 42,
        packed_for_year: 2024,
        storage_location: Some("Basement fridge".to_string()),
    };
    handle
        .update_review(Some(edited.clone()), Some(stash.clone()))
        .await
        .unwrap();

    handle.confirm().await.unwrap();

    let saved = fx.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    match &saved[0].source {
        SaveSource::PacketExtraction { extracted, .. } => {
            // No server-default substitution: the edited values go out as-is
            assert_eq!(*extracted, edited);
        }
        other => panic!("unexpected save source {:?}", other),
    }
    assert_eq!(saved[0].stash, stash);
}

/// Save failure keeps the user on review with the error surfaced
#[tokio::test]
async fn save_failure_stays_in_review() {
    let config = FixtureConfig {
        persist_fails: true,
        ..Default::default()
    };
    let (handle, fx) = test_handle(config);

    handle.select_photo_path().await.unwrap();
    handle.on_upload(&helpers::tiny_png()).await.unwrap();
    wait_for_step(&handle, "review").await;

    let err = handle.confirm().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Storage(_)));

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.step.name(), "review");
    assert!(snapshot.step.error().unwrap().contains("Save failed"));
    assert!(fx.saved.lock().unwrap().is_empty());
}

/// Camera failure does not block the flow: gallery upload still works
#[tokio::test]
async fn upload_fallback_after_camera_failure() {
    let (handle, _fx) = test_handle(FixtureConfig::default());

    handle.select_photo_path().await.unwrap();
    handle
        .on_device_error("Camera permission denied")
        .await
        .unwrap();

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.step.error(), Some("Camera permission denied"));

    handle.on_upload(&helpers::tiny_png()).await.unwrap();
    wait_for_step(&handle, "review").await;
}

/// "Scan another" from success resets the full session
#[tokio::test]
async fn scan_another_resets_session() {
    let (handle, _fx) = test_handle(FixtureConfig::default());

    handle.select_barcode_path().await.unwrap();
    handle.on_barcode_decoded("0123456789012").await.unwrap();
    handle.confirm().await.unwrap();
    assert_eq!(handle.snapshot().await.step.name(), "success");

    handle.rescan().await.unwrap();

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.step, ScanStep::Choice);
    assert!(snapshot.scanned_barcode.is_none());
}
