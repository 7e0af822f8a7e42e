//! Review Workflow Tests
//! Test File: review_tests.rs
//! Covers approve, reject and request-changes against the status machine

mod helpers;

use cip_pipeline::models::PipelineStatus;
use cip_pipeline::{PipelineError, ReviewWorkflow};
use helpers::*;

/// TC-REVIEW-001: Approving a pipeline awaiting review
///
/// **Requirement:** Scenario D - one `approved` audit event per approval
#[tokio::test]
async fn tc_review_001_approve_review_required() {
    // Given: A pipeline in review_required
    let t = test_pipeline(Fakes::default()).await;
    let id = t.orchestrator.run_pipeline(YELLOW_URL).await.unwrap();
    assert_eq!(
        t.orchestrator.get_pipeline(id).await.unwrap().status,
        PipelineStatus::ReviewRequired
    );

    // When: A reviewer approves
    let review = ReviewWorkflow::new(t.orchestrator.clone());
    let record = review.approve(id, "dana", Some("Ship it")).await.unwrap();

    // Then: Approved, with exactly one audit event carrying the reviewer
    assert_eq!(record.status, PipelineStatus::Approved);
    assert_eq!(
        t.orchestrator.get_pipeline(id).await.unwrap().status,
        PipelineStatus::Approved
    );

    let approvals: Vec<_> = t
        .orchestrator
        .get_audit_log(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "approved")
        .collect();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].reviewer.as_deref(), Some("dana"));
    assert_eq!(approvals[0].metadata.as_ref().unwrap()["note"], "Ship it");
}

/// TC-REVIEW-002: Approved pipelines cannot be approved again
///
/// **Requirement:** Illegal transitions are rejected and not logged
#[tokio::test]
async fn tc_review_002_double_approval_rejected() {
    let t = test_pipeline(Fakes::default()).await;
    let id = t.orchestrator.run_pipeline(GREEN_URL).await.unwrap();
    let review = ReviewWorkflow::new(t.orchestrator.clone());

    review.approve(id, "dana", None).await.unwrap();
    let err = review.approve(id, "dana", None).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InvalidTransition {
            from: PipelineStatus::Approved,
            to: PipelineStatus::Approved
        }
    ));
    let events = audit_types(&t.orchestrator, id).await;
    assert_eq!(events.iter().filter(|e| *e == "approved").count(), 1);
}

/// TC-REVIEW-003: Safety-blocked pipelines can be rejected but not approved
///
/// **Requirement:** blocked_safety only moves to rejected
#[tokio::test]
async fn tc_review_003_blocked_safety_reject_only() {
    let t = test_pipeline(Fakes::default()).await;
    let id = t.orchestrator.run_pipeline(RED_URL).await.unwrap();
    let review = ReviewWorkflow::new(t.orchestrator.clone());

    let err = review.approve(id, "dana", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTransition { from: PipelineStatus::BlockedSafety, .. }));

    let record = review.reject(id, "dana", "Source is paywalled").await.unwrap();
    assert_eq!(record.status, PipelineStatus::Rejected);

    let log = t.orchestrator.get_audit_log(id).await.unwrap();
    let rejected = log.last().unwrap();
    assert_eq!(rejected.event_type, "rejected");
    assert_eq!(rejected.metadata.as_ref().unwrap()["reason"], "Source is paywalled");
}

/// TC-REVIEW-004: Requesting changes regenerates and logs the request first
///
/// **Requirement:** changes_requested precedes the regeneration events
#[tokio::test]
async fn tc_review_004_request_changes_regenerates() {
    let t = test_pipeline(Fakes::default()).await;
    let id = t.orchestrator.run_pipeline(YELLOW_URL).await.unwrap();
    let review = ReviewWorkflow::new(t.orchestrator.clone());

    let outcome = review
        .request_changes(id, "dana", "Add a section on BIMI")
        .await
        .unwrap();

    assert_eq!(outcome.status, PipelineStatus::ReviewRequired);
    assert_eq!(
        t.generator.briefs().last().unwrap().feedback.as_deref(),
        Some("Add a section on BIMI")
    );

    let log = t.orchestrator.get_audit_log(id).await.unwrap();
    let requested = log
        .iter()
        .position(|e| e.event_type == "changes_requested")
        .unwrap();
    let started = log
        .iter()
        .position(|e| e.event_type == "regeneration_started")
        .unwrap();
    assert!(requested < started);
    assert_eq!(log[requested].reviewer.as_deref(), Some("dana"));
}

/// TC-REVIEW-005: Review inputs must not be blank
///
/// **Requirement:** Blank reviewer, reason or feedback is invalid input
#[tokio::test]
async fn tc_review_005_blank_inputs_rejected() {
    let t = test_pipeline(Fakes::default()).await;
    let id = t.orchestrator.run_pipeline(GREEN_URL).await.unwrap();
    let review = ReviewWorkflow::new(t.orchestrator.clone());

    assert!(matches!(review.approve(id, "  ", None).await, Err(PipelineError::InputValidation(_))));
    assert!(matches!(review.reject(id, "dana", "").await, Err(PipelineError::InputValidation(_))));
    assert!(matches!(
        review.request_changes(id, "dana", " ").await,
        Err(PipelineError::InputValidation(_))
    ));

    // Status untouched
    assert_eq!(
        t.orchestrator.get_pipeline(id).await.unwrap().status,
        PipelineStatus::Completed
    );
}

/// TC-REVIEW-006: Failed pipelines accept no review action
///
/// **Requirement:** failed is terminal for reviewers
#[tokio::test]
async fn tc_review_006_failed_is_terminal() {
    let t = test_pipeline(Fakes {
        source: None,
        ..Default::default()
    })
    .await;
    let id = match t.orchestrator.run_pipeline(GREEN_URL).await.unwrap_err() {
        PipelineError::StageExecution { pipeline_id, .. } => pipeline_id,
        other => panic!("unexpected error: {other:?}"),
    };
    let review = ReviewWorkflow::new(t.orchestrator.clone());

    assert!(review.approve(id, "dana", None).await.is_err());
    assert!(review.reject(id, "dana", "Broken").await.is_err());
    assert!(matches!(
        review.request_changes(id, "dana", "Retry").await,
        Err(PipelineError::InvalidTransition { from: PipelineStatus::Failed, .. })
    ));
}

/// TC-REVIEW-007: Concurrent decisions on one pipeline apply exactly once
///
/// **Requirement:** One decision per pipeline; the losers see `InvalidTransition`
#[tokio::test]
async fn tc_review_007_concurrent_decisions_apply_once() {
    // Given: Pipelines awaiting review on a multi-connection WAL database
    let t = test_pipeline_on_disk(Fakes::default()).await;
    let review = ReviewWorkflow::new(t.orchestrator.clone());

    for _ in 0..5 {
        let id = t.orchestrator.run_pipeline(YELLOW_URL).await.unwrap();

        // When: Three reviewers act at the same time
        let (first, second, third) = tokio::join!(
            review.approve(id, "alex", None),
            review.approve(id, "blair", None),
            review.reject(id, "casey", "Off brand"),
        );

        // Then: Exactly one wins, the others are refused
        let outcomes = [first, second, third];
        let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "{outcomes:?}");
        for loser in outcomes.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(loser, PipelineError::InvalidTransition { .. }), "{loser:?}");
        }

        // And: Status and audit log agree on the single decision
        let final_status = t.orchestrator.get_pipeline(id).await.unwrap().status;
        assert_eq!(final_status, winners[0].status);
        let decisions: Vec<_> = audit_types(&t.orchestrator, id)
            .await
            .into_iter()
            .filter(|e| e == "approved" || e == "rejected")
            .collect();
        assert_eq!(decisions, vec![final_status.as_str().to_string()]);
    }
}
