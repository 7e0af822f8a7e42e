//! Pipeline orchestrator
//!
//! Runs the eight stages in order for a source URL, persisting every stage
//! output (success or failure) and owning all automated status transitions.
//!
//! Every stage goes through the same wrapper:
//! 1. run the stage body
//! 2. persist its envelope (success payload or failure with cause chain)
//! 3. on success advance `current_stage` and log `stage_N_completed`
//! 4. on failure log `stage_N_failed` and hand control to the run's failure policy
//!
//! Gate blocks are normal outcomes: the run stops with `blocked_safety` or
//! `blocked_qa` and returns the pipeline id. Only stage failures, cancellation
//! and persistence errors surface as `Err`.

use crate::artifacts::ArtifactStore;
use crate::config::PipelineSettings;
use crate::db::{self, AuditEntry};
use crate::error::{PipelineError, PipelineResult};
use crate::models::stage::{failure_envelope, success_envelope};
use crate::models::{
    AnalysisOutput, AuditEvent, AuditEventType, ContentBrief, PipelineRecord, PipelineStatus, Stage,
    StageOutputRecord,
};
use crate::stages::{self, StageContext};
use crate::text::validate_source_url;
use crate::types::{Collaborators, StageFailure, StageOutcome};
use crate::workflow::PipelineEvent;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of a human-feedback regeneration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegenerationOutcome {
    pub pipeline_id: Uuid,
    /// `review_required` on success, `blocked_qa` when the new draft is blocked
    pub status: PipelineStatus,
    pub quality_score: Option<f64>,
}

/// How a run reacts to a failed stage
#[derive(Debug, Clone, Copy)]
enum RunMode {
    /// First pass over all eight stages; failure marks the pipeline `failed`
    Initial,
    /// Stages 5-8 rerun; failure restores the status held before regeneration
    Regeneration { prior_status: PipelineStatus },
}

/// Stage result after persistence
enum Step<T> {
    Continue(T),
    Halt { output: T, reasons: Vec<String> },
}

impl<T> Step<T> {
    fn into_output(self) -> T {
        match self {
            Step::Continue(output) | Step::Halt { output, .. } => output,
        }
    }
}

/// End of stages 5-8
enum Generation {
    Formatted { quality_score: f64 },
    BlockedQa { quality_score: f64, reasons: Vec<String> },
}

/// Drives pipelines through the stages
///
/// Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct Orchestrator {
    pool: SqlitePool,
    settings: Arc<PipelineSettings>,
    collaborators: Collaborators,
    artifacts: ArtifactStore,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Orchestrator {
    pub fn new(
        pool: SqlitePool,
        settings: PipelineSettings,
        collaborators: Collaborators,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
            collaborators,
            artifacts,
            event_tx: None,
        }
    }

    /// Send progress events to `tx`; events are dropped when the channel is full
    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    fn max_wait_ms(&self) -> u64 {
        self.settings.database.max_lock_wait_ms
    }

    fn context(&self, pipeline_id: Uuid) -> StageContext<'_> {
        StageContext {
            pipeline_id,
            settings: &self.settings,
            collaborators: &self.collaborators,
            artifacts: &self.artifacts,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Pipeline record by id
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> PipelineResult<PipelineRecord> {
        db::get_pipeline(&self.pool, pipeline_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("pipeline {}", pipeline_id)))
    }

    /// Most recently updated pipelines, optionally filtered by status
    pub async fn list_pipelines(
        &self,
        status: Option<PipelineStatus>,
        limit: u32,
    ) -> PipelineResult<Vec<PipelineRecord>> {
        Ok(db::list_pipelines(&self.pool, status, limit).await?)
    }

    /// Latest output of every stage that has run, keyed by stage
    pub async fn get_pipeline_outputs(
        &self,
        pipeline_id: Uuid,
    ) -> PipelineResult<BTreeMap<Stage, StageOutputRecord>> {
        self.get_pipeline(pipeline_id).await?;
        Ok(db::get_latest_outputs(&self.pool, pipeline_id).await?)
    }

    /// Audit history, oldest first
    pub async fn get_audit_log(&self, pipeline_id: Uuid) -> PipelineResult<Vec<AuditEvent>> {
        self.get_pipeline(pipeline_id).await?;
        Ok(db::get_audit_log(&self.pool, pipeline_id).await?)
    }

    // ========================================================================
    // Initial run
    // ========================================================================

    /// Run all eight stages for `source_url`
    ///
    /// Returns the pipeline id once the run reaches a non-running status through
    /// normal processing (completed, review_required, blocked_safety, blocked_qa).
    pub async fn run_pipeline(&self, source_url: &str) -> PipelineResult<Uuid> {
        self.run_pipeline_with_cancellation(source_url, CancellationToken::new())
            .await
    }

    /// Same as [`run_pipeline`](Self::run_pipeline), checking `cancel_token`
    /// before every stage
    pub async fn run_pipeline_with_cancellation(
        &self,
        source_url: &str,
        cancel_token: CancellationToken,
    ) -> PipelineResult<Uuid> {
        validate_source_url(source_url).map_err(PipelineError::InputValidation)?;
        let source_url = source_url.trim().to_string();

        let record = PipelineRecord::new(source_url.clone());
        let id = record.id;
        db::create_pipeline(&self.pool, &record, self.max_wait_ms()).await?;
        self.audit(id, AuditEventType::PIPELINE_STARTED, json!({ "source_url": source_url }))
            .await?;

        info!(pipeline_id = %id, source_url = %source_url, "Pipeline started");
        self.emit(PipelineEvent::PipelineStarted {
            pipeline_id: id,
            source_url: source_url.clone(),
            timestamp: Utc::now().timestamp(),
        });

        let mode = RunMode::Initial;
        let ctx = self.context(id);

        // Stage 1: extraction
        self.checkpoint(id, Stage::Extraction, &cancel_token).await?;
        let extraction = self
            .step(mode, id, Stage::Extraction, stages::extract::run(&ctx, &source_url).await)
            .await?
            .into_output();

        // Stage 2: analysis
        self.checkpoint(id, Stage::Analysis, &cancel_token).await?;
        let analysis = self
            .step(mode, id, Stage::Analysis, stages::analyze::run(&ctx, &extraction).await)
            .await?
            .into_output();

        // Stage 3: safety gate
        self.checkpoint(id, Stage::Safety, &cancel_token).await?;
        let safety = self
            .step(
                mode,
                id,
                Stage::Safety,
                stages::safety::run(&ctx, &source_url, &extraction).await,
            )
            .await?;
        let (safety, blocked_reasons) = match safety {
            Step::Continue(output) => (output, None),
            Step::Halt { output, reasons } => (output, Some(reasons)),
        };
        let decision = safety.decision;
        db::set_safety_decision(&self.pool, id, decision.risk_level, self.max_wait_ms()).await?;

        if let Some(reasons) = blocked_reasons {
            warn!(pipeline_id = %id, risk = %decision.risk_level, "Pipeline blocked by safety gate");
            self.audit(
                id,
                AuditEventType::BLOCKED_SAFETY,
                json!({ "risk_level": decision.risk_level, "warnings": reasons }),
            )
            .await?;
            self.finish_blocked(id, Stage::Safety, PipelineStatus::BlockedSafety, reasons, None)
                .await?;
            return Ok(id);
        }

        // Stage 4: brand corpus
        self.checkpoint(id, Stage::RagSetup, &cancel_token).await?;
        self.step(mode, id, Stage::RagSetup, stages::rag_setup::run(&ctx).await)
            .await?;

        // Stages 5-8
        let generation = self
            .generate(mode, id, &analysis.content_brief, Some(&cancel_token))
            .await?;

        match generation {
            Generation::BlockedQa { quality_score, reasons } => {
                self.block_qa(id, quality_score, reasons).await?;
            }
            Generation::Formatted { quality_score } => {
                let status = if decision.requires_human_review {
                    PipelineStatus::ReviewRequired
                } else {
                    PipelineStatus::Completed
                };
                db::set_status(&self.pool, id, status, self.max_wait_ms()).await?;
                self.audit(
                    id,
                    AuditEventType::PIPELINE_COMPLETED,
                    json!({
                        "quality_score": quality_score,
                        "safety_decision": decision.risk_level,
                        "requires_review": decision.requires_human_review,
                    }),
                )
                .await?;

                info!(pipeline_id = %id, status = %status, quality_score, "Pipeline finished");
                self.emit_finished(id, status, Some(quality_score));
            }
        }

        Ok(id)
    }

    // ========================================================================
    // Regeneration
    // ========================================================================

    /// Rerun stages 5-8 with reviewer feedback injected into the stored brief
    ///
    /// Allowed from `completed`, `review_required` and `blocked_qa`. Stages 1-4
    /// are not rerun and their stored outputs are untouched. On success the
    /// pipeline always lands in `review_required`.
    pub async fn regenerate(&self, pipeline_id: Uuid, feedback: &str) -> PipelineResult<RegenerationOutcome> {
        self.start_regeneration(pipeline_id, feedback, None).await
    }

    /// Regeneration, optionally preceded by the reviewer's request event.
    ///
    /// The move to `running` is a compare-and-set written together with the
    /// request and `regeneration_started`, so concurrent review actions on the
    /// same pipeline cannot both start or decide it.
    pub(crate) async fn start_regeneration(
        &self,
        pipeline_id: Uuid,
        feedback: &str,
        request: Option<AuditEntry<'_>>,
    ) -> PipelineResult<RegenerationOutcome> {
        let record = self.get_pipeline(pipeline_id).await?;
        let prior_status = record.status;
        if !prior_status.accepts_regeneration() {
            return Err(PipelineError::InvalidTransition {
                from: prior_status,
                to: PipelineStatus::Running,
            });
        }

        let analysis: AnalysisOutput = db::get_latest_output(&self.pool, pipeline_id, Stage::Analysis)
            .await?
            .ok_or_else(|| PipelineError::DataIntegrity {
                stage: Stage::Analysis,
                field: "content_brief".to_string(),
                detail: "no stored analysis output".to_string(),
            })?
            .decode()?;
        let brief = analysis.content_brief.with_feedback(feedback);

        let started = json!({ "feedback": feedback, "prior_status": prior_status });
        let mut events: Vec<AuditEntry<'_>> = request.into_iter().collect();
        events.push(AuditEntry::new(AuditEventType::REGENERATION_STARTED, None, &started));
        let applied = db::transition_status(
            &self.pool,
            pipeline_id,
            prior_status,
            PipelineStatus::Running,
            &events,
            self.max_wait_ms(),
        )
        .await?;
        if !applied {
            let current = self.get_pipeline(pipeline_id).await?;
            return Err(PipelineError::InvalidTransition {
                from: current.status,
                to: PipelineStatus::Running,
            });
        }

        info!(pipeline_id = %pipeline_id, prior_status = %prior_status, "Regeneration started");
        self.emit(PipelineEvent::RegenerationStarted {
            pipeline_id,
            feedback: feedback.to_string(),
        });

        let mode = RunMode::Regeneration { prior_status };
        match self.generate(mode, pipeline_id, &brief, None).await? {
            Generation::BlockedQa { quality_score, reasons } => {
                self.block_qa(pipeline_id, quality_score, reasons).await?;
                Ok(RegenerationOutcome {
                    pipeline_id,
                    status: PipelineStatus::BlockedQa,
                    quality_score: Some(quality_score),
                })
            }
            Generation::Formatted { quality_score } => {
                let status = PipelineStatus::ReviewRequired;
                db::set_quality_score(&self.pool, pipeline_id, quality_score, self.max_wait_ms()).await?;
                db::set_status(&self.pool, pipeline_id, status, self.max_wait_ms()).await?;
                self.audit(
                    pipeline_id,
                    AuditEventType::REGENERATION_COMPLETED,
                    json!({ "quality_score": quality_score }),
                )
                .await?;

                info!(pipeline_id = %pipeline_id, quality_score, "Regeneration finished");
                self.emit_finished(pipeline_id, status, Some(quality_score));
                Ok(RegenerationOutcome {
                    pipeline_id,
                    status,
                    quality_score: Some(quality_score),
                })
            }
        }
    }

    // ========================================================================
    // Shared stage plumbing
    // ========================================================================

    /// Stages 5-8 from a brief
    async fn generate(
        &self,
        mode: RunMode,
        id: Uuid,
        brief: &ContentBrief,
        cancel_token: Option<&CancellationToken>,
    ) -> PipelineResult<Generation> {
        let ctx = self.context(id);

        if let Some(token) = cancel_token {
            self.checkpoint(id, Stage::Outline, token).await?;
        }
        let outline = self
            .step(mode, id, Stage::Outline, stages::outline::run(&ctx, brief).await)
            .await?
            .into_output();

        if let Some(token) = cancel_token {
            self.checkpoint(id, Stage::Draft, token).await?;
        }
        let draft = self
            .step(mode, id, Stage::Draft, stages::draft::run(&ctx, &outline, brief).await)
            .await?
            .into_output();

        if let Some(token) = cancel_token {
            self.checkpoint(id, Stage::QualityAssurance, token).await?;
        }
        let qa = self
            .step(mode, id, Stage::QualityAssurance, stages::qa::run(&ctx, &draft).await)
            .await?;
        let qa = match qa {
            Step::Continue(output) => output,
            Step::Halt { output, reasons } => {
                let quality_score = output.quality_report.scores.seo_score;
                db::set_quality_score(&self.pool, id, quality_score, self.max_wait_ms()).await?;
                return Ok(Generation::BlockedQa { quality_score, reasons });
            }
        };
        let quality_score = qa.quality_report.scores.seo_score;
        // A regeneration keeps the previous score until stage 8 also succeeds
        if let RunMode::Initial = mode {
            db::set_quality_score(&self.pool, id, quality_score, self.max_wait_ms()).await?;
        }

        if let Some(token) = cancel_token {
            self.checkpoint(id, Stage::Formatting, token).await?;
        }
        self.step(mode, id, Stage::Formatting, stages::format::run(&ctx, &draft, &qa).await)
            .await?;

        Ok(Generation::Formatted { quality_score })
    }

    /// Persist one stage outcome and apply the failure policy of `mode`
    async fn step<T: Serialize>(
        &self,
        mode: RunMode,
        id: Uuid,
        stage: Stage,
        outcome: StageOutcome<T>,
    ) -> PipelineResult<Step<T>> {
        let (output, reasons) = match outcome {
            StageOutcome::Completed(output) => (output, None),
            StageOutcome::Blocked { output, reasons } => (output, Some(reasons)),
            StageOutcome::Failed(failure) => return Err(self.fail_stage(mode, id, stage, failure).await),
        };

        let envelope = match success_envelope(&output) {
            Ok(envelope) => envelope,
            Err(e) => {
                let failure = StageFailure::new(format!("Failed to serialize {} output: {}", stage.name(), e));
                return Err(self.fail_stage(mode, id, stage, failure).await);
            }
        };

        db::save_stage_output(&self.pool, id, stage, &envelope, self.max_wait_ms()).await?;
        db::update_stage(&self.pool, id, stage.number(), self.max_wait_ms()).await?;
        self.audit(id, &stage.completed_event(), json!({ "success": true })).await?;

        debug!(pipeline_id = %id, stage = %stage, "Stage output stored");
        self.emit(PipelineEvent::StageCompleted {
            pipeline_id: id,
            stage: stage.number(),
            name: stage.name().to_string(),
        });

        Ok(match reasons {
            None => Step::Continue(output),
            Some(reasons) => Step::Halt { output, reasons },
        })
    }

    /// Record a stage failure and build the error returned to the caller.
    ///
    /// Persistence problems while recording are logged; the stage error wins.
    async fn fail_stage(&self, mode: RunMode, id: Uuid, stage: Stage, failure: StageFailure) -> PipelineError {
        error!(pipeline_id = %id, stage = %stage, error = %failure.message, "Stage failed");

        let result = self.record_failure(mode, id, stage, &failure).await;
        if let Err(e) = result {
            error!(pipeline_id = %id, stage = %stage, error = %e, "Failed to record stage failure");
        }

        self.emit(PipelineEvent::StageFailed {
            pipeline_id: id,
            stage: stage.number(),
            message: failure.message.clone(),
        });

        PipelineError::StageExecution {
            pipeline_id: id,
            stage,
            message: failure.message,
        }
    }

    async fn record_failure(
        &self,
        mode: RunMode,
        id: Uuid,
        stage: Stage,
        failure: &StageFailure,
    ) -> PipelineResult<()> {
        let max_wait_ms = self.max_wait_ms();
        let envelope = failure_envelope(&failure.message, failure.detail.as_deref());
        db::save_stage_output(&self.pool, id, stage, &envelope, max_wait_ms).await?;
        self.audit(id, &stage.failed_event(), json!({ "error": failure.message })).await?;

        match mode {
            RunMode::Initial => {
                db::set_status(&self.pool, id, PipelineStatus::Failed, max_wait_ms).await?;
                self.audit(
                    id,
                    AuditEventType::PIPELINE_FAILED,
                    json!({ "stage": stage.number(), "error": failure.message }),
                )
                .await?;
                self.emit_finished(id, PipelineStatus::Failed, None);
            }
            RunMode::Regeneration { prior_status } => {
                db::set_status(&self.pool, id, prior_status, max_wait_ms).await?;
                self.audit(
                    id,
                    AuditEventType::REGENERATION_FAILED,
                    json!({ "stage": stage.number(), "error": failure.message }),
                )
                .await?;
                warn!(pipeline_id = %id, status = %prior_status, "Regeneration failed, prior status restored");
            }
        }
        Ok(())
    }

    /// Stop before `stage` if cancellation was requested
    async fn checkpoint(&self, id: Uuid, stage: Stage, cancel_token: &CancellationToken) -> PipelineResult<()> {
        if !cancel_token.is_cancelled() {
            self.emit(PipelineEvent::StageStarted {
                pipeline_id: id,
                stage: stage.number(),
                name: stage.name().to_string(),
            });
            return Ok(());
        }

        warn!(pipeline_id = %id, stage = %stage, "Pipeline cancelled");
        db::set_status(&self.pool, id, PipelineStatus::Failed, self.max_wait_ms()).await?;
        self.audit(id, AuditEventType::PIPELINE_CANCELLED, json!({ "stage": stage.number() }))
            .await?;
        self.emit(PipelineEvent::Cancelled {
            pipeline_id: id,
            stage: stage.number(),
        });

        Err(PipelineError::Cancelled { pipeline_id: id, stage })
    }

    async fn block_qa(&self, id: Uuid, quality_score: f64, reasons: Vec<String>) -> PipelineResult<()> {
        warn!(pipeline_id = %id, issues = ?reasons, "Pipeline blocked by quality gate");
        self.audit(
            id,
            AuditEventType::BLOCKED_QA,
            json!({ "blocking_issues": reasons, "quality_score": quality_score }),
        )
        .await?;
        self.finish_blocked(
            id,
            Stage::QualityAssurance,
            PipelineStatus::BlockedQa,
            reasons,
            Some(quality_score),
        )
        .await
    }

    async fn finish_blocked(
        &self,
        id: Uuid,
        stage: Stage,
        status: PipelineStatus,
        reasons: Vec<String>,
        quality_score: Option<f64>,
    ) -> PipelineResult<()> {
        db::set_status(&self.pool, id, status, self.max_wait_ms()).await?;
        self.emit(PipelineEvent::Blocked {
            pipeline_id: id,
            stage: stage.number(),
            status,
            reasons,
        });
        self.emit_finished(id, status, quality_score);
        Ok(())
    }

    async fn audit(&self, id: Uuid, event_type: &str, metadata: Value) -> PipelineResult<()> {
        db::log_event(&self.pool, id, event_type, None, Some(&metadata), self.max_wait_ms()).await?;
        Ok(())
    }

    fn emit_finished(&self, id: Uuid, status: PipelineStatus, quality_score: Option<f64>) {
        self.emit(PipelineEvent::PipelineFinished {
            pipeline_id: id,
            status,
            quality_score,
            timestamp: Utc::now().timestamp(),
        });
    }

    /// Lossy send; a slow or absent listener never stalls a run
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!(error = %e, "Pipeline event dropped");
            }
        }
    }
}
