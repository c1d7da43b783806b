//! The template pipeline.
//!
//! Phases run in a fixed order, each taking the previous phase's output:
//!
//! 1. validate input
//! 2. plan scenes
//! 3. validate durations and repair
//! 4. generate template and parse it
//! 5. structural normalization
//! 6. captions
//! 7. voice reconciliation
//! 8. watermark
//!
//! Watermarking runs after normalization so the overlay is never rewritten by
//! the element rules.

use std::sync::Arc;
use std::time::Instant;

use reelgen_models::{DurationViolation, RenderTemplate, ScenePlan, ValidationConfig};
use serde_json::Value;
use tracing::Instrument;

use crate::captions::apply_captions;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::PipelineLogger;
use crate::metrics;
use crate::normalize::normalize_template;
use crate::planner::ScenePlanner;
use crate::repair::{simplify_video_assets, RepairLoop};
use crate::user_plan::PlanStore;
use crate::voice::reconcile_voices;
use crate::watermark::{WatermarkGate, WatermarkReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    ValidateInput,
    PlanScenes,
    RepairDurations,
    GenerateTemplate,
    Normalize,
    Captions,
    Voices,
    Watermark,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::ValidateInput => "validate_input",
            PipelinePhase::PlanScenes => "plan_scenes",
            PipelinePhase::RepairDurations => "repair_durations",
            PipelinePhase::GenerateTemplate => "generate_template",
            PipelinePhase::Normalize => "normalize",
            PipelinePhase::Captions => "captions",
            PipelinePhase::Voices => "voices",
            PipelinePhase::Watermark => "watermark",
        }
    }
}

/// Degraded-but-delivered conditions reported alongside the template.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    /// Scenes still too long for their clip after the last repair round.
    UnresolvedDurationViolations(Vec<DurationViolation>),
    /// Scene numbers were rewritten to match their position.
    ScenesRenumbered(usize),
    /// The plan could not be read, so the watermark was applied.
    WatermarkLookupFallback(WatermarkReason),
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::UnresolvedDurationViolations(v) => {
                write!(f, "{} scene(s) still overrun their clip", v.len())
            }
            PipelineWarning::ScenesRenumbered(n) => write!(f, "{} scene(s) renumbered", n),
            PipelineWarning::WatermarkLookupFallback(reason) => {
                write!(f, "plan lookup fell back to watermark ({})", reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub template: RenderTemplate,
    /// Final scene plan. `None` when the template came from outside.
    pub plan: Option<ScenePlan>,
    pub warnings: Vec<PipelineWarning>,
    pub watermarked: bool,
    pub repair_attempts: u32,
}

/// Runs generation requests through the pipeline.
///
/// Holds no per-request state; concurrent runs are independent.
pub struct TemplateOrchestrator {
    planner: Arc<dyn ScenePlanner>,
    gate: WatermarkGate,
    config: PipelineConfig,
}

impl TemplateOrchestrator {
    pub fn new(planner: Arc<dyn ScenePlanner>, store: Arc<dyn PlanStore>, config: PipelineConfig) -> Self {
        let gate = WatermarkGate::new(store, config.watermark.clone())
            .with_lookup_timeout(config.plan_lookup_timeout);
        Self {
            planner,
            gate,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Full pipeline: plan, repair, generate and finalize.
    pub async fn run(&self, request: &ValidationConfig) -> PipelineResult<PipelineOutput> {
        let logger = PipelineLogger::new();
        let span = logger.create_span();
        let started = Instant::now();

        let result = self.run_phases(request, &logger).instrument(span).await;
        record_run(&result, started, &logger);
        result
    }

    /// Finalize an externally produced template (phases 4 to 8).
    pub async fn finalize_template(
        &self,
        raw: Value,
        request: &ValidationConfig,
    ) -> PipelineResult<PipelineOutput> {
        let logger = PipelineLogger::new();
        let span = logger.create_span();
        let started = Instant::now();

        let result = async {
            let (template, watermarked, warnings) = self.finish(raw, request, &logger).await?;
            Ok::<_, PipelineError>(PipelineOutput {
                template,
                plan: None,
                warnings,
                watermarked,
                repair_attempts: 0,
            })
        }
        .instrument(span)
        .await;
        record_run(&result, started, &logger);
        result
    }

    async fn run_phases(
        &self,
        request: &ValidationConfig,
        logger: &PipelineLogger,
    ) -> PipelineResult<PipelineOutput> {
        let log = logger.for_phase(PipelinePhase::ValidateInput.as_str());
        request.validate().map_err(PipelineError::invalid_input)?;
        log.log_completion("request accepted");

        let log = logger.for_phase(PipelinePhase::PlanScenes.as_str());
        log.log_start("planning scenes");
        let mut plan = self.planner.plan_scenes(request).await.map_err(|e| {
            log.log_error(&e.to_string());
            PipelineError::generation(format!("Scene planning failed: {}", e))
        })?;

        let mut warnings = Vec::new();
        let renumbered = plan.ensure_sequential()?;
        if renumbered > 0 {
            log.log_warning(&format!("renumbered {} scene(s)", renumbered));
            warnings.push(PipelineWarning::ScenesRenumbered(renumbered));
        }
        let simplified = simplify_video_assets(&mut plan);
        log.log_completion(&format!(
            "{} scene(s), {} asset(s) without timing",
            plan.len(),
            simplified
        ));

        let log = logger.for_phase(PipelinePhase::RepairDurations.as_str());
        let outcome = RepairLoop::new(self.planner.clone())
            .repair(plan, request, &log)
            .await;
        if !outcome.is_clean() {
            warnings.push(PipelineWarning::UnresolvedDurationViolations(
                outcome.remaining_violations.clone(),
            ));
        }
        let plan = outcome.plan;

        let log = logger.for_phase(PipelinePhase::GenerateTemplate.as_str());
        log.log_start("generating template");
        let raw = self.planner.generate_template(&plan, request).await.map_err(|e| {
            log.log_error(&e.to_string());
            PipelineError::generation(format!("Template generation failed: {}", e))
        })?;

        let (template, watermarked, finish_warnings) = self.finish(raw, request, logger).await?;
        warnings.extend(finish_warnings);

        Ok(PipelineOutput {
            template,
            plan: Some(plan),
            warnings,
            watermarked,
            repair_attempts: outcome.attempts,
        })
    }

    /// Parse and run the deterministic phases plus the watermark gate.
    async fn finish(
        &self,
        raw: Value,
        request: &ValidationConfig,
        logger: &PipelineLogger,
    ) -> PipelineResult<(RenderTemplate, bool, Vec<PipelineWarning>)> {
        let log = logger.for_phase(PipelinePhase::Normalize.as_str());
        let template = RenderTemplate::from_value(raw)
            .and_then(normalize_template)
            .map_err(|e| {
                log.log_error(&e.to_string());
                PipelineError::from(e)
            })?;
        log.log_completion(&format!("{} composition(s)", template.elements.len()));

        let captions = request.effective_captions();
        let template = apply_captions(template, captions);
        logger
            .for_phase(PipelinePhase::Captions.as_str())
            .log_completion(if captions.enabled { "captions styled" } else { "captions removed" });

        let mut template = reconcile_voices(
            template,
            request.target_voice(),
            &self.config.default_tts_model,
        );
        if request.target_voice().is_some() {
            logger
                .for_phase(PipelinePhase::Voices.as_str())
                .log_completion("narration voices reconciled");
        }

        let log = logger.for_phase(PipelinePhase::Watermark.as_str());
        let (watermarked, decision) = self.gate.apply(request.owner(), &mut template).await;
        let mut warnings = Vec::new();
        if decision.reason.is_lookup_fallback() {
            log.log_warning(&format!("plan lookup fell back ({})", decision.reason));
            warnings.push(PipelineWarning::WatermarkLookupFallback(decision.reason));
        }
        log.log_completion(if watermarked { "watermark applied" } else { "no watermark" });

        Ok((template, watermarked, warnings))
    }
}

fn record_run(result: &PipelineResult<PipelineOutput>, started: Instant, logger: &PipelineLogger) {
    let elapsed = started.elapsed().as_secs_f64();
    match result {
        Ok(output) => {
            logger.log_completion(&format!(
                "template ready, {} warning(s), {:.2}s",
                output.warnings.len(),
                elapsed
            ));
            metrics::record_pipeline_run("success", elapsed);
        }
        Err(e) => {
            logger.log_error(&e.to_string());
            metrics::record_pipeline_run(e.kind(), elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{MockScenePlanner, PlannerError};
    use crate::user_plan::MockPlanStore;
    use reelgen_models::{PlanRecord, Scene, TemplateError};
    use serde_json::json;

    fn paid_store() -> Arc<MockPlanStore> {
        let mut store = MockPlanStore::new();
        store
            .expect_get_current_plan()
            .returning(|_| Ok(Some(PlanRecord::new("pro"))));
        Arc::new(store)
    }

    fn template_json() -> Value {
        json!({
            "output_format": "mp4",
            "width": 1080,
            "height": 1920,
            "elements": [{
                "type": "composition",
                "elements": [
                    {"type": "video", "source": "a.mp4"},
                    {"type": "audio", "text": "Hello"}
                ]
            }]
        })
    }

    #[tokio::test]
    async fn test_planning_failure_is_fatal() {
        let mut planner = MockScenePlanner::new();
        planner
            .expect_plan_scenes()
            .returning(|_| Err(PlannerError::request("quota exceeded")));
        planner.expect_generate_template().never();

        let orchestrator =
            TemplateOrchestrator::new(Arc::new(planner), paid_store(), PipelineConfig::default());
        let err = orchestrator
            .run(&ValidationConfig::new("script").with_user("u"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }

    #[tokio::test]
    async fn test_empty_plan_is_structural() {
        let mut planner = MockScenePlanner::new();
        planner
            .expect_plan_scenes()
            .returning(|_| Ok(ScenePlan::default()));

        let orchestrator =
            TemplateOrchestrator::new(Arc::new(planner), paid_store(), PipelineConfig::default());
        let err = orchestrator.run(&ValidationConfig::new("script")).await.unwrap_err();
        assert!(err.is_structural());
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_planning() {
        let mut planner = MockScenePlanner::new();
        planner.expect_plan_scenes().never();

        let orchestrator =
            TemplateOrchestrator::new(Arc::new(planner), paid_store(), PipelineConfig::default());
        let err = orchestrator.run(&ValidationConfig::new("   ")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_renumbered_plan_reported() {
        let mut planner = MockScenePlanner::new();
        planner
            .expect_plan_scenes()
            .returning(|_| Ok(ScenePlan::new(vec![Scene::new(3, "one"), Scene::new(4, "two")])));
        planner
            .expect_generate_template()
            .returning(|_, _| Ok(template_json()));

        let orchestrator =
            TemplateOrchestrator::new(Arc::new(planner), paid_store(), PipelineConfig::default());
        let output = orchestrator
            .run(&ValidationConfig::new("script").with_user("u"))
            .await
            .unwrap();

        assert_eq!(output.warnings, vec![PipelineWarning::ScenesRenumbered(2)]);
        let numbers: Vec<u32> = output
            .plan
            .unwrap()
            .scenes
            .iter()
            .map(|s| s.scene_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(!output.watermarked);
    }

    #[tokio::test]
    async fn test_finalize_rejects_landscape() {
        let orchestrator = TemplateOrchestrator::new(
            Arc::new(MockScenePlanner::new()),
            paid_store(),
            PipelineConfig::default(),
        );
        let mut raw = template_json();
        raw["width"] = json!(1920);
        raw["height"] = json!(1080);

        let err = orchestrator
            .finalize_template(raw, &ValidationConfig::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Structural(TemplateError::InvalidDimensions { .. })
        ));
    }
}
