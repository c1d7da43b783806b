//! Bounded repair of scenes whose narration overruns their clip.
//!
//! Each round sends the current violations to the planner, merges the revised
//! versions of the violating scenes back into the plan, and re-validates.
//! The loop stops on the first clean pass or after [`MAX_REPAIR_ATTEMPTS`]
//! rounds. Running out of rounds is reported, never fatal.

use std::sync::Arc;

use reelgen_models::{DurationViolation, ScenePlan, ValidationConfig};
use tracing::{debug, info, warn};

use crate::duration::validate_scene_durations;
use crate::logging::PipelineLogger;
use crate::metrics;
use crate::planner::ScenePlanner;

/// Repair rounds per request.
pub const MAX_REPAIR_ATTEMPTS: u32 = 3;

/// Result of a repair run.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// Best plan after the last round.
    pub plan: ScenePlan,
    /// Rounds started, including rounds whose planner call failed.
    pub attempts: u32,
    /// Planner calls that failed.
    pub failed_calls: u32,
    /// Violations still present in `plan`.
    pub remaining_violations: Vec<DurationViolation>,
}

impl RepairOutcome {
    pub fn is_clean(&self) -> bool {
        self.remaining_violations.is_empty()
    }
}

/// Drop trim offsets from assets without a usable trim duration.
///
/// Such scenes fall back to the full selected clip. Returns how many assets
/// were changed.
pub fn simplify_video_assets(plan: &mut ScenePlan) -> usize {
    let mut simplified = 0;
    for asset in plan.scenes.iter_mut().filter_map(|s| s.video_asset.as_mut()) {
        if asset.has_timing() {
            continue;
        }
        if asset.trim_start.is_some() || asset.trim_duration.is_some() {
            asset.trim_start = None;
            asset.trim_duration = None;
            simplified += 1;
        }
    }
    simplified
}

/// Replace violating scenes in `plan` with their counterparts in `candidate`.
///
/// Only indices present in both plans are taken. Scenes that were not
/// violating are never touched, whatever the candidate says about them.
fn merge_repaired_scenes(
    plan: &mut ScenePlan,
    candidate: ScenePlan,
    violations: &[DurationViolation],
) -> usize {
    if candidate.len() != plan.len() {
        warn!(
            expected = plan.len(),
            received = candidate.len(),
            "Repair changed the scene count, keeping the original layout"
        );
    }

    let mut revised: Vec<_> = candidate.scenes.into_iter().map(Some).collect();
    let mut replaced = 0;

    for violation in violations {
        let index = violation.scene_index;
        let Some(new_scene) = revised.get_mut(index).and_then(Option::take) else {
            warn!(scene_index = index, "Repair candidate has no scene at this index");
            continue;
        };
        if let Some(slot) = plan.scenes.get_mut(index) {
            *slot = new_scene;
            slot.scene_number = index as u32 + 1;
            replaced += 1;
        }
    }

    replaced
}

/// Drives the planner through bounded repair rounds.
pub struct RepairLoop {
    planner: Arc<dyn ScenePlanner>,
    max_attempts: u32,
}

impl RepairLoop {
    pub fn new(planner: Arc<dyn ScenePlanner>) -> Self {
        Self {
            planner,
            max_attempts: MAX_REPAIR_ATTEMPTS,
        }
    }

    pub async fn repair(
        &self,
        plan: ScenePlan,
        config: &ValidationConfig,
        logger: &PipelineLogger,
    ) -> RepairOutcome {
        let videos = &config.selected_videos;
        let mut plan = plan;
        let mut violations = validate_scene_durations(&plan, videos);
        metrics::record_duration_violations(violations.len());

        let mut attempts = 0;
        let mut failed_calls = 0;

        while !violations.is_empty() && attempts < self.max_attempts {
            attempts += 1;
            info!(
                request_id = %logger.request_id(),
                attempt = attempts,
                violations = violations.len(),
                "Requesting scene repair"
            );

            match self.planner.repair_scenes(&plan, &violations, config).await {
                Ok(mut candidate) => {
                    simplify_video_assets(&mut candidate);
                    let replaced = merge_repaired_scenes(&mut plan, candidate, &violations);
                    debug!(attempt = attempts, replaced, "Merged repaired scenes");
                    metrics::record_repair_attempt("completed");
                }
                Err(e) => {
                    failed_calls += 1;
                    logger.log_warning(&format!("repair attempt {} failed: {}", attempts, e));
                    metrics::record_repair_attempt("failed");
                }
            }

            violations = validate_scene_durations(&plan, videos);
        }

        if violations.is_empty() {
            if attempts > 0 {
                logger.log_progress(&format!("all scenes fit after {} repair round(s)", attempts));
            }
        } else {
            for v in &violations {
                warn!(
                    request_id = %logger.request_id(),
                    scene_index = v.scene_index,
                    overage_seconds = v.overage_seconds,
                    "Scene still overruns its clip after repair"
                );
            }
            metrics::record_repair_unresolved(violations.len());
        }

        RepairOutcome {
            plan,
            attempts,
            failed_calls,
            remaining_violations: violations,
        }
    }
}
