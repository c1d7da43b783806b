//! Plan-gated watermark injection.
//!
//! The gate resolves a user's plan and decides whether the generated video
//! carries the branding overlay. Anything short of a confirmed paid plan
//! resolves to "watermark": lookup errors, timeouts, panics inside the store,
//! missing usage records and requests without a user id.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reelgen_models::{tracks, Element, ImageElement, PlanClass, RenderTemplate};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::WatermarkSettings;
use crate::metrics;
use crate::user_plan::PlanStore;

/// Element name of the injected overlay.
pub const WATERMARK_ELEMENT_NAME: &str = "Watermark";

/// Why the gate decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkReason {
    FreeTierPlan,
    PaidPlan,
    MissingUsageRecord,
    NoUserId,
    LookupFailed,
    LookupPanicked,
    LookupTimedOut,
}

impl WatermarkReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkReason::FreeTierPlan => "free_tier_plan",
            WatermarkReason::PaidPlan => "paid_plan",
            WatermarkReason::MissingUsageRecord => "missing_usage_record",
            WatermarkReason::NoUserId => "no_user_id",
            WatermarkReason::LookupFailed => "lookup_failed",
            WatermarkReason::LookupPanicked => "lookup_panicked",
            WatermarkReason::LookupTimedOut => "lookup_timed_out",
        }
    }

    /// The plan could not be read and the gate fell back to watermarking.
    pub fn is_lookup_fallback(&self) -> bool {
        matches!(
            self,
            WatermarkReason::LookupFailed
                | WatermarkReason::LookupPanicked
                | WatermarkReason::LookupTimedOut
        )
    }
}

impl std::fmt::Display for WatermarkReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkDecision {
    pub required: bool,
    pub reason: WatermarkReason,
}

impl WatermarkDecision {
    fn watermark(reason: WatermarkReason) -> Self {
        Self {
            required: true,
            reason,
        }
    }

    fn clean(reason: WatermarkReason) -> Self {
        Self {
            required: false,
            reason,
        }
    }
}

/// Decides and applies the watermark for one request at a time.
///
/// Plans are looked up on every call and never cached.
pub struct WatermarkGate {
    store: Arc<dyn PlanStore>,
    settings: WatermarkSettings,
    lookup_timeout: Duration,
}

impl WatermarkGate {
    pub fn new(store: Arc<dyn PlanStore>, settings: WatermarkSettings) -> Self {
        Self {
            store,
            settings,
            lookup_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &WatermarkSettings {
        &self.settings
    }

    /// Resolve the decision for `user_id` and record it.
    pub async fn decide(&self, user_id: Option<&str>) -> WatermarkDecision {
        let decision = self.resolve(user_id).await;
        metrics::record_watermark_decision(decision.required, decision.reason.as_str());
        debug!(
            required = decision.required,
            reason = %decision.reason,
            "Watermark decision"
        );
        decision
    }

    pub async fn should_watermark(&self, user_id: Option<&str>) -> bool {
        self.decide(user_id).await.required
    }

    async fn resolve(&self, user_id: Option<&str>) -> WatermarkDecision {
        let Some(user_id) = user_id.map(str::trim).filter(|id| !id.is_empty()) else {
            warn!("No user id on request, applying watermark");
            return WatermarkDecision::watermark(WatermarkReason::NoUserId);
        };

        // The store call is created inside the guarded future so a panic while
        // building it is caught too.
        let lookup = AssertUnwindSafe(async { self.store.get_current_plan(user_id).await })
            .catch_unwind();

        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Err(_) => {
                error!(
                    user_id = %user_id,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Plan lookup timed out, applying watermark"
                );
                WatermarkDecision::watermark(WatermarkReason::LookupTimedOut)
            }
            Ok(Err(_)) => {
                error!(user_id = %user_id, "Plan lookup panicked, applying watermark");
                WatermarkDecision::watermark(WatermarkReason::LookupPanicked)
            }
            Ok(Ok(Err(e))) => {
                error!(user_id = %user_id, error = %e, "Plan lookup failed, applying watermark");
                WatermarkDecision::watermark(WatermarkReason::LookupFailed)
            }
            Ok(Ok(Ok(None))) => {
                warn!(user_id = %user_id, "No usage record, applying watermark");
                WatermarkDecision::watermark(WatermarkReason::MissingUsageRecord)
            }
            Ok(Ok(Ok(Some(record)))) => match record.class() {
                PlanClass::FreeTier => {
                    info!(user_id = %user_id, plan_id = %record.plan_id, "Free tier plan, applying watermark");
                    WatermarkDecision::watermark(WatermarkReason::FreeTierPlan)
                }
                PlanClass::Paid => WatermarkDecision::clean(WatermarkReason::PaidPlan),
            },
        }
    }

    /// Overlay element for a `width`x`height` frame.
    ///
    /// Carries an explicit `duration: null` so it spans the whole composition.
    pub fn overlay_element(&self, width: u32, height: u32) -> ImageElement {
        let padding = self.settings.padding_px;
        let extra: Map<String, Value> = [
            ("x", json!(format!("{} px", width.saturating_sub(padding)))),
            ("y", json!(format!("{} px", height.saturating_sub(padding)))),
            ("width", json!(format!("{} px", self.settings.width_px))),
            ("x_anchor", json!("100%")),
            ("y_anchor", json!("100%")),
            ("opacity", json!(format!("{}%", (self.settings.opacity * 100.0).round()))),
            ("time", json!(0)),
            ("duration", Value::Null),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        ImageElement {
            track: Some(tracks::WATERMARK),
            name: Some(WATERMARK_ELEMENT_NAME.to_string()),
            source: Some(self.settings.image_url.clone()),
            extra,
        }
    }

    /// Append the overlay to every composition that lacks one.
    ///
    /// Returns the number of overlays added.
    pub fn inject(&self, template: &mut RenderTemplate) -> usize {
        if template.elements.is_empty() {
            warn!("Template has no compositions, skipping watermark");
            return 0;
        }

        let overlay = self.overlay_element(template.width, template.height);
        let mut injected = 0;
        for composition in template.elements.iter_mut() {
            if composition.elements.iter().any(is_watermark) {
                continue;
            }
            composition.elements.push(Element::Image(overlay.clone()));
            injected += 1;
        }
        injected
    }

    /// Decide for `user_id` and inject when required.
    ///
    /// Returns whether the template now carries the watermark.
    pub async fn inject_if_needed(&self, user_id: Option<&str>, template: &mut RenderTemplate) -> bool {
        self.apply(user_id, template).await.0
    }

    /// Like [`inject_if_needed`](Self::inject_if_needed), also returning the decision.
    pub async fn apply(
        &self,
        user_id: Option<&str>,
        template: &mut RenderTemplate,
    ) -> (bool, WatermarkDecision) {
        let decision = self.decide(user_id).await;
        if !decision.required {
            return (false, decision);
        }
        let injected = self.inject(template);
        (injected > 0 || template.iter_elements().any(is_watermark), decision)
    }
}

fn is_watermark(element: &Element) -> bool {
    matches!(
        element,
        Element::Image(image)
            if image.track == Some(tracks::WATERMARK)
                && image.name.as_deref() == Some(WATERMARK_ELEMENT_NAME)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_plan::{MockPlanStore, PlanStoreError};
    use reelgen_models::{Composition, PlanRecord, VideoElement};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn gate_with(store: MockPlanStore) -> WatermarkGate {
        WatermarkGate::new(Arc::new(store), WatermarkSettings::default())
    }

    fn store_returning(plan: Option<&'static str>) -> MockPlanStore {
        let mut store = MockPlanStore::new();
        store
            .expect_get_current_plan()
            .returning(move |_| Ok(plan.map(PlanRecord::new)));
        store
    }

    /// Run `should_watermark` and count ERROR events emitted meanwhile.
    fn decide_counting_errors(gate: &WatermarkGate, user: Option<&str>) -> (bool, usize) {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        let required = tracing::subscriber::with_default(subscriber, || {
            tokio_test::block_on(gate.should_watermark(user))
        });
        (required, errors.load(Ordering::SeqCst))
    }

    fn two_scenes() -> RenderTemplate {
        let video = || {
            Element::Video(VideoElement {
                source: Some("a.mp4".to_string()),
                ..Default::default()
            })
        };
        RenderTemplate::portrait("mp4")
            .with_composition(Composition::new(vec![video()]))
            .with_composition(Composition::new(vec![video()]))
    }

    #[test]
    fn test_lookup_error_watermarks_and_logs() {
        let mut store = MockPlanStore::new();
        store
            .expect_get_current_plan()
            .returning(|_| Err(PlanStoreError::Unavailable("connection refused".to_string())));

        let (required, errors) = decide_counting_errors(&gate_with(store), Some("uid-1"));
        assert!(required);
        assert!(errors >= 1);
    }

    #[test]
    fn test_lookup_panic_watermarks_and_logs() {
        struct PanickingStore;

        #[async_trait::async_trait]
        impl PlanStore for PanickingStore {
            async fn get_current_plan(&self, _: &str) -> Result<Option<PlanRecord>, PlanStoreError> {
                panic!("store exploded")
            }
        }

        let gate = WatermarkGate::new(Arc::new(PanickingStore), WatermarkSettings::default());
        let (required, errors) = decide_counting_errors(&gate, Some("uid-1"));
        assert!(required);
        assert!(errors >= 1);
    }

    #[tokio::test]
    async fn test_free_and_paid_plans() {
        assert!(gate_with(store_returning(Some("free_monthly"))).should_watermark(Some("u")).await);
        assert!(gate_with(store_returning(Some(""))).should_watermark(Some("u")).await);
        assert!(!gate_with(store_returning(Some("pro"))).should_watermark(Some("u")).await);
    }

    #[tokio::test]
    async fn test_missing_record_and_user_watermark() {
        let gate = gate_with(store_returning(None));
        let decision = gate.decide(Some("ghost")).await;
        assert_eq!(decision, WatermarkDecision::watermark(WatermarkReason::MissingUsageRecord));

        let mut store = MockPlanStore::new();
        store.expect_get_current_plan().never();
        let decision = gate_with(store).decide(Some("  ")).await;
        assert_eq!(decision.reason, WatermarkReason::NoUserId);
        assert!(decision.required);
    }

    #[tokio::test]
    async fn test_inject_every_composition_top_track() {
        let gate = gate_with(MockPlanStore::new());
        let mut template = two_scenes();
        assert_eq!(gate.inject(&mut template), 2);

        for composition in &template.elements {
            let Some(Element::Image(image)) = composition.elements.last() else {
                panic!("expected watermark last");
            };
            assert_eq!(image.track, Some(tracks::WATERMARK));
            assert_eq!(image.extra.get("time"), Some(&json!(0)));
            assert_eq!(image.extra.get("duration"), Some(&Value::Null));
            assert_eq!(image.extra.get("x"), Some(&json!("1040 px")));
            assert_eq!(image.extra.get("y"), Some(&json!("1880 px")));
            assert_eq!(image.extra.get("x_anchor"), Some(&json!("100%")));
            assert_eq!(image.extra.get("opacity"), Some(&json!("60%")));
        }

        // Already watermarked compositions are left alone.
        assert_eq!(gate.inject(&mut template), 0);
    }

    #[tokio::test]
    async fn test_no_compositions_is_not_an_error() {
        let gate = gate_with(MockPlanStore::new());
        let mut template = RenderTemplate::portrait("mp4");
        assert_eq!(gate.inject(&mut template), 0);
        assert!(template.elements.is_empty());
    }

    #[tokio::test]
    async fn test_inject_if_needed() {
        let mut template = two_scenes();
        let paid = gate_with(store_returning(Some("studio")));
        assert!(!paid.inject_if_needed(Some("u"), &mut template).await);
        assert_eq!(template, two_scenes());

        let free = gate_with(store_returning(Some("trial")));
        assert!(free.inject_if_needed(Some("u"), &mut template).await);
        assert_eq!(template.iter_elements().filter(|e| is_watermark(e)).count(), 2);
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out() {
        struct SlowStore;

        #[async_trait::async_trait]
        impl PlanStore for SlowStore {
            async fn get_current_plan(&self, _: &str) -> Result<Option<PlanRecord>, PlanStoreError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Some(PlanRecord::new("pro")))
            }
        }

        let gate = WatermarkGate::new(Arc::new(SlowStore), WatermarkSettings::default())
            .with_lookup_timeout(Duration::from_millis(20));
        let decision = gate.decide(Some("u")).await;
        assert_eq!(decision.reason, WatermarkReason::LookupTimedOut);
        assert!(decision.required);
    }
}
