//! Keeps a quote's total in step with its inputs.
//!
//! Dependency order per pass: effective dimensions (carton over freehand) →
//! weights → packaging ∥ shipping → insurance → total. Components whose
//! inputs did not move are carried over from the previous snapshot unless
//! they were unresolved or failed, in which case they are retried.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{ChangeSet, PriceOutcome, PricingSnapshot, QuoteInputs};
use crate::engine::PricingEngine;

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotUpdate {
    pub snapshot: PricingSnapshot,
    pub changes: ChangeSet,
    /// False when the total moved by no more than the epsilon; callers skip
    /// the downstream write in that case.
    pub total_changed: bool,
}

pub struct QuoteTotalAggregator {
    engine: Arc<PricingEngine>,
    epsilon: f64,
    last_inputs: Option<QuoteInputs>,
    last: Option<PricingSnapshot>,
}

impl QuoteTotalAggregator {
    pub fn new(engine: Arc<PricingEngine>, epsilon: f64) -> Self {
        Self {
            engine,
            epsilon,
            last_inputs: None,
            last: None,
        }
    }

    pub fn last(&self) -> Option<&PricingSnapshot> {
        self.last.as_ref()
    }

    /// Diffs `inputs` against the previous call and recomputes what moved.
    pub async fn apply(&mut self, inputs: QuoteInputs) -> SnapshotUpdate {
        let changes = match self.last_inputs.as_ref() {
            Some(previous) => ChangeSet::between(previous, &inputs),
            None => ChangeSet::all(),
        };
        let update = self.recompute(&inputs, changes).await;
        self.last_inputs = Some(inputs);
        update
    }

    /// Recomputes against an explicit change-set.
    pub async fn recompute(&mut self, inputs: &QuoteInputs, changes: ChangeSet) -> SnapshotUpdate {
        let engine = Arc::clone(&self.engine);
        let previous = self.last.clone();

        let dimensions = inputs.effective_dimensions();
        let (volumetric, billable) = engine.weights(dimensions.as_ref(), inputs.actual_weight_kg);

        let carried = |changed: bool, pick: fn(&PricingSnapshot) -> &PriceOutcome| {
            if changed {
                return None;
            }
            previous
                .as_ref()
                .map(pick)
                .filter(|outcome| !outcome.needs_attention())
                .cloned()
        };
        let keep_packaging = carried(changes.affects_packaging(), |s| &s.packaging);
        let keep_shipping = carried(changes.affects_shipping(), |s| &s.shipping);
        let keep_insurance = carried(changes.affects_insurance(), |s| &s.insurance);

        let packaging = async {
            match keep_packaging {
                Some(outcome) => outcome,
                None => engine.packaging_for(inputs).await,
            }
        };
        let shipping = async {
            match keep_shipping {
                Some(outcome) => outcome,
                None => engine.shipping_for(inputs, billable).await,
            }
        };
        let (packaging, shipping) = tokio::join!(packaging, shipping);

        let insurance = keep_insurance.unwrap_or_else(|| engine.insurance_for(inputs));

        let snapshot = PricingSnapshot::compose(volumetric, billable, shipping, packaging, insurance);
        let total_changed = previous
            .as_ref()
            .map(|prev| (prev.total - snapshot.total).abs() > self.epsilon)
            .unwrap_or(true);

        if total_changed {
            info!(
                total = snapshot.total,
                shipping = %snapshot.shipping,
                packaging = %snapshot.packaging,
                insurance = %snapshot.insurance,
                "quote total changed"
            );
        } else {
            debug!(total = snapshot.total, "quote total unchanged");
        }

        self.last = Some(snapshot.clone());
        SnapshotUpdate {
            snapshot,
            changes,
            total_changed,
        }
    }
}
