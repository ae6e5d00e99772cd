use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{FoodItem, ImageInput, NutritionReport, QuantityWarning};
use crate::services::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ImageCaptured,
    Identifying,
    ItemsReady,
    EstimatingQuantities,
    ItemsWithQuantities,
    Aggregating,
    ReportReady,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::ImageCaptured => "image captured",
            Stage::Identifying => "identifying",
            Stage::ItemsReady => "items ready",
            Stage::EstimatingQuantities => "estimating quantities",
            Stage::ItemsWithQuantities => "items with quantities",
            Stage::Aggregating => "aggregating",
            Stage::ReportReady => "report ready",
        };
        write!(f, "{}", s)
    }
}

/// Result of finishing a stage: applied to the session, or dropped because
/// the session moved on while the call was in flight.
#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    Applied(T),
    Discarded,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateTarget {
    /// Every named item whose quantity is still blank.
    Missing,
    Item(usize),
}

#[derive(Debug, Clone)]
pub struct IdentifyTicket {
    generation: u64,
    pub image: ImageInput,
}

#[derive(Debug, Clone)]
pub struct EstimateTicket {
    generation: u64,
    /// (index, name) pairs to estimate.
    pub targets: Vec<(usize, String)>,
}

impl EstimateTicket {
    pub fn names(&self) -> Vec<String> {
        self.targets.iter().map(|(_, name)| name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct AggregateTicket {
    generation: u64,
    revision: u64,
    pub items: Vec<FoodItem>,
}

/// Serializable view of a session for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub stage: Stage,
    pub has_image: bool,
    pub items: Vec<FoodItem>,
    pub report: Option<NutritionReport>,
    pub warnings: Vec<QuantityWarning>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Working state of one user's analysis.
///
/// Every stage is split into `begin_*` (validates the transition and hands out
/// a ticket), the gateway call, and `finish_*` (applies the result). Capturing
/// a new image bumps the generation and editing items bumps the revision, so
/// finishing with an older ticket discards the result instead of applying it.
#[derive(Debug, Clone)]
pub struct PipelineSession {
    stage: Stage,
    image: Option<ImageInput>,
    items: Vec<FoodItem>,
    report: Option<NutritionReport>,
    warnings: Vec<QuantityWarning>,
    last_error: Option<String>,
    generation: u64,
    revision: u64,
    estimates_in_flight: usize,
    updated_at: DateTime<Utc>,
}

impl Default for PipelineSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineSession {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            image: None,
            items: Vec::new(),
            report: None,
            warnings: Vec::new(),
            last_error: None,
            generation: 0,
            revision: 0,
            estimates_in_flight: 0,
            updated_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn items(&self) -> &[FoodItem] {
        &self.items
    }

    #[cfg(test)]
    pub fn report(&self) -> Option<&NutritionReport> {
        self.report.as_ref()
    }

    pub fn warnings(&self) -> &[QuantityWarning] {
        &self.warnings
    }

    #[cfg(test)]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            has_image: self.image.is_some(),
            items: self.items.clone(),
            report: self.report.clone(),
            warnings: self.warnings.clone(),
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }

    fn transition(&mut self, stage: Stage) {
        if self.stage != stage {
            log::debug!("🔀 Session stage: {} -> {}", self.stage, stage);
        }
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    /// Starts over with a new image, superseding anything in flight.
    pub fn capture_image(&mut self, image: ImageInput) {
        self.generation += 1;
        self.image = Some(image);
        self.items.clear();
        self.report = None;
        self.warnings.clear();
        self.last_error = None;
        self.estimates_in_flight = 0;
        self.transition(Stage::ImageCaptured);
    }

    pub fn begin_identify(&mut self) -> Result<IdentifyTicket, PipelineError> {
        let image = self
            .image
            .clone()
            .ok_or_else(|| PipelineError::Input("no image has been captured".to_string()))?;

        self.generation += 1;
        self.estimates_in_flight = 0;
        self.last_error = None;
        self.transition(Stage::Identifying);

        Ok(IdentifyTicket {
            generation: self.generation,
            image,
        })
    }

    pub fn finish_identify(
        &mut self,
        ticket: IdentifyTicket,
        result: Result<Vec<String>, PipelineError>,
    ) -> Result<Outcome<()>, PipelineError> {
        if ticket.generation != self.generation {
            log::warn!("🗑️ Discarding stale identification result");
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(names) => {
                self.items = names.into_iter().map(FoodItem::unestimated).collect();
                self.report = None;
                self.warnings.clear();
                self.revision += 1;
                self.transition(Stage::ItemsReady);
                Ok(Outcome::Applied(()))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.transition(Stage::ImageCaptured);
                Err(e)
            }
        }
    }

    pub fn begin_estimate(&mut self, target: EstimateTarget) -> Result<EstimateTicket, PipelineError> {
        match self.stage {
            Stage::ItemsReady | Stage::EstimatingQuantities | Stage::ItemsWithQuantities | Stage::ReportReady => {}
            stage => {
                return Err(PipelineError::Input(format!(
                    "cannot estimate quantities while {}",
                    stage
                )))
            }
        }

        let targets: Vec<(usize, String)> = match target {
            EstimateTarget::Missing => self
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.needs_quantity())
                .map(|(i, item)| (i, item.name.trim().to_string()))
                .collect(),
            EstimateTarget::Item(index) => {
                let item = self
                    .items
                    .get(index)
                    .ok_or_else(|| PipelineError::Input(format!("no food item at index {}", index)))?;
                if item.name.trim().is_empty() {
                    return Err(PipelineError::Input(format!("food item {} has no name", index)));
                }
                vec![(index, item.name.trim().to_string())]
            }
        };

        // The UI may re-estimate a single item after editing it; clear the old value.
        if let EstimateTarget::Item(index) = target {
            self.items[index].quantity.clear();
        }

        self.estimates_in_flight += 1;
        self.last_error = None;
        self.transition(Stage::EstimatingQuantities);

        Ok(EstimateTicket {
            generation: self.generation,
            targets,
        })
    }

    /// Applies per-item outcomes, in ticket order. Failed items keep an empty
    /// quantity and produce a warning. An item the user renamed or filled in
    /// meanwhile is left alone.
    pub fn finish_estimate(
        &mut self,
        ticket: EstimateTicket,
        results: Vec<Result<String, PipelineError>>,
    ) -> Outcome<Vec<QuantityWarning>> {
        if ticket.generation != self.generation {
            log::warn!("🗑️ Discarding stale quantity estimates");
            return Outcome::Discarded;
        }

        let mut warnings = Vec::new();
        for ((index, name), result) in ticket.targets.into_iter().zip(results) {
            let current = match self.items.get_mut(index) {
                Some(item) if item.name.trim() == name && item.quantity.trim().is_empty() => item,
                _ => {
                    log::debug!("⏭️ Item {} changed during estimation, skipping", index);
                    continue;
                }
            };

            match result {
                Ok(quantity) => current.quantity = quantity,
                Err(e) => {
                    log::warn!("⚠️ Quantity estimation failed for '{}': {}", name, e);
                    current.quantity.clear();
                    warnings.push(QuantityWarning::failed(index, name, &e));
                }
            }
        }

        self.warnings.retain(|w| !warnings.iter().any(|n| n.index == w.index));
        self.warnings.extend(warnings.iter().cloned());
        self.revision += 1;

        self.estimates_in_flight = self.estimates_in_flight.saturating_sub(1);
        if self.estimates_in_flight == 0 && self.stage == Stage::EstimatingQuantities {
            self.transition(Stage::ItemsWithQuantities);
        } else {
            self.updated_at = Utc::now();
        }

        Outcome::Applied(warnings)
    }

    pub fn begin_aggregate(&mut self) -> Result<AggregateTicket, PipelineError> {
        match self.stage {
            Stage::ItemsReady | Stage::ItemsWithQuantities | Stage::ReportReady => {}
            stage => return Err(PipelineError::Input(format!("cannot aggregate while {}", stage))),
        }

        if !self.items.iter().any(|item| !item.name.trim().is_empty()) {
            return Err(PipelineError::Input("no food items to aggregate".to_string()));
        }

        self.last_error = None;
        self.transition(Stage::Aggregating);

        Ok(AggregateTicket {
            generation: self.generation,
            revision: self.revision,
            items: self.items.clone(),
        })
    }

    pub fn finish_aggregate(
        &mut self,
        ticket: AggregateTicket,
        result: Result<NutritionReport, PipelineError>,
    ) -> Result<Outcome<NutritionReport>, PipelineError> {
        if ticket.generation != self.generation || ticket.revision != self.revision {
            log::warn!("🗑️ Discarding stale nutrition report");
            return Ok(Outcome::Discarded);
        }

        match result {
            Ok(report) => {
                self.report = Some(report.clone());
                self.transition(Stage::ReportReady);
                Ok(Outcome::Applied(report))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.transition(Stage::ItemsWithQuantities);
                Err(e)
            }
        }
    }

    /// Replaces the whole working list.
    pub fn set_items(&mut self, items: Vec<FoodItem>) {
        self.before_edit();
        self.items = items;
        self.warnings.clear();
    }

    pub fn add_item(&mut self, item: FoodItem) {
        self.before_edit();
        self.items.push(item);
    }

    pub fn update_item(&mut self, index: usize, item: FoodItem) -> Result<(), PipelineError> {
        if index >= self.items.len() {
            return Err(PipelineError::Input(format!("no food item at index {}", index)));
        }
        self.before_edit();
        self.items[index] = item;
        self.warnings.retain(|w| w.index != index);
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Result<FoodItem, PipelineError> {
        if index >= self.items.len() {
            return Err(PipelineError::Input(format!("no food item at index {}", index)));
        }
        self.before_edit();
        self.warnings.retain(|w| w.index != index);
        for warning in self.warnings.iter_mut().filter(|w| w.index > index) {
            warning.index -= 1;
        }
        // Shifts indices, so in-flight per-index estimates must not land.
        self.generation += 1;
        self.estimates_in_flight = 0;
        if self.stage == Stage::EstimatingQuantities {
            self.transition(Stage::ItemsWithQuantities);
        }
        Ok(self.items.remove(index))
    }

    fn before_edit(&mut self) {
        self.revision += 1;
        match self.stage {
            Stage::Idle | Stage::ImageCaptured => self.transition(Stage::ItemsReady),
            Stage::Identifying => {
                // Manual entry supersedes the running identification.
                self.generation += 1;
                self.transition(Stage::ItemsReady);
            }
            Stage::Aggregating => self.transition(Stage::ItemsWithQuantities),
            _ => self.updated_at = Utc::now(),
        }
    }
}
