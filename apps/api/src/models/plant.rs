use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{
    FertilizerType, HealthStatus, PestStatus, PestType, PlantFlag, Sunlight, WaterType,
    WateringMethod,
};
use crate::models::patch::{Blank, Patch};

// ────────────────────────────────────────────────────────────────────────────
// Care sub-configs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub room: String,
    pub position: String,
    pub is_outdoors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WateringConfig {
    pub interval_days: i32,
    pub method: WateringMethod,
    pub water_type: WaterType,
    pub last_watered: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FertilizerConfig {
    #[serde(rename = "type")]
    pub fertilizer_type: FertilizerType,
    pub interval_days: i32,
    pub npk_ratio: String,
    pub concentration_percent: f64,
    pub last_fertilized: Option<DateTime<Utc>>,
    pub active_in_winter: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HumidityConfig {
    pub requires_misting: bool,
    pub misting_interval_days: i32,
    pub last_misted: Option<DateTime<Utc>>,
    pub requires_humidifier: bool,
    pub target_humidity_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SoilConfig {
    #[serde(rename = "type")]
    pub soil_type: String,
    pub components: Vec<String>,
    pub last_repotted: Option<DateTime<Utc>>,
    /// Months between repottings.
    pub repotting_cycle: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeasonalAdjustments {
    pub winter_rest_period: bool,
    pub winter_water_factor: f64,
    pub min_temp_celsius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PestInfection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pest: PestType,
    /// Required; left optional so a missing value is reported as a field error.
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: PestStatus,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthLog {
    #[serde(default)]
    pub id: String,
    /// Required, see [`PestInfection::detected_at`].
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub height_cm: f64,
    #[serde(default)]
    pub leaf_count: i32,
    #[serde(default)]
    pub health: HealthStatus,
    #[serde(default)]
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
}

// Emptiness predicates: a sub-config carrying only zero values is a request
// to remove it, not a value to store.

impl Blank for Location {
    fn is_blank(&self) -> bool {
        self.room.trim().is_empty() && self.position.trim().is_empty() && !self.is_outdoors
    }
}

impl Blank for WateringConfig {
    fn is_blank(&self) -> bool {
        self.interval_days == 0
            && self.method.is_blank()
            && self.water_type.is_blank()
            && self.last_watered.is_none()
    }
}

impl Blank for FertilizerConfig {
    fn is_blank(&self) -> bool {
        self.fertilizer_type.is_blank()
            && self.interval_days == 0
            && self.npk_ratio.trim().is_empty()
            && self.concentration_percent == 0.0
            && self.last_fertilized.is_none()
            && !self.active_in_winter
    }
}

impl Blank for HumidityConfig {
    fn is_blank(&self) -> bool {
        !self.requires_misting
            && self.misting_interval_days == 0
            && self.last_misted.is_none()
            && !self.requires_humidifier
            && self.target_humidity_pct == 0.0
    }
}

impl Blank for SoilConfig {
    fn is_blank(&self) -> bool {
        self.soil_type.trim().is_empty()
            && self.components.is_empty()
            && self.last_repotted.is_none()
            && self.repotting_cycle == 0
    }
}

impl Blank for SeasonalAdjustments {
    fn is_blank(&self) -> bool {
        !self.winter_rest_period && self.winter_water_factor == 0.0 && self.min_temp_celsius == 0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregate
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: Uuid,
    pub user_id: String,
    pub slug: String,
    pub name: String,
    pub species: Option<String>,
    pub is_toxic: bool,
    pub sunlight: Option<Sunlight>,
    pub prefered_temperature: Option<f64>,
    pub location: Option<Location>,
    pub watering: Option<WateringConfig>,
    pub fertilizing: Option<FertilizerConfig>,
    pub humidity: Option<HumidityConfig>,
    pub soil: Option<SoilConfig>,
    pub seasonality: Option<SeasonalAdjustments>,
    pub pest_history: Vec<PestInfection>,
    pub flags: Vec<PlantFlag>,
    pub notes: Vec<String>,
    pub photo_ids: Vec<String>,
    pub growth_history: Vec<GrowthLog>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plant {
    /// Builds a new, not yet persisted plant from a validated request.
    pub fn from_request(
        request: CreatePlantRequest,
        user_id: &str,
        slug: String,
        now: DateTime<Utc>,
    ) -> Self {
        Plant {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            slug,
            name: request.name,
            species: request.species.filter(|s| !s.trim().is_empty()),
            is_toxic: request.is_toxic,
            sunlight: request.sunlight.filter(|s| !s.is_blank()),
            prefered_temperature: request.prefered_temperature,
            location: request.location,
            watering: request.watering,
            fertilizing: request.fertilizing,
            humidity: request.humidity,
            soil: request.soil,
            seasonality: request.seasonality,
            pest_history: request.pest_history,
            flags: dedup_flags(request.flags),
            notes: request.notes,
            photo_ids: request.photo_ids,
            growth_history: request.growth_history,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePlantRequest {
    pub name: String,
    pub species: Option<String>,
    pub is_toxic: bool,
    pub sunlight: Option<Sunlight>,
    pub prefered_temperature: Option<f64>,
    pub location: Option<Location>,
    pub watering: Option<WateringConfig>,
    pub fertilizing: Option<FertilizerConfig>,
    pub humidity: Option<HumidityConfig>,
    pub soil: Option<SoilConfig>,
    pub seasonality: Option<SeasonalAdjustments>,
    pub pest_history: Vec<PestInfection>,
    pub flags: Vec<PlantFlag>,
    pub notes: Vec<String>,
    pub photo_ids: Vec<String>,
    pub growth_history: Vec<GrowthLog>,
}

/// PATCH body for a plant. See [`Patch`] for the per-field semantics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlantPatch {
    pub name: Patch<String>,
    pub species: Patch<String>,
    pub is_toxic: Option<bool>,
    pub sunlight: Patch<Sunlight>,
    pub prefered_temperature: Patch<f64>,
    pub location: Patch<Location>,
    pub watering: Patch<WateringConfig>,
    pub fertilizing: Patch<FertilizerConfig>,
    pub humidity: Patch<HumidityConfig>,
    pub soil: Patch<SoilConfig>,
    pub seasonality: Patch<SeasonalAdjustments>,
    pub pest_history: Patch<Vec<PestInfection>>,
    pub flags: Patch<Vec<PlantFlag>>,
    pub notes: Patch<Vec<String>>,
    pub photo_ids: Patch<Vec<String>>,
    pub growth_history: Patch<Vec<GrowthLog>>,
}

impl PlantPatch {
    /// Folds present-but-blank values into explicit clears.
    ///
    /// `name` is left as sent: it cannot be cleared, and validation rejects
    /// a blank or null name before the patch reaches the store.
    pub fn normalized(self) -> Self {
        PlantPatch {
            name: self.name,
            species: self.species.normalized(),
            is_toxic: self.is_toxic,
            sunlight: self.sunlight.clear_if(Sunlight::is_blank),
            prefered_temperature: self.prefered_temperature,
            location: self.location.normalized(),
            watering: self.watering.normalized(),
            fertilizing: self.fertilizing.normalized(),
            humidity: self.humidity.normalized(),
            soil: self.soil.normalized(),
            seasonality: self.seasonality.normalized(),
            pest_history: self.pest_history.normalized(),
            flags: self.flags.map(dedup_flags).normalized(),
            notes: self.notes.normalized(),
            photo_ids: self.photo_ids.normalized(),
            growth_history: self.growth_history.normalized(),
        }
    }
}

fn apply_field<T>(slot: &mut Option<T>, patch: Patch<T>) {
    match patch {
        Patch::Unset => {}
        Patch::Clear => *slot = None,
        Patch::Value(v) => *slot = Some(v),
    }
}

fn apply_list<T>(slot: &mut Vec<T>, patch: Patch<Vec<T>>) {
    match patch {
        Patch::Unset => {}
        Patch::Clear => slot.clear(),
        Patch::Value(v) => *slot = v,
    }
}

impl Plant {
    /// Applies a normalized patch in place and bumps `updated_at`.
    pub fn apply_patch(&mut self, patch: PlantPatch, now: DateTime<Utc>) {
        if let Patch::Value(name) = patch.name {
            self.name = name;
        }
        apply_field(&mut self.species, patch.species);
        if let Some(is_toxic) = patch.is_toxic {
            self.is_toxic = is_toxic;
        }
        apply_field(&mut self.sunlight, patch.sunlight);
        apply_field(&mut self.prefered_temperature, patch.prefered_temperature);
        apply_field(&mut self.location, patch.location);
        apply_field(&mut self.watering, patch.watering);
        apply_field(&mut self.fertilizing, patch.fertilizing);
        apply_field(&mut self.humidity, patch.humidity);
        apply_field(&mut self.soil, patch.soil);
        apply_field(&mut self.seasonality, patch.seasonality);
        apply_list(&mut self.pest_history, patch.pest_history);
        apply_list(&mut self.flags, patch.flags);
        apply_list(&mut self.notes, patch.notes);
        apply_list(&mut self.photo_ids, patch.photo_ids);
        apply_list(&mut self.growth_history, patch.growth_history);
        self.updated_at = now;
    }
}

/// Flags form a set; keep the first occurrence of each.
pub fn dedup_flags(flags: Vec<PlantFlag>) -> Vec<PlantFlag> {
    let mut seen = Vec::with_capacity(flags.len());
    for flag in flags {
        if !seen.contains(&flag) {
            seen.push(flag);
        }
    }
    seen
}
