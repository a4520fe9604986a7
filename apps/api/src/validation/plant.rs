use crate::models::enums::{
    FertilizerType, HealthStatus, PestStatus, PestType, PlantFlag, Sunlight, WaterType,
    WateringMethod,
};
use crate::models::patch::Patch;
use crate::models::plant::{
    CreatePlantRequest, FertilizerConfig, GrowthLog, HumidityConfig, Location, PestInfection,
    PlantPatch, SeasonalAdjustments, SoilConfig, WateringConfig,
};
use crate::validation::{in_range, trimmed_len, FieldError};

pub const NAME_MAX_LEN: usize = 100;
pub const SPECIES_MAX_LEN: usize = 100;
pub const TEMPERATURE_RANGE: (f64, f64) = (-50.0, 100.0);
pub const LOCATION_ROOM_MAX_LEN: usize = 100;
pub const LOCATION_POSITION_MAX_LEN: usize = 200;
pub const WATERING_INTERVAL_RANGE: (i32, i32) = (1, 365);
pub const FERTILIZING_INTERVAL_RANGE: (i32, i32) = (1, 365);
pub const MISTING_INTERVAL_RANGE: (i32, i32) = (1, 365);
pub const NPK_RATIO_MAX_LEN: usize = 20;
pub const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);
pub const SOIL_TYPE_MAX_LEN: usize = 100;
pub const SOIL_COMPONENTS_MAX_ITEMS: usize = 20;
pub const SOIL_COMPONENT_MAX_LEN: usize = 100;
pub const REPOTTING_CYCLE_RANGE: (i32, i32) = (1, 60);
pub const WINTER_WATER_FACTOR_RANGE: (f64, f64) = (0.1, 2.0);
pub const MIN_TEMP_RANGE: (f64, f64) = (-50.0, 50.0);
pub const PEST_TREATMENT_MAX_LEN: usize = 200;
pub const PEST_NOTES_MAX_LEN: usize = 500;
pub const NOTES_MAX_ITEMS: usize = 100;
pub const NOTE_MAX_LEN: usize = 500;
pub const PHOTO_IDS_MAX_ITEMS: usize = 100;
pub const PHOTO_ID_MAX_LEN: usize = 255;
pub const GROWTH_HISTORY_MAX_ITEMS: usize = 1000;
pub const HEIGHT_CM_RANGE: (f64, f64) = (0.1, 1000.0);
pub const LEAF_COUNT_RANGE: (i32, i32) = (0, 10_000);
pub const CONDITION_MAX_LEN: usize = 200;

/// Validates a full plant payload for creation.
pub fn validate_create(request: &CreatePlantRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    check_name(&request.name, &mut errors);

    if let Some(species) = &request.species {
        if trimmed_len(species) > SPECIES_MAX_LEN {
            errors.push(FieldError::new(
                "species",
                "Species must be 100 characters or less",
            ));
        }
    }

    if let Some(sunlight) = request.sunlight.as_ref().filter(|s| !s.is_blank()) {
        check_sunlight(sunlight, &mut errors);
    }
    if let Some(temp) = request.prefered_temperature {
        check_temperature(temp, &mut errors);
    }
    if let Some(location) = &request.location {
        errors.extend(validate_location(location));
    }
    if let Some(watering) = &request.watering {
        errors.extend(validate_watering(watering));
    }
    if let Some(fertilizing) = &request.fertilizing {
        errors.extend(validate_fertilizing(fertilizing));
    }
    if let Some(humidity) = &request.humidity {
        errors.extend(validate_humidity(humidity));
    }
    if let Some(soil) = &request.soil {
        errors.extend(validate_soil(soil));
    }
    if let Some(seasonality) = &request.seasonality {
        errors.extend(validate_seasonality(seasonality));
    }

    check_pest_history(&request.pest_history, &mut errors);
    check_flags(&request.flags, &mut errors);
    check_notes(&request.notes, &mut errors);
    check_photo_ids(&request.photo_ids, &mut errors);
    check_growth_history(&request.growth_history, &mut errors);

    errors
}

/// Validates a normalized PATCH body.
///
/// Only `Value` fields are checked: absent fields are untouched and cleared
/// fields have nothing left to validate. `name` is the exception, since a
/// plant cannot exist without one.
pub fn validate_update(patch: &PlantPatch) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match &patch.name {
        Patch::Unset => {}
        Patch::Clear => errors.push(FieldError::new("name", "Name cannot be removed")),
        Patch::Value(name) => check_name(name, &mut errors),
    }

    if let Some(species) = patch.species.value() {
        if trimmed_len(species) > SPECIES_MAX_LEN {
            errors.push(FieldError::new(
                "species",
                "Species must be 100 characters or less",
            ));
        }
    }
    if let Some(sunlight) = patch.sunlight.value() {
        check_sunlight(sunlight, &mut errors);
    }
    if let Some(temp) = patch.prefered_temperature.value() {
        check_temperature(*temp, &mut errors);
    }
    if let Some(location) = patch.location.value() {
        errors.extend(validate_location(location));
    }
    if let Some(watering) = patch.watering.value() {
        errors.extend(validate_watering(watering));
    }
    if let Some(fertilizing) = patch.fertilizing.value() {
        errors.extend(validate_fertilizing(fertilizing));
    }
    if let Some(humidity) = patch.humidity.value() {
        errors.extend(validate_humidity(humidity));
    }
    if let Some(soil) = patch.soil.value() {
        errors.extend(validate_soil(soil));
    }
    if let Some(seasonality) = patch.seasonality.value() {
        errors.extend(validate_seasonality(seasonality));
    }
    if let Some(pests) = patch.pest_history.value() {
        check_pest_history(pests, &mut errors);
    }
    if let Some(flags) = patch.flags.value() {
        check_flags(flags, &mut errors);
    }
    if let Some(notes) = patch.notes.value() {
        check_notes(notes, &mut errors);
    }
    if let Some(photo_ids) = patch.photo_ids.value() {
        check_photo_ids(photo_ids, &mut errors);
    }
    if let Some(logs) = patch.growth_history.value() {
        check_growth_history(logs, &mut errors);
    }

    errors
}

pub fn validate_location(location: &Location) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if trimmed_len(&location.room) > LOCATION_ROOM_MAX_LEN {
        errors.push(FieldError::new(
            "location.room",
            "Location room must be 100 characters or less",
        ));
    }
    if trimmed_len(&location.position) > LOCATION_POSITION_MAX_LEN {
        errors.push(FieldError::new(
            "location.position",
            "Location position must be 200 characters or less",
        ));
    }
    errors
}

pub fn validate_watering(watering: &WateringConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let (min, max) = WATERING_INTERVAL_RANGE;
    if !in_range(watering.interval_days, min, max) {
        errors.push(FieldError::new(
            "watering.intervalDays",
            "Watering interval must be between 1 and 365 days",
        ));
    }
    if !watering.method.is_recognized() {
        errors.push(FieldError::new(
            "watering.method",
            format!("Watering method must be one of: {}", WateringMethod::allowed()),
        ));
    }
    if !watering.water_type.is_recognized() {
        errors.push(FieldError::new(
            "watering.waterType",
            format!("Water type must be one of: {}", WaterType::allowed()),
        ));
    }
    errors
}

pub fn validate_fertilizing(fertilizing: &FertilizerConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !fertilizing.fertilizer_type.is_recognized() {
        errors.push(FieldError::new(
            "fertilizing.type",
            format!(
                "Fertilizer type must be one of: {}",
                FertilizerType::allowed()
            ),
        ));
    }
    let (min, max) = FERTILIZING_INTERVAL_RANGE;
    if !in_range(fertilizing.interval_days, min, max) {
        errors.push(FieldError::new(
            "fertilizing.intervalDays",
            "Fertilizing interval must be between 1 and 365 days",
        ));
    }
    check_required_text(
        "fertilizing.npkRatio",
        "NPK ratio",
        &fertilizing.npk_ratio,
        NPK_RATIO_MAX_LEN,
        &mut errors,
    );
    let (min, max) = PERCENT_RANGE;
    if !in_range(fertilizing.concentration_percent, min, max) {
        errors.push(FieldError::new(
            "fertilizing.concentrationPercent",
            "Concentration must be between 0 and 100",
        ));
    }
    errors
}

pub fn validate_humidity(humidity: &HumidityConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let (min, max) = MISTING_INTERVAL_RANGE;
    if humidity.requires_misting && !in_range(humidity.misting_interval_days, min, max) {
        errors.push(FieldError::new(
            "humidity.mistingIntervalDays",
            "Misting interval must be between 1 and 365 days",
        ));
    }
    let (min, max) = PERCENT_RANGE;
    if !in_range(humidity.target_humidity_pct, min, max) {
        errors.push(FieldError::new(
            "humidity.targetHumidityPct",
            "Target humidity must be between 0 and 100",
        ));
    }
    errors
}

pub fn validate_soil(soil: &SoilConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_required_text(
        "soil.type",
        "Soil type",
        &soil.soil_type,
        SOIL_TYPE_MAX_LEN,
        &mut errors,
    );
    if soil.components.len() > SOIL_COMPONENTS_MAX_ITEMS {
        errors.push(FieldError::new(
            "soil.components",
            "Soil components must contain 20 items or less",
        ));
    }
    if let Some(message) = first_bad_item(
        &soil.components,
        SOIL_COMPONENT_MAX_LEN,
        "All soil components must be non-empty strings",
        "Each soil component must be 100 characters or less",
    ) {
        errors.push(FieldError::new("soil.components", message));
    }
    let (min, max) = REPOTTING_CYCLE_RANGE;
    if !in_range(soil.repotting_cycle, min, max) {
        errors.push(FieldError::new(
            "soil.repottingCycle",
            "Repotting cycle must be between 1 and 60 months",
        ));
    }
    errors
}

pub fn validate_seasonality(seasonality: &SeasonalAdjustments) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let (min, max) = WINTER_WATER_FACTOR_RANGE;
    if !in_range(seasonality.winter_water_factor, min, max) {
        errors.push(FieldError::new(
            "seasonality.winterWaterFactor",
            "Winter water factor must be between 0.1 and 2.0",
        ));
    }
    let (min, max) = MIN_TEMP_RANGE;
    if !in_range(seasonality.min_temp_celsius, min, max) {
        errors.push(FieldError::new(
            "seasonality.minTempCelsius",
            "Minimum temperature must be between -50 and 50",
        ));
    }
    errors
}

pub fn validate_pest_infection(pest: &PestInfection, index: usize) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let prefix = format!("pestHistory[{index}]");

    if pest.id.trim().is_empty() {
        errors.push(FieldError::new(
            format!("{prefix}.id"),
            "Pest infection ID must be a non-empty string",
        ));
    }
    if pest.detected_at.is_none() {
        errors.push(FieldError::new(
            format!("{prefix}.detectedAt"),
            "Detection date is required",
        ));
    }
    if !pest.pest.is_recognized() {
        errors.push(FieldError::new(
            format!("{prefix}.pest"),
            format!("Pest type must be one of: {}", PestType::allowed()),
        ));
    }
    if !pest.status.is_recognized() {
        errors.push(FieldError::new(
            format!("{prefix}.status"),
            format!("Pest status must be one of: {}", PestStatus::allowed()),
        ));
    }
    check_required_text(
        &format!("{prefix}.treatment"),
        "Treatment",
        &pest.treatment,
        PEST_TREATMENT_MAX_LEN,
        &mut errors,
    );
    if trimmed_len(&pest.notes) > PEST_NOTES_MAX_LEN {
        errors.push(FieldError::new(
            format!("{prefix}.notes"),
            "Notes must be 500 characters or less",
        ));
    }
    errors
}

pub fn validate_growth_log(log: &GrowthLog, index: usize) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let prefix = format!("growthHistory[{index}]");

    if log.id.trim().is_empty() {
        errors.push(FieldError::new(
            format!("{prefix}.id"),
            "Growth log ID must be a non-empty string",
        ));
    }
    if log.date.is_none() {
        errors.push(FieldError::new(format!("{prefix}.date"), "Date is required"));
    }
    let (min, max) = HEIGHT_CM_RANGE;
    if !in_range(log.height_cm, min, max) {
        errors.push(FieldError::new(
            format!("{prefix}.heightCm"),
            "Height must be between 0.1 and 1000 cm",
        ));
    }
    let (min, max) = LEAF_COUNT_RANGE;
    if !in_range(log.leaf_count, min, max) {
        errors.push(FieldError::new(
            format!("{prefix}.leafCount"),
            "Leaf count must be between 0 and 10000",
        ));
    }
    if !log.health.is_recognized() {
        errors.push(FieldError::new(
            format!("{prefix}.health"),
            format!("Health must be one of: {}", HealthStatus::allowed()),
        ));
    }
    if trimmed_len(&log.condition) > CONDITION_MAX_LEN {
        errors.push(FieldError::new(
            format!("{prefix}.condition"),
            "Condition must be 200 characters or less",
        ));
    }
    if let Some(photo_id) = &log.photo_id {
        let photo_id = photo_id.trim();
        if !photo_id.is_empty() && photo_id_too_long(photo_id) {
            errors.push(FieldError::new(
                format!("{prefix}.photoId"),
                "Non-data photo ID must be 255 characters or less",
            ));
        }
    }
    errors
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::new(
            "name",
            "Name is required and must be a non-empty string",
        ));
    } else if trimmed_len(name) > NAME_MAX_LEN {
        errors.push(FieldError::new("name", "Name must be 100 characters or less"));
    }
}

fn check_sunlight(sunlight: &Sunlight, errors: &mut Vec<FieldError>) {
    if !sunlight.is_recognized() {
        errors.push(FieldError::new(
            "sunlight",
            format!("Sunlight must be one of: {}", Sunlight::allowed()),
        ));
    }
}

fn check_temperature(temp: f64, errors: &mut Vec<FieldError>) {
    let (min, max) = TEMPERATURE_RANGE;
    if !in_range(temp, min, max) {
        errors.push(FieldError::new(
            "preferedTemperature",
            "Preferred temperature must be between -50 and 100",
        ));
    }
}

fn check_required_text(
    field: &str,
    label: &str,
    value: &str,
    max_len: usize,
    errors: &mut Vec<FieldError>,
) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(
            field,
            format!("{label} must be a non-empty string"),
        ));
    } else if trimmed_len(value) > max_len {
        errors.push(FieldError::new(
            field,
            format!("{label} must be {max_len} characters or less"),
        ));
    }
}

fn check_pest_history(pests: &[PestInfection], errors: &mut Vec<FieldError>) {
    for (i, pest) in pests.iter().enumerate() {
        errors.extend(validate_pest_infection(pest, i));
    }
}

fn check_flags(flags: &[PlantFlag], errors: &mut Vec<FieldError>) {
    if flags.iter().any(|f| !f.is_recognized()) {
        errors.push(FieldError::new(
            "flags",
            format!("Flags must be one of: {}", PlantFlag::allowed()),
        ));
    }
}

fn check_notes(notes: &[String], errors: &mut Vec<FieldError>) {
    if notes.len() > NOTES_MAX_ITEMS {
        errors.push(FieldError::new(
            "notes",
            "Notes array must contain 100 items or less",
        ));
    }
    if let Some(message) = first_bad_item(
        notes,
        NOTE_MAX_LEN,
        "All notes must be non-empty strings",
        "Each note must be 500 characters or less",
    ) {
        errors.push(FieldError::new("notes", message));
    }
}

fn check_photo_ids(photo_ids: &[String], errors: &mut Vec<FieldError>) {
    if photo_ids.len() > PHOTO_IDS_MAX_ITEMS {
        errors.push(FieldError::new(
            "photoIds",
            "PhotoIds array must contain 100 items or less",
        ));
    }
    for id in photo_ids {
        let id = id.trim();
        if id.is_empty() {
            errors.push(FieldError::new(
                "photoIds",
                "Each photo ID must be a non-empty string",
            ));
            break;
        }
        if photo_id_too_long(id) {
            errors.push(FieldError::new(
                "photoIds",
                "Non-data photo IDs must be 255 characters or less",
            ));
            break;
        }
    }
}

fn check_growth_history(logs: &[GrowthLog], errors: &mut Vec<FieldError>) {
    if logs.len() > GROWTH_HISTORY_MAX_ITEMS {
        errors.push(FieldError::new(
            "growthHistory",
            "GrowthHistory array must contain 1000 items or less",
        ));
    }
    for (i, log) in logs.iter().enumerate() {
        errors.extend(validate_growth_log(log, i));
    }
}

/// Data URIs are inline images and are exempt from the id length cap.
fn photo_id_too_long(id: &str) -> bool {
    !id.starts_with("data:") && id.chars().count() > PHOTO_ID_MAX_LEN
}

/// Returns the message for the first blank or over-long item, if any.
fn first_bad_item(
    items: &[String],
    max_len: usize,
    blank_message: &str,
    too_long_message: &str,
) -> Option<String> {
    for item in items {
        if item.trim().is_empty() {
            return Some(blank_message.to_string());
        }
        if trimmed_len(item) > max_len {
            return Some(too_long_message.to_string());
        }
    }
    None
}
