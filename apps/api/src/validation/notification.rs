use crate::models::notification::NotificationSettings;
use crate::validation::{in_range, FieldError};

pub const BATCHING_DAYS_RANGE: (i32, i32) = (0, 30);
pub const MUTED_PLANTS_MAX_ITEMS: usize = 100;

pub fn validate_notification_config(settings: &NotificationSettings) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let preferred = settings.preferred_time.trim();
    if preferred.is_empty() {
        errors.push(FieldError::new(
            "preferredTime",
            "PreferredTime is required and must be in HH:mm format (e.g., 08:30)",
        ));
    } else if !is_hh_mm(preferred) {
        errors.push(FieldError::new(
            "preferredTime",
            "PreferredTime must be in HH:mm format (e.g., 08:30)",
        ));
    }

    if let Some(quiet) = &settings.quiet_hours {
        if !is_hh_mm(quiet.start.trim()) {
            errors.push(FieldError::new(
                "quietHours.start",
                "QuietHours start time must be in HH:mm format (e.g., 22:00)",
            ));
        }
        if !is_hh_mm(quiet.end.trim()) {
            errors.push(FieldError::new(
                "quietHours.end",
                "QuietHours end time must be in HH:mm format (e.g., 07:00)",
            ));
        }
    }

    let (min, max) = BATCHING_DAYS_RANGE;
    if !in_range(settings.batching_days, min, max) {
        errors.push(FieldError::new(
            "batchingDays",
            "BatchingDays must be between 0 and 30",
        ));
    }

    if settings.muted_plant_ids.len() > MUTED_PLANTS_MAX_ITEMS {
        errors.push(FieldError::new(
            "mutedPlantIds",
            "MutedPlantIds array must contain 100 items or less",
        ));
    }
    if settings.muted_plant_ids.iter().any(|id| id.trim().is_empty()) {
        errors.push(FieldError::new(
            "mutedPlantIds",
            "All plant IDs must be non-empty strings",
        ));
    }

    errors
}

/// The PUT body replaces the whole config, so an update is held to the same
/// rules as a first write.
pub fn validate_notification_update(settings: &NotificationSettings) -> Vec<FieldError> {
    validate_notification_config(settings)
}

/// 24-hour `HH:mm`, zero-padded.
fn is_hh_mm(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hours = (digits[0] - b'0') * 10 + (digits[1] - b'0');
    let minutes = (digits[2] - b'0') * 10 + (digits[3] - b'0');
    hours < 24 && minutes < 60
}
