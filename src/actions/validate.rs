//! Entity validation for action handlers

/// Characters that must never reach a process argument
const FORBIDDEN_APP_CHARS: &[char] = &['<', '>', '|', '&', ';', '`', '$'];

/// Longest accepted application name
const MAX_APP_NAME_LEN: usize = 100;

/// Check an application name before it is handed to a provider
///
/// # Errors
///
/// Returns a human-readable reason when the name is empty, too long, or
/// contains shell metacharacters.
pub fn validate_app_name(app_name: &str) -> Result<&str, String> {
    let name = app_name.trim();

    if name.is_empty() {
        return Err("No app name specified".to_string());
    }
    if name.chars().count() > MAX_APP_NAME_LEN {
        return Err(format!("App name too long (max {MAX_APP_NAME_LEN} characters)"));
    }
    if name.contains(FORBIDDEN_APP_CHARS) {
        return Err("App name contains invalid characters".to_string());
    }

    Ok(name)
}

/// Convert a spoken timer duration to seconds
///
/// Seconds are capped at one hour, minutes at one day and hours at one week.
///
/// # Errors
///
/// Returns a human-readable reason for non-numeric, non-positive, unknown
/// unit or over-long durations.
pub fn timer_seconds(duration: &str, unit: &str) -> Result<u64, String> {
    let amount: u64 = duration
        .trim()
        .parse()
        .map_err(|_| "Duration must be a number".to_string())?;

    if amount == 0 {
        return Err("Duration must be positive".to_string());
    }

    let unit = unit.trim().to_lowercase();
    let (multiplier, max_seconds) = if unit.starts_with("second") {
        (1, 3_600)
    } else if unit.starts_with("minute") {
        (60, 86_400)
    } else if unit.starts_with("hour") {
        (3_600, 604_800)
    } else {
        return Err(format!("Invalid time unit: {unit}"));
    };

    let seconds = amount.saturating_mul(multiplier);
    if seconds > max_seconds {
        return Err(format!("Duration too long for {unit}"));
    }

    Ok(seconds)
}
