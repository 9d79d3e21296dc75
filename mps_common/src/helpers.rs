use std::{fmt::Display, str::FromStr};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse an optional numeric setting. Returns `Err` with a printable reason if the value is present but invalid, so
/// that callers can log it before falling back to their default.
pub fn parse_numeric_setting<T>(value: Option<String>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        None => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(|e| format!("'{s}' is not a valid value. {e}")),
    }
}
