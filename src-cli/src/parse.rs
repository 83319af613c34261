//! Value parsers for command-line options.

/// Parse a number of seconds. Fractions are allowed.
///
/// Range checks happen when the recording options are validated.
pub fn seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if !value.is_finite() {
        return Err(format!("'{}' is not a finite number of seconds", s));
    }
    Ok(value)
}

/// Parse a byte size with an optional binary suffix: `K`, `M` or `G`
/// (case-insensitive, optionally followed by `B` or `iB`).
pub fn byte_size(s: &str) -> Result<u64, String> {
    let trimmed = s.trim();
    let lower = trimmed.to_ascii_lowercase();
    let unit_start = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (digits, unit) = lower.split_at(unit_start);

    if digits.is_empty() {
        return Err(format!("'{}' is not a size in bytes", s));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("'{}' is too large", s))?;

    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        other => return Err(format!("unknown size unit '{}' (use K, M or G)", other)),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("'{}' is too large", s))
}
