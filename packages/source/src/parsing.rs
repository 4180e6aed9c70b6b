//! Cell-level parsing shared by the loader.
//!
//! Published spreadsheets often store integers as floats (`"12.0"`), so
//! every integer parser accepts a zero fractional part.

/// Decodes ISO-8859-1 bytes. Every byte maps to the code point of the same
/// value, so decoding never fails.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Strips a leading UTF-8 byte order mark, if present.
#[must_use]
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Lowercases and trims a header cell.
#[must_use]
pub fn normalize_header(header: &str) -> String {
    strip_bom(header).trim().to_lowercase()
}

/// Parses a non-negative integer, accepting a zero fractional part.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_whole(cell: &str) -> Result<u64, String> {
    let cell = cell.trim();
    if let Ok(v) = cell.parse::<u64>() {
        return Ok(v);
    }
    match cell.parse::<f64>() {
        Ok(v) if !v.is_finite() => Err(format!("non-finite value {cell:?}")),
        Ok(v) if v < 0.0 => Err(format!("negative value {cell:?}")),
        Ok(v) if v.fract() == 0.0 && v <= 9.0e15 => Ok(v as u64),
        Ok(_) => Err(format!("fractional value {cell:?}")),
        Err(_) => Err(format!("unparseable value {cell:?}")),
    }
}

/// Parses a count cell. Empty cells take `fill`.
///
/// # Errors
///
/// Returns a description of the problem for negative, fractional or
/// unparseable values.
pub fn parse_count(cell: &str, fill: u64) -> Result<u64, String> {
    if cell.trim().is_empty() {
        return Ok(fill);
    }
    parse_whole(cell).map_err(|e| format!("count: {e}"))
}

/// Parses a year cell.
///
/// # Errors
///
/// Returns a description of the problem if the cell is not a plausible
/// year.
pub fn parse_year(cell: &str) -> Result<i32, String> {
    let v = parse_whole(cell).map_err(|e| format!("year: {e}"))?;
    if (1900..=2200).contains(&v) {
        i32::try_from(v).map_err(|e| format!("year: {e}"))
    } else {
        Err(format!("year: {v} is out of range"))
    }
}

/// Parses a month cell into 1..=12.
///
/// # Errors
///
/// Returns a description of the problem if the month is unparseable or
/// outside 1..=12.
pub fn parse_month(cell: &str) -> Result<u8, String> {
    let v = parse_whole(cell).map_err(|e| format!("month: {e}"))?;
    if (1..=12).contains(&v) {
        u8::try_from(v).map_err(|e| format!("month: {e}"))
    } else {
        Err(format!("month: {v} is outside 1-12"))
    }
}

/// Parses a municipality code.
///
/// # Errors
///
/// Returns a description of the problem if the cell is empty, zero or
/// does not fit a `u32`.
pub fn parse_municipality_id(cell: &str) -> Result<u32, String> {
    if cell.trim().is_empty() {
        return Err("municipality_id: empty".to_string());
    }
    let v = parse_whole(cell).map_err(|e| format!("municipality_id: {e}"))?;
    match u32::try_from(v) {
        Ok(0) => Err("municipality_id: zero".to_string()),
        Ok(id) => Ok(id),
        Err(_) => Err(format!("municipality_id: {v} is too large")),
    }
}
