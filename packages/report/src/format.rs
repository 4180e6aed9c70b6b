//! Cell formatting helpers.

use crime_stats_analytics_models::split_list;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `value` with `precision` decimals, `n/a` when not finite.
#[must_use]
pub fn num(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{value:.precision$}")
    } else {
        "n/a".to_string()
    }
}

#[must_use]
pub fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| num(v, precision))
}

/// Signed percentage, e.g. `+3.2%`.
#[must_use]
pub fn signed_pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:+.1}%"),
        _ => "n/a".to_string(),
    }
}

#[must_use]
pub fn p_value(p: f64) -> String {
    if !p.is_finite() {
        "n/a".to_string()
    } else if p < 0.001 {
        "<0.001".to_string()
    } else {
        format!("{p:.3}")
    }
}

#[must_use]
pub fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

#[must_use]
pub fn month_name(month: u8) -> &'static str {
    match month {
        1..=12 => MONTH_ABBREVIATIONS[usize::from(month - 1)],
        _ => "?",
    }
}

/// Turns a `;`-joined list of month numbers into month names.
#[must_use]
pub fn month_list(cell: &str) -> String {
    let names: Vec<&str> = split_list(cell)
        .into_iter()
        .map(|m| m.parse::<u8>().map_or("?", month_name))
        .collect();
    if names.is_empty() {
        "n/a".to_string()
    } else {
        names.join(", ")
    }
}

/// Turns a `;`-joined list into a comma-separated one.
#[must_use]
pub fn plain_list(cell: &str) -> String {
    let items = split_list(cell);
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_missing_values() {
        assert_eq!(num(f64::NAN, 2), "n/a");
        assert_eq!(num(1.234_56, 2), "1.23");
        assert_eq!(opt(None, 1), "n/a");
        assert_eq!(signed_pct(Some(-4.26)), "-4.3%");
        assert_eq!(signed_pct(Some(3.0)), "+3.0%");
    }

    #[test]
    fn formats_p_values() {
        assert_eq!(p_value(0.000_2), "<0.001");
        assert_eq!(p_value(0.042_1), "0.042");
    }

    #[test]
    fn month_lists_use_names() {
        assert_eq!(month_list("12;1;3"), "Dec, Jan, Mar");
        assert_eq!(month_list(""), "n/a");
        assert_eq!(plain_list("2020-01;2021-01"), "2020-01, 2021-01");
        assert_eq!(plain_list(""), "none");
    }
}
