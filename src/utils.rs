use chrono::{Datelike, Days, NaiveDate};

/// Parses a French-formatted amount such as `"1 234,56"`, `"-400,00"` or `"(1 000)"`.
///
/// Grouping spaces (regular, non-breaking U+00A0 and narrow non-breaking U+202F) are removed
/// and the decimal comma becomes a point. When both `.` and `,` appear, the last one is the
/// decimal separator. Blank or unparsable input yields `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let (negated, body) = match compact.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, compact.as_str()),
    };

    let normalized = normalize_separators(body);
    let value = normalized.parse::<f64>().ok().filter(|v| v.is_finite())?;

    Some(if negated { -value } else { value })
}

fn normalize_separators(body: &str) -> String {
    let last_comma = body.rfind(',');
    let last_dot = body.rfind('.');

    match (last_comma, last_dot) {
        (Some(comma), Some(dot)) => {
            let (decimal, grouping) = if comma > dot { (',', '.') } else { ('.', ',') };
            body.chars()
                .filter(|c| *c != grouping)
                .map(|c| if c == decimal { '.' } else { c })
                .collect()
        }
        (Some(_), None) => {
            if body.matches(',').count() > 1 {
                body.replace(',', "")
            } else {
                body.replace(',', ".")
            }
        }
        (None, Some(_)) => {
            if body.matches('.').count() > 1 {
                body.replace('.', "")
            } else {
                body.to_string()
            }
        }
        (None, None) => body.to_string(),
    }
}

/// Formats an amount the way French statements print it: no decimals, thousands grouped with
/// a narrow no-break space.
pub fn format_amount(value: f64) -> String {
    let rounded = value.round();
    if rounded == 0.0 || !rounded.is_finite() {
        return "0".to_string();
    }

    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 * 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('\u{202f}');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}
