/// Normalize a column header: trimmed, lowercase, spaces replaced by `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

pub fn normalize_column_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().map(normalize_column_name).collect()
}

/// Numeric identifier embedded in a composite locality label.
///
/// Picks the longest run of ASCII digits, the first one on ties, so both
/// `"Abadia de Goiás (GO) [5200050]"` and `"5200050 - Abadia de Goiás"`
/// yield `5200050`.
pub fn extract_numeric_id(label: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    let mut start: Option<usize> = None;

    for (i, c) in label.char_indices().chain(std::iter::once((label.len(), ' '))) {
        match (c.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                let run = &label[s..i];
                if best.map_or(true, |b| run.len() > b.len()) {
                    best = Some(run);
                }
                start = None;
            }
            _ => {}
        }
    }

    best.map(str::to_string)
}

/// Coerce a loosely formatted number to `f64`; anything else becomes NaN.
///
/// Accepts a comma as decimal separator. Placeholders such as `"..."`, `"-"`
/// or `"X"` coerce to NaN.
pub fn coerce_numeric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }

    trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}
