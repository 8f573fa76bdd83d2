use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use url::{Position, Url};

use crate::error::AppError;

/// Maximum number of characters of a variant name kept in its id slug.
const VARIANT_SLUG_LEN: usize = 20;

/// Strip the query string, fragment and trailing slashes from a URL.
///
/// `"https://shop.example.com/item/p123/?sku=1"` → `"https://shop.example.com/item/p123"`
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let origin = &url[..Position::BeforePath];
            format!("{}{}", origin, url.path().trim_end_matches('/'))
        }
        Err(_) => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            raw[..end].trim_end_matches('/').to_string()
        }
    }
}

/// Numeric product id from a URL ending in `p<digits>`.
pub fn extract_product_id(url: &str) -> Option<String> {
    let digits_start = url
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    if url[..digits_start].ends_with('p') {
        Some(url[digits_start..].to_string())
    } else {
        None
    }
}

/// Id of one variant of a product page.
///
/// The variant name has spaces replaced by underscores and is cut to
/// 20 characters. Names sharing their first 20 characters collide.
pub fn variant_id(base_id: &str, variant_name: &str) -> String {
    let slug: String = variant_name
        .replace(' ', "_")
        .chars()
        .take(VARIANT_SLUG_LEN)
        .collect();
    format!("{base_id}_{slug}")
}

/// Listing request URL for one page/chunk of a category.
pub fn listing_url(base: &str, page: u32, chunk: u32) -> Result<String, AppError> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::ConfigError(format!("Invalid listing URL '{base}': {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("page", &page.to_string());
        if chunk > 1 {
            pairs.append_pair("chunk", &chunk.to_string());
        }
    }
    Ok(url.to_string())
}

/// Truncate a string to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an RFC 3339 timestamp, or a naive one (`T` or space separated)
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Numeric JSON value, accepting numbers and numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
