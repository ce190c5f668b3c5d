//! Template filters.
//!
//! Each filter is a plain function. [`apply`] looks string filters up by the
//! name templates use for them.

use std::{fs, path::Path, sync::LazyLock};

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::{css, transform};

/// Names accepted by [`apply`].
pub const NAMES: [&str; 7] = [
    "cacheBust",
    "readFile",
    "toRelativeFromRoot",
    "readableDate",
    "htmlDateString",
    "isoDate",
    "cssmin",
];

static BUILD_TIME: LazyLock<DateTime<Utc>> = LazyLock::new(Utc::now);

/// Run the filter called `name` on a string value. `root` is the directory
/// `readFile` paths start from.
pub fn apply(root: &Path, name: &str, value: &str) -> anyhow::Result<String> {
    match name {
        "cacheBust" => Ok(cache_bust()),
        "readFile" => read_file(root, value),
        "toRelativeFromRoot" => Ok(to_relative_from_root(value).to_string()),
        "readableDate" => Ok(readable_date(parse_date(value)?)),
        "htmlDateString" => Ok(html_date_string(parse_date(value)?)),
        "isoDate" => Ok(iso_date(parse_date(value)?)),
        "cssmin" => Ok(css_min(value)),
        _ => Err(anyhow::anyhow!(
            "unknown filter `{}`, expected one of: {}",
            name,
            NAMES.join(", ")
        )),
    }
}

/// Build time as milliseconds since the epoch. Taken on first use, then the
/// same value for every call in one process.
pub fn cache_bust() -> String {
    BUILD_TIME.timestamp_millis().to_string()
}

/// Contents of `path`, relative to `root`.
pub fn read_file(root: &Path, path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = root.join(path);
    fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// `/css/a.css` -> `css/a.css`. Other URLs are returned as they are.
pub fn to_relative_from_root(url: &str) -> &str {
    transform::relative_from_root(url).unwrap_or(url)
}

/// `2024-03-05` -> `05 Mar 2024`
pub fn readable_date(date: DateTime<Utc>) -> String {
    date.format("%d %b %Y").to_string()
}

/// `<time datetime="...">` value: `2024-03-05`
pub fn html_date_string(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `2024-03-05T00:00:00.000Z`
pub fn iso_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn css_min(code: &str) -> String {
    css::minify_css(code).into_owned()
}

/// First `n` items, or the last `-n` items when `n` is negative.
pub fn head<T>(items: &[T], n: isize) -> &[T] {
    let count = n.unsigned_abs().min(items.len());
    if n < 0 {
        &items[items.len() - count..]
    } else {
        &items[..count]
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_date(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).context("midnight is a valid time")?;
        return Ok(midnight.and_utc());
    }

    DateTime::parse_from_rfc3339(value)
        .map(|date| date.to_utc())
        .with_context(|| format!("`{}` is neither YYYY-MM-DD nor an RFC 3339 date", value))
}
