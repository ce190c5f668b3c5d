use std::borrow::Cow;

use super::Transform;
use crate::html;

/// Turns root-relative stylesheet hrefs (`/css/a.css`) into document-relative
/// ones (`css/a.css`), so the site works from a sub-path or from `file://`.
///
/// Protocol-relative hrefs (`//cdn.example.com/a.css`) are left alone.
pub struct RelativeStylesheets;

impl Transform for RelativeStylesheets {
    fn name(&self) -> &'static str {
        "relative-stylesheets"
    }

    fn apply<'a>(&self, markup: &'a str) -> Cow<'a, str> {
        html::rewrite_tags(markup, |tag| {
            if !tag.is("link") || !is_stylesheet(tag.attribute("rel")?.value?) {
                return None;
            }

            let href = tag.attribute("href")?;
            let relative = relative_from_root(href.value?)?;

            Some(tag.splice(href.value_span?, relative))
        })
    }
}

/// `/css/a.css` -> `css/a.css`. `None` for URLs that are not root-relative,
/// protocol-relative ones (`//cdn.example.com/a.css`) included.
pub fn relative_from_root(url: &str) -> Option<&str> {
    if url.starts_with("//") {
        return None;
    }
    url.strip_prefix('/')
}

fn is_stylesheet(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
}
