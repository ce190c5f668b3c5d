use std::borrow::Cow;

use super::Transform;
use crate::html::{self, Tag};

const LOADING_LAZY: &str = r#" loading="lazy""#;
const DECODING_ASYNC: &str = r#" decoding="async""#;

/// Adds `loading="lazy"` to `<img>` and `<iframe>` tags, and `decoding="async"`
/// to `<img>` tags.
///
/// A tag that already declares `loading` is left exactly as written. That is
/// how a page opts its largest image out, with `loading="eager"`.
pub struct LazyMedia;

impl Transform for LazyMedia {
    fn name(&self) -> &'static str {
        "lazy-media"
    }

    fn apply<'a>(&self, markup: &'a str) -> Cow<'a, str> {
        html::rewrite_tags(markup, |tag| {
            if tag.has_attribute("loading") {
                return None;
            }

            if tag.is("img") {
                Some(lazy_img(tag))
            } else if tag.is("iframe") {
                Some(lazy_iframe(tag))
            } else {
                None
            }
        })
    }
}

/// `<img src="a.png">` -> `<img loading="lazy" decoding="async" src="a.png" />`
fn lazy_img(tag: &Tag<'_>) -> String {
    let attrs = tag.attrs_without_solidus();

    let mut out =
        String::with_capacity(tag.raw().len() + LOADING_LAZY.len() + DECODING_ASYNC.len() + 3);
    out.push('<');
    out.push_str(tag.name());
    out.push_str(LOADING_LAZY);
    if !tag.has_attribute("decoding") {
        out.push_str(DECODING_ASYNC);
    }
    out.push_str(attrs);
    out.push_str(" />");
    out
}

/// `<iframe src="a">` -> `<iframe loading="lazy" src="a">`
fn lazy_iframe(tag: &Tag<'_>) -> String {
    format!("<{}{}{}>", tag.name(), LOADING_LAZY, tag.attrs())
}
