//! Start-tag scanner for rewriting emitted markup.
//!
//! This is not an HTML parser. It finds start tags with their attribute lists
//! and lets a caller replace the tag text. Comments and the contents of
//! raw-text elements are skipped so tag-like text inside them is never touched.

use std::{borrow::Cow, ops::Range, sync::LazyLock};

use regex::Regex;

/// Elements whose content is text, not markup.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Quoted attribute values may contain `>`.
const ATTRS: &str = r#"(?:[^>"']|"[^"]*"|'[^']*')*"#;

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut pattern = String::from(r"(?is)<!--.*?(?:-->|\z)");
    for name in RAW_TEXT_ELEMENTS {
        pattern.push_str(&format!(
            r"|<{name}(?:[\s/]{ATTRS})?>.*?(?:</{name}\s*>|\z)"
        ));
    }
    pattern.push_str(&format!(
        r"|<(?P<name>[a-z][a-z0-9-]*)(?P<attrs>(?:[\s/]{ATTRS})?)>"
    ));
    Regex::new(&pattern).expect("markup pattern is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<name>[^\s"'<>/=]+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<uq>[^\s"'=<>`]+)))?"#,
    )
    .expect("attribute pattern is valid")
});

/// A start tag found in the markup.
#[derive(Debug, Clone, Copy)]
pub struct Tag<'a> {
    raw: &'a str,
    name: &'a str,
    attrs: &'a str,
    /// Byte offset of `attrs` inside `raw`.
    attrs_offset: usize,
}

#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
    /// Span of the value (without quotes) inside the tag's raw text.
    pub value_span: Option<Range<usize>>,
}

impl<'a> Tag<'a> {
    /// The full tag text, `<` through `>`.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// The tag name as written in the source.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Everything between the tag name and the closing `>`.
    pub fn attrs(&self) -> &'a str {
        self.attrs
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_self_closing(&self) -> bool {
        self.attrs_without_solidus().len() != self.attrs.trim_end().len()
    }

    /// The attribute list with trailing whitespace and a self-closing `/` removed.
    ///
    /// A `/` that ends an unquoted value (`src=/a/`) belongs to the value and is kept.
    pub fn attrs_without_solidus(&self) -> &'a str {
        let trimmed = self.attrs.trim_end();
        let Some(rest) = trimmed.strip_suffix('/') else {
            return trimmed;
        };

        let ends_value = |c: char| c.is_whitespace() || c == '"' || c == '\'';
        if rest.is_empty() || rest.ends_with(ends_value) {
            rest.trim_end()
        } else {
            trimmed
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute<'a>> + use<'a> {
        let offset = self.attrs_offset;

        ATTR_RE.captures_iter(self.attrs).filter_map(move |caps| {
            let name = caps.name("name")?.as_str();
            let value = caps
                .name("dq")
                .or_else(|| caps.name("sq"))
                .or_else(|| caps.name("uq"));

            Some(Attribute {
                name,
                value: value.map(|m| m.as_str()),
                value_span: value.map(|m| offset + m.start()..offset + m.end()),
            })
        })
    }

    /// First attribute with the given name, compared case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<Attribute<'a>> {
        self.attributes()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// The raw tag text with the bytes in `span` replaced.
    pub fn splice(&self, span: Range<usize>, replacement: &str) -> String {
        let mut out = String::with_capacity(self.raw.len() + replacement.len());
        out.push_str(&self.raw[..span.start]);
        out.push_str(replacement);
        out.push_str(&self.raw[span.end..]);
        out
    }
}

/// Calls `rewrite` for every start tag in `markup` and replaces the tag with the
/// returned text. Tags for which `rewrite` returns `None` are left as they are.
///
/// Returns `Cow::Borrowed` when nothing was replaced.
pub fn rewrite_tags<'a, F>(markup: &'a str, mut rewrite: F) -> Cow<'a, str>
where
    F: FnMut(&Tag<'_>) -> Option<String>,
{
    let mut out = String::new();
    let mut last = 0;
    let mut replaced = false;

    for caps in MARKUP_RE.captures_iter(markup) {
        let (Some(name), Some(attrs)) = (caps.name("name"), caps.name("attrs")) else {
            continue;
        };
        let Some(whole) = caps.get(0) else {
            continue;
        };

        let tag = Tag {
            raw: whole.as_str(),
            name: name.as_str(),
            attrs: attrs.as_str(),
            attrs_offset: attrs.start() - whole.start(),
        };

        if let Some(replacement) = rewrite(&tag) {
            out.push_str(&markup[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
            replaced = true;
        }
    }

    if !replaced {
        return Cow::Borrowed(markup);
    }

    out.push_str(&markup[last..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(markup: &str) -> Vec<String> {
        let mut names = Vec::new();
        let _ = rewrite_tags(markup, |tag| {
            names.push(tag.name().to_string());
            None
        });
        names
    }

    fn first_tag<T>(markup: &str, f: impl FnOnce(&Tag<'_>) -> T) -> T {
        let mut f = Some(f);
        let mut ret = None;
        let _ = rewrite_tags(markup, |tag| {
            if let Some(f) = f.take() {
                ret = Some(f(tag));
            }
            None
        });
        ret.expect("markup has a tag")
    }

    #[test]
    fn finds_start_tags_only() {
        assert_eq!(
            tags("<!DOCTYPE html><html><body><p>hi</p><br/></body></html>"),
            ["html", "body", "p", "br"]
        );
    }

    #[test]
    fn skips_comments_and_raw_text() {
        let markup = concat!(
            r#"<!-- <img src="a"> -->"#,
            r#"<script>let s = "<img src=b>";</script>"#,
            r#"<style>a::after { content: "<iframe>" }</style>"#,
            r#"<img src="c">"#,
        );
        assert_eq!(tags(markup), ["img"]);
    }

    #[test]
    fn unterminated_comment_runs_to_end() {
        assert!(tags("<p>x</p><!-- <img src=a>").iter().all(|t| t == "p"));
    }

    #[test]
    fn quoted_gt_stays_inside_tag() {
        let attrs = first_tag(r#"<img alt="a > b" src=x.png>"#, |t| t.attrs().to_string());
        assert_eq!(attrs, r#" alt="a > b" src=x.png"#);
    }

    #[test]
    fn name_must_end_at_whitespace_or_solidus() {
        assert!(tags("<img:foo src=a>").is_empty());
        assert_eq!(tags("<img/src=a>"), ["img"]);
    }

    #[test]
    fn attribute_forms() {
        let attrs: Vec<(String, Option<String>)> = first_tag(
            r#"<link REL='stylesheet' href="/a.css" media=print disabled>"#,
            |t| {
                t.attributes()
                    .map(|a| (a.name.to_string(), a.value.map(str::to_string)))
                    .collect()
            },
        );

        assert_eq!(
            attrs,
            [
                ("REL".to_string(), Some("stylesheet".to_string())),
                ("href".to_string(), Some("/a.css".to_string())),
                ("media".to_string(), Some("print".to_string())),
                ("disabled".to_string(), None),
            ]
        );
    }

    #[test]
    fn attribute_lookup_is_case_insensitive_and_exact() {
        first_tag(r#"<img data-loading="x" LOADING=eager>"#, |t| {
            assert_eq!(t.attribute("loading").and_then(|a| a.value), Some("eager"));
            assert!(!t.has_attribute("decoding"));
        });
        first_tag(r#"<img data-loading="x">"#, |t| {
            assert!(!t.has_attribute("loading"));
        });
    }

    #[test]
    fn value_span_points_into_raw() {
        first_tag(r#"<link rel=stylesheet href='/x.css'>"#, |t| {
            let href = t.attribute("href").expect("href");
            let span = href.value_span.expect("span");
            assert_eq!(&t.raw()[span.clone()], "/x.css");
            assert_eq!(t.splice(span, "x.css"), "<link rel=stylesheet href='x.css'>");
        });
    }

    #[test]
    fn strips_self_closing_solidus() {
        first_tag(r#"<img src="a.png" />"#, |t| {
            assert!(t.is_self_closing());
            assert_eq!(t.attrs_without_solidus(), r#" src="a.png""#);
        });
        first_tag("<img src=/a/>", |t| {
            assert!(!t.is_self_closing());
            assert_eq!(t.attrs_without_solidus(), " src=/a/");
        });
        first_tag("<br/>", |t| assert_eq!(t.attrs_without_solidus(), ""));
    }

    #[test]
    fn untouched_markup_is_borrowed() {
        let markup = "<p>nothing</p>";
        assert!(matches!(rewrite_tags(markup, |_| None), Cow::Borrowed(_)));
    }

    #[test]
    fn replaces_only_returned_tags() {
        let out = rewrite_tags("<a><b><a>", |t| t.is("A").then(|| "<x>".to_string()));
        assert_eq!(out, "<x><b><x>");
    }
}
