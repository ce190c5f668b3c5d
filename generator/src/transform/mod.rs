//! Post-processing passes over rendered HTML documents.
//!
//! A [`Pipeline`] runs its passes in order over one document, right before the
//! document is written. Passes never fail: markup they don't recognize is
//! passed through unchanged.

mod lazy_media;
mod stylesheet;

use std::{borrow::Cow, path::Path, sync::LazyLock};

pub use lazy_media::LazyMedia;
pub use stylesheet::{RelativeStylesheets, relative_from_root};

use crate::config;

const HTML_EXTENSION: &str = "html";

/// One rewriting pass over a whole document.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `Cow::Borrowed` when the markup was left untouched.
    fn apply<'a>(&self, markup: &'a str) -> Cow<'a, str>;
}

pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

static DEFAULT_PIPELINE: LazyLock<Pipeline> = LazyLock::new(Pipeline::default);

/// Run the default passes over `markup`.
///
/// `output_path` only decides whether the document is HTML; anything else is
/// returned unchanged.
pub fn transform(markup: &str, output_path: impl AsRef<Path>) -> String {
    DEFAULT_PIPELINE.run(markup, output_path).into_owned()
}

impl Pipeline {
    /// A pipeline without any pass.
    pub fn empty() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn from_config(config: &config::Transforms) -> Self {
        let mut pipeline = Self::empty();

        if config.relative_stylesheets {
            pipeline = pipeline.with(RelativeStylesheets);
        }
        if config.lazy_media {
            pipeline = pipeline.with(LazyMedia);
        }

        pipeline
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.transforms.iter().map(|t| t.name())
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn run<'a>(&self, markup: &'a str, output_path: impl AsRef<Path>) -> Cow<'a, str> {
        if !is_html(output_path.as_ref()) {
            return Cow::Borrowed(markup);
        }

        let mut current = Cow::Borrowed(markup);

        for transform in &self.transforms {
            let next = match transform.apply(&current) {
                Cow::Borrowed(_) => None,
                Cow::Owned(next) => Some(next),
            };

            if let Some(next) = next {
                current = Cow::Owned(next);
            }
        }

        current
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::empty().with(RelativeStylesheets).with(LazyMedia)
    }
}

pub fn is_html(path: &Path) -> bool {
    path.extension().and_then(|x| x.to_str()) == Some(HTML_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <link rel="stylesheet" href="/css/index.css">
    <link href='/css/print.css' media="print" rel='stylesheet'>
    <link rel="icon" href="/favicon.ico">
</head>
<body>
    <!-- <img src="commented.png"> -->
    <img src="/img/hero.jpg" loading="eager" alt="hero">
    <img src="/img/a.png" alt="a">
    <IMG SRC="/img/b.png" DECODING="sync">
    <iframe src="https://example.com/embed" title="embed"></iframe>
    <script>document.write('<img src="x.png">')</script>
</body>
</html>"#;

    #[test]
    fn non_html_path_is_untouched() {
        for path in ["feed.xml", "css/index.css", "index.htm", "robots.txt", "index"] {
            assert_eq!(transform(PAGE, path), PAGE);
        }
    }

    #[test]
    fn rewrites_full_page() {
        let out = transform(PAGE, "_site/index.html");

        assert!(out.contains(r#"<link rel="stylesheet" href="css/index.css">"#));
        assert!(out.contains(r#"<link href='css/print.css' media="print" rel='stylesheet'>"#));
        assert!(out.contains(r#"<link rel="icon" href="/favicon.ico">"#));

        assert!(out.contains(r#"<!-- <img src="commented.png"> -->"#));
        assert!(out.contains(r#"<img src="/img/hero.jpg" loading="eager" alt="hero">"#));
        assert!(
            out.contains(r#"<img loading="lazy" decoding="async" src="/img/a.png" alt="a" />"#)
        );
        assert!(out.contains(r#"<IMG loading="lazy" SRC="/img/b.png" DECODING="sync" />"#));
        assert!(out.contains(
            r#"<iframe loading="lazy" src="https://example.com/embed" title="embed"></iframe>"#
        ));
        assert!(out.contains(r#"<script>document.write('<img src="x.png">')</script>"#));
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            PAGE,
            "",
            "<img>",
            "<img/>",
            "<link rel=stylesheet href=/>",
            "<link rel=stylesheet href=//cdn.example.com/a.css>",
            r#"<link rel="stylesheet" href="/a.css"><img src=/a/><iframe/>"#,
            "<img src='a' <p>",
            "< img src=a>",
        ];

        for sample in samples {
            let once = transform(sample, "index.html");
            let twice = transform(&once, "index.html");
            assert_eq!(once, twice, "sample: {sample}");
        }
    }

    #[test]
    fn empty_pipeline_borrows() {
        let out = Pipeline::empty().run(PAGE, "index.html");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn untouched_document_borrows() {
        let out = Pipeline::default().run("<p>plain</p>", "index.html");
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn pipeline_from_config() {
        let only_lazy = config::Transforms {
            relative_stylesheets: false,
            lazy_media: true,
        };
        let pipeline = Pipeline::from_config(&only_lazy);
        assert_eq!(pipeline.names().collect::<Vec<_>>(), ["lazy-media"]);

        let out = pipeline.run(
            r#"<link rel="stylesheet" href="/a.css"><img src="a.png">"#,
            "a.html",
        );
        assert_eq!(
            out,
            r#"<link rel="stylesheet" href="/a.css"><img loading="lazy" decoding="async" src="a.png" />"#
        );

        let none = config::Transforms {
            relative_stylesheets: false,
            lazy_media: false,
        };
        assert!(Pipeline::from_config(&none).is_empty());
    }
}
