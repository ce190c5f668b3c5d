use std::{borrow::Cow, fs, path::Path};

use anyhow::Context as _;
use lightningcss::{
    bundler::{Bundler, FileProvider},
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
};

/// Inline the `@import`s of `input_path` into one stylesheet, minified when
/// `minify` is set.
///
/// If the imports can't be resolved the entry file is used as written, and if
/// minification fails the unminified sheet is used. Only a missing or
/// unreadable entry file is an error.
pub fn bundle(input_path: impl AsRef<Path>, minify: bool) -> anyhow::Result<String> {
    let input_path = input_path.as_ref();

    let provider = FileProvider::new();
    let mut bundler = Bundler::new(&provider, None, ParserOptions::default());

    let mut stylesheet = match bundler.bundle(input_path) {
        Ok(stylesheet) => stylesheet,
        Err(e) => {
            log::warn!(
                "failed to bundle stylesheet {}, using it as is: {:?}",
                input_path.display(),
                e
            );
            let raw = fs::read_to_string(input_path)
                .with_context(|| format!("failed to read stylesheet: {}", input_path.display()))?;
            return Ok(if minify {
                minify_css(&raw).into_owned()
            } else {
                raw
            });
        }
    };

    let minify = minify
        && stylesheet
            .minify(MinifyOptions::default())
            .inspect_err(|e| {
                log::warn!(
                    "failed to minify stylesheet {}, keeping it unminified: {}",
                    input_path.display(),
                    e
                );
            })
            .is_ok();

    let res = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("failed to print stylesheet: {}", e))?;

    Ok(res.code)
}

/// Minify a stylesheet. On any failure the input is returned unchanged.
pub fn minify_css(source: &str) -> Cow<'_, str> {
    match try_minify(source) {
        Ok(code) => Cow::Owned(code),
        Err(e) => {
            log::warn!("failed to minify css, keeping it unminified: {}", e);
            Cow::Borrowed(source)
        }
    }
}

fn try_minify(source: &str) -> anyhow::Result<String> {
    let mut stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let res = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(res.code)
}
