use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::Context as _;
use normalize_path::NormalizePath as _;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "site.yaml";

/// Site configuration. Loaded once, never changed during a build.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dir: Dirs,

    #[serde(default = "default_passthrough")]
    pub passthrough: Vec<Passthrough>,

    #[serde(default)]
    pub css: Css,

    #[serde(default)]
    pub transforms: Transforms,

    #[serde(default)]
    pub html: Html,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Dirs {
    #[serde(default = "default_input_dir")]
    pub input: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output: PathBuf,
    /// Relative to `input`. Never treated as documents.
    #[serde(default = "default_includes_dir")]
    pub includes: PathBuf,
}

/// A file or directory copied verbatim from the input tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Passthrough {
    /// Same relative path on both sides.
    Path(PathBuf),
    Mapped { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Css {
    #[serde(default = "default_true")]
    pub minify: bool,
    #[serde(default)]
    pub bundles: Vec<CssBundle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CssBundle {
    /// Relative to the input dir.
    pub entry: PathBuf,
    /// Relative to the output dir.
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transforms {
    #[serde(default = "default_true")]
    pub relative_stylesheets: bool,
    #[serde(default = "default_true")]
    pub lazy_media: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Html {
    #[serde(default)]
    pub minify: bool,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .with_context(|| format!("failed to open config: {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the input and/or output dir. Used for command line overrides,
    /// before the config is handed to the generator.
    pub fn with_dirs(
        mut self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        if let Some(input) = input {
            self.dir.input = input;
        }
        if let Some(output) = output {
            self.dir.output = output;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        // `..`, `../..`: always an ancestor of the site root
        let output_is_ancestor = self
            .dir
            .output
            .components()
            .all(|c| matches!(c, Component::CurDir | Component::ParentDir));

        // paths leaving the root are compared once resolved, see `resolve_dirs`
        let contains_input = match (
            self.dir.input.try_normalize(),
            self.dir.output.try_normalize(),
        ) {
            (Some(input), Some(output)) => input.starts_with(output),
            _ => false,
        };

        if output_is_ancestor || contains_input {
            anyhow::bail!(
                "output dir `{}` must not contain the input dir `{}`",
                self.dir.output.display(),
                self.dir.input.display()
            );
        }

        check_relative("dir.includes", &self.dir.includes)?;

        for entry in &self.passthrough {
            check_relative("passthrough", entry.from())?;
            check_relative("passthrough", entry.to())?;
        }

        for bundle in &self.css.bundles {
            check_relative("css.bundles.entry", &bundle.entry)?;
            check_relative("css.bundles.output", &bundle.output)?;
        }

        Ok(())
    }

    /// Resolve the input and output dirs against `root`, the directory the
    /// config's relative paths start from.
    ///
    /// Leading `..` are kept, so `../public` is the sibling of `root`. Fails if
    /// the output dir is, or contains, the input dir or `root` itself.
    pub fn resolve_dirs(&self, root: impl AsRef<Path>) -> anyhow::Result<SiteDirs> {
        let root = root.as_ref();
        let root = fs::canonicalize(root)
            .with_context(|| format!("failed to resolve site root: {}", root.display()))?;

        let input = resolve_dir(&root, &self.dir.input)?;
        let output = resolve_dir(&root, &self.dir.output)?;

        if input.starts_with(&output) || root.starts_with(&output) {
            anyhow::bail!(
                "output dir `{}` must not contain the input dir `{}` or the site root `{}`",
                output.display(),
                input.display(),
                root.display()
            );
        }

        Ok(SiteDirs { input, output })
    }
}

/// Absolute input and output dirs of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDirs {
    pub input: PathBuf,
    pub output: PathBuf,
}

fn resolve_dir(root: &Path, dir: &Path) -> anyhow::Result<PathBuf> {
    root.join(dir)
        .try_normalize()
        .with_context(|| format!("`{}` goes above the filesystem root", dir.display()))
}

impl Passthrough {
    pub fn from(&self) -> &Path {
        match self {
            Self::Path(path) | Self::Mapped { from: path, .. } => path,
        }
    }

    pub fn to(&self) -> &Path {
        match self {
            Self::Path(path) | Self::Mapped { to: path, .. } => path,
        }
    }
}

/// The path must stay inside the directory it is relative to.
fn check_relative(field: &str, path: &Path) -> anyhow::Result<()> {
    let escapes = path.is_absolute()
        || path.has_root()
        || path.try_normalize().is_none_or(|p| {
            p.as_os_str().is_empty() || p.components().any(|c| c == Component::ParentDir)
        });

    if escapes {
        anyhow::bail!(
            "`{}` in {} must be a relative path inside its directory",
            path.display(),
            field
        );
    }

    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: Dirs::default(),
            passthrough: default_passthrough(),
            css: Css::default(),
            transforms: Transforms::default(),
            html: Html::default(),
        }
    }
}

impl Default for Dirs {
    fn default() -> Self {
        Self {
            input: default_input_dir(),
            output: default_output_dir(),
            includes: default_includes_dir(),
        }
    }
}

impl Default for Css {
    fn default() -> Self {
        Self {
            minify: true,
            bundles: Vec::new(),
        }
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self {
            relative_stylesheets: true,
            lazy_media: true,
        }
    }
}

fn default_input_dir() -> PathBuf {
    "src".into()
}
fn default_output_dir() -> PathBuf {
    "_site".into()
}
fn default_includes_dir() -> PathBuf {
    "_includes".into()
}
fn default_passthrough() -> Vec<Passthrough> {
    [
        "css",
        "images",
        "favicon.svg",
        "favicon.ico",
        "apple-touch-icon.png",
        "robots.txt",
    ]
    .into_iter()
    .map(|p| Passthrough::Path(p.into()))
    .collect()
}
const fn default_true() -> bool {
    true
}
