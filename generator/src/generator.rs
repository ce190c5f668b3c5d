use std::{
    borrow::Cow,
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use normalize_path::NormalizePath as _;
use rayon::prelude::*;

use crate::{
    config::{Config, SiteDirs},
    css, passthrough,
    transform::{self, Pipeline},
};

pub struct Generator {
    src_dir: PathBuf,
    dst_dir: PathBuf,
    config: Config,
    pipeline: Pipeline,

    /// Paths relative to `src_dir` that are never walked for documents.
    skip: Vec<PathBuf>,
}

/// What one build produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// HTML documents written.
    pub documents: usize,
    /// Documents changed by at least one transform.
    pub rewritten: usize,
    /// Files copied by passthrough entries.
    pub copied: usize,
    /// CSS bundles written.
    pub stylesheets: usize,
}

impl Generator {
    /// `root` is the directory the relative paths in `config` start from.
    pub fn new(root: impl AsRef<Path>, config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let SiteDirs {
            input: src_dir,
            output: dst_dir,
        } = config.resolve_dirs(root)?;

        if !src_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "input dir not found: {}",
                src_dir.display()
            ));
        }

        if dst_dir.try_exists()? {
            return Err(anyhow::anyhow!(
                "output dir already exists: {}",
                dst_dir.display()
            ));
        }

        let mut skip = vec![config.dir.includes.normalize()];
        skip.extend(config.passthrough.iter().map(|p| p.from().normalize()));
        if let Ok(output) = dst_dir.strip_prefix(&src_dir) {
            skip.push(output.to_path_buf());
        }

        let pipeline = Pipeline::from_config(&config.transforms);

        Ok(Self {
            src_dir,
            dst_dir,
            config,
            pipeline,
            skip,
        })
    }

    pub fn build(self) -> anyhow::Result<BuildReport> {
        log::info!("create dest dir: {}", self.dst_dir.display());
        fs::create_dir_all(&self.dst_dir)?;

        let copied = passthrough::copy_all(&self.config.passthrough, &self.src_dir, &self.dst_dir)?;

        let stylesheets = self.build_css()?;

        let documents = self.collect_documents()?;
        log::info!(
            "process {} documents with transforms: [{}]",
            documents.len(),
            self.pipeline.names().collect::<Vec<_>>().join(", ")
        );

        let rewritten = documents
            .par_iter()
            .map(|rel_path| self.build_document(rel_path))
            .collect::<anyhow::Result<Vec<bool>>>()?
            .into_iter()
            .filter(|&rewritten| rewritten)
            .count();

        Ok(BuildReport {
            documents: documents.len(),
            rewritten,
            copied,
            stylesheets,
        })
    }

    fn build_css(&self) -> anyhow::Result<usize> {
        for bundle in &self.config.css.bundles {
            log::info!(
                "bundle css: {} -> {}",
                bundle.entry.display(),
                bundle.output.display()
            );

            let code = css::bundle(self.src_dir.join(&bundle.entry), self.config.css.minify)
                .with_context(|| format!("failed to bundle {}", bundle.entry.display()))?;

            write_into(self.dst_dir.join(&bundle.output), code.as_bytes())?;
        }

        Ok(self.config.css.bundles.len())
    }

    /// All `.html` files under the input dir, relative to it, in path order.
    fn collect_documents(&self) -> anyhow::Result<Vec<PathBuf>> {
        let src_dir = self.src_dir.clone();
        let skip = self.skip.clone();

        let mut walker = ignore::WalkBuilder::new(&self.src_dir);
        walker
            .standard_filters(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let skipped = entry
                    .path()
                    .strip_prefix(&src_dir)
                    .is_ok_and(|rel| skip.iter().any(|s| rel == s));
                if skipped {
                    log::debug!("skip: {}", entry.path().display());
                }
                !skipped
            });

        let mut documents = Vec::new();

        for entry in walker.build() {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type().is_some_and(|t| t.is_file()) || !transform::is_html(path) {
                continue;
            }

            let Ok(rel_path) = path.strip_prefix(&self.src_dir) else {
                log::warn!("cannot get relative path for {}", path.display());
                continue;
            };

            documents.push(rel_path.to_path_buf());
        }

        Ok(documents)
    }

    /// Returns whether any transform changed the document.
    fn build_document(&self, rel_path: &Path) -> anyhow::Result<bool> {
        let src_path = self.src_dir.join(rel_path);
        let dst_path = self.dst_dir.join(rel_path);

        log::info!("build html: {}", rel_path.display());

        let markup = fs::read_to_string(&src_path)
            .with_context(|| format!("failed to read {}", src_path.display()))?;

        let markup = self.pipeline.run(&markup, &dst_path);
        let rewritten = matches!(markup, Cow::Owned(_));

        let content = if self.config.html.minify {
            Cow::Owned(minify_html::minify(markup.as_bytes(), &minify_html::Cfg::new()))
        } else {
            Cow::Borrowed(markup.as_bytes())
        };

        write_into(&dst_path, &content)
            .with_context(|| format!("failed to write {}", dst_path.display()))?;

        Ok(rewritten)
    }
}

fn write_into(output_path: impl AsRef<Path>, content: &[u8]) -> std::io::Result<()> {
    let output_path = output_path.as_ref();

    if let Some(parent_dir) = output_path.parent() {
        fs::create_dir_all(parent_dir)?;
    }
    fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(output_path)?
        .write_all(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_existing_output() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("src")).unwrap();
        fs::create_dir_all(root.path().join("_site")).unwrap();

        let err = Generator::new(root.path(), Config::default()).err().unwrap();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn refuses_missing_input() {
        let root = tempfile::tempdir().unwrap();
        assert!(Generator::new(root.path(), Config::default()).is_err());
    }

    #[test]
    fn skips_output_inside_input() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::default()
            .with_dirs(Some(".".into()), Some("_site".into()))
            .unwrap();

        let generator = Generator::new(root.path(), config).unwrap();
        assert!(generator.skip.contains(&PathBuf::from("_site")));
        assert!(generator.skip.contains(&PathBuf::from("_includes")));
        assert!(generator.skip.contains(&PathBuf::from("robots.txt")));
    }

    #[test]
    fn output_next_to_the_site_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/index.html"), "<p>x</p>").unwrap();

        let config = Config::default()
            .with_dirs(None, Some("../public".into()))
            .unwrap();
        Generator::new(&root, config).unwrap().build().unwrap();

        assert!(tmp.path().join("public/index.html").exists());
        assert!(!root.join("public").exists());
    }

    #[test]
    fn refuses_output_that_holds_the_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        fs::create_dir_all(root.join("src")).unwrap();

        let config = Config::default()
            .with_dirs(None, Some("../proj".into()))
            .unwrap();
        assert!(Generator::new(&root, config).is_err());
        assert!(root.join("src").is_dir());
    }
}
