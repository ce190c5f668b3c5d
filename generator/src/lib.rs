use std::path::Path;

pub mod config;
pub mod css;
pub mod filters;
pub mod generator;
pub mod html;
pub mod passthrough;
pub mod transform;

pub use config::Config;
pub use generator::{BuildReport, Generator};
pub use transform::{Pipeline, Transform, transform};

/// Build the site described by `config`. Relative paths in `config` start from `root`.
pub fn build(root: impl AsRef<Path>, config: Config) -> anyhow::Result<BuildReport> {
    let generator = Generator::new(root, config)?;
    generator.build()
}
