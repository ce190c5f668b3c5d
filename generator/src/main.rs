use std::{
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use site_generator::{
    Config, build,
    config::CONFIG_FILE,
    filters,
    transform::Pipeline,
};

#[derive(Parser)]
#[command(name = "site-generator", version)]
#[command(about = "Copy assets, bundle stylesheets and post-process rendered HTML")]
struct Cli {
    /// Site config file [default: site.yaml, if present]
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Input dir, overrides `dir.input`
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Output dir, overrides `dir.output`
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site into the output dir
    Build {
        /// Fail if the output dir exists instead of deleting it
        #[arg(long)]
        no_clean: bool,
    },
    /// Run the HTML transforms over one file and print the result
    Transform {
        file: PathBuf,
        /// Output path used to decide whether the file is HTML [default: FILE]
        #[arg(long)]
        output_path: Option<PathBuf>,
    },
    /// Apply a template filter to a value and print the result
    Filter {
        /// One of: cacheBust, readFile, toRelativeFromRoot, readableDate,
        /// htmlDateString, isoDate, cssmin
        name: String,
        value: String,
    },
    /// Print the resolved config
    Config,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let (root, config) = load_config(&cli)?;

    match cli.command {
        Command::Build { no_clean } => {
            let dst_dir = config.resolve_dirs(&root)?.output;
            if !no_clean && dst_dir.try_exists()? {
                log::warn!("dest dir `{}` already exists, delete it...", dst_dir.display());
                fs::remove_dir_all(&dst_dir)
                    .with_context(|| format!("failed to delete {}", dst_dir.display()))?;
            }

            let report = build(&root, config)?;
            log::info!(
                "done: {} documents ({} rewritten), {} files copied, {} stylesheets",
                report.documents,
                report.rewritten,
                report.copied,
                report.stylesheets
            );
        }
        Command::Transform { file, output_path } => {
            let markup = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let output_path = output_path.unwrap_or(file);

            let pipeline = Pipeline::from_config(&config.transforms);
            let out = pipeline.run(&markup, &output_path);

            std::io::stdout().lock().write_all(out.as_bytes())?;
        }
        Command::Filter { name, value } => {
            println!("{}", filters::apply(&root, &name, &value)?);
        }
        Command::Config => {
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}

/// The config and the directory its relative paths start from.
fn load_config(cli: &Cli) -> anyhow::Result<(PathBuf, Config)> {
    let (root, config) = match &cli.config {
        Some(path) => (config_root(path), Config::from_file(path)?),
        None if Path::new(CONFIG_FILE).exists() => {
            log::info!("read config from: {}", CONFIG_FILE);
            (PathBuf::from("."), Config::from_file(CONFIG_FILE)?)
        }
        None => {
            log::info!("no {} found, use default config", CONFIG_FILE);
            (PathBuf::from("."), Config::default())
        }
    };

    let config = config.with_dirs(cli.input.clone(), cli.output.clone())?;

    Ok((root, config))
}

fn config_root(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
