use std::path::PathBuf;

use clap::Parser;

/// Sigil avatar generator
#[derive(Debug, Parser)]
#[command(name = "sigil", about = "Generate an avatar image through a configured image generation provider")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sigil.toml", env = "SIGIL_CONFIG")]
    pub config: PathBuf,

    /// Prompt template to render (defaults to `job.template`)
    #[arg(long)]
    pub template: Option<String>,

    /// Character name
    #[arg(long)]
    pub name: Option<String>,

    /// Character gender
    #[arg(long)]
    pub gender: Option<String>,

    /// Character class
    #[arg(long)]
    pub klass: Option<String>,

    /// Character trait (repeatable)
    #[arg(long = "trait", value_name = "TRAIT")]
    pub traits: Vec<String>,

    /// Provider override (defaults to `imagegen.provider`)
    #[arg(long, env = "SIGIL_PROVIDER")]
    pub provider: Option<String>,

    /// Storage key of a reference image (repeatable)
    #[arg(long = "reference", value_name = "KEY")]
    pub references: Vec<String>,

    /// Local reference image file (repeatable)
    #[arg(long = "reference-path", value_name = "PATH")]
    pub reference_paths: Vec<PathBuf>,

    /// Where to write an inline image (defaults to `avatar.<ext>`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override `telemetry.log_filter`
    #[arg(long, env = "SIGIL_LOG")]
    pub log_filter: Option<String>,
}
