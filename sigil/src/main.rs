#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::{path::PathBuf, sync::Arc};

use args::Args;
use base64::Engine;
use clap::Parser;
use sigil_config::Config;
use sigil_imagegen::{BlobResolver, Client, DirectoryBlobStore, PromptLoader};
use sigil_worker::{Avatar, EntityStore, ImageGenerationJob, ImagePayload, JobOutcome, JobRunner, MemoryStore, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    sigil_telemetry::init(&config.telemetry, args.log_filter.as_deref())?;

    tracing::info!(config_path = %args.config.display(), "starting sigil");

    let avatar = avatar_from_args(&args);
    let policy = RetryPolicy::from_config(&config.job)?;

    let mut builder = Client::builder(Arc::new(config.imagegen), PromptLoader::from_directory(&config.prompts.directory));
    if let Some(root) = &config.storage.root {
        builder = builder.blob_resolver(Arc::new(DirectoryBlobStore::new(root)) as Arc<dyn BlobResolver>);
    }
    let client = builder.build();

    let store = Arc::new(MemoryStore::new());
    let entity_id = store.insert(avatar.attributes());

    let mut job = ImageGenerationJob::from_config(client, Arc::clone(&store) as Arc<dyn EntityStore>, &config.job)
        .with_reference_keys(args.references)
        .with_reference_paths(args.reference_paths)
        .with_provider(args.provider);
    if let Some(template) = args.template {
        job = job.with_template(template);
    }

    match JobRunner::new(policy).run(&job, entity_id).await? {
        JobOutcome::Completed(payload) => write_payload(&payload, args.output)?,
        JobOutcome::Failed(message) | JobOutcome::Discarded(message) => {
            anyhow::bail!("image generation failed: {message}")
        }
    }

    Ok(())
}

/// Default avatar with any fields given on the command line replaced
fn avatar_from_args(args: &Args) -> Avatar {
    let defaults = Avatar::defaults();

    Avatar {
        name: args.name.clone().unwrap_or(defaults.name),
        gender: args.gender.clone().unwrap_or(defaults.gender),
        klass: args.klass.clone().unwrap_or(defaults.klass),
        traits: if args.traits.is_empty() {
            defaults.traits
        } else {
            args.traits.clone()
        },
    }
}

fn write_payload(payload: &ImagePayload, output: Option<PathBuf>) -> anyhow::Result<()> {
    match payload {
        ImagePayload::Inline { data, mime_type } => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map_err(|e| anyhow::anyhow!("provider returned invalid base64 image data: {e}"))?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("avatar.{}", extension_for(mime_type))));

            std::fs::write(&path, &bytes).map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;

            tracing::info!(path = %path.display(), bytes = bytes.len(), mime_type = %mime_type, "image written");
            println!("{}", path.display());
        }
        ImagePayload::Remote { uri } => {
            if output.is_some() {
                tracing::warn!("provider returned a remote image, ignoring --output");
            }
            println!("{uri}");
        }
    }

    Ok(())
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}
