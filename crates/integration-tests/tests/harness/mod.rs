#![allow(dead_code)]

pub mod config;

use std::sync::Arc;

use sigil_imagegen::{Attributes, Client, PromptLoader};
use sigil_worker::Avatar;
use wiremock::MockServer;

/// Bundled prompt templates shipped with the repository
pub const PROMPTS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../prompts");

/// Stubbed Gemini and OpenAI backends plus a client wired to them
pub struct Backends {
    pub gemini: MockServer,
    pub openai: MockServer,
    pub client: Client,
}

impl Backends {
    pub async fn start() -> Self {
        Self::start_with(|builder| builder).await
    }

    /// Start both backends, letting the caller adjust the configuration
    pub async fn start_with(adjust: impl FnOnce(config::ConfigBuilder) -> config::ConfigBuilder) -> Self {
        let gemini = MockServer::start().await;
        let openai = MockServer::start().await;

        let config = adjust(config::ConfigBuilder::new(&gemini.uri(), &openai.uri())).build();
        let client = Client::builder(Arc::new(config.imagegen), PromptLoader::from_directory(PROMPTS_DIR)).build();

        Self { gemini, openai, client }
    }
}

/// Attributes of the default avatar (Astra, the non-binary Wizard)
pub fn astra() -> Attributes {
    Avatar::defaults().attributes()
}
