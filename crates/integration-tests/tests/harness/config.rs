//! Configuration for tests, built as TOML text so the loader runs too

use indoc::formatdoc;
use sigil_config::Config;

pub struct ConfigBuilder {
    gemini_endpoint: String,
    openai_endpoint: String,
    default_provider: String,
    request_timeout: String,
    max_retries: u32,
}

impl ConfigBuilder {
    pub fn new(gemini_base: &str, openai_base: &str) -> Self {
        Self {
            gemini_endpoint: format!("{gemini_base}/v1beta/models"),
            openai_endpoint: format!("{openai_base}/v1/images"),
            default_provider: "gemini".to_owned(),
            request_timeout: "5s".to_owned(),
            max_retries: 0,
        }
    }

    pub fn default_provider(mut self, name: &str) -> Self {
        self.default_provider = name.to_owned();
        self
    }

    pub fn request_timeout(mut self, timeout: &str) -> Self {
        self.request_timeout = timeout.to_owned();
        self
    }

    /// Adapter-level resends; off unless a test asks for them
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn build(self) -> Config {
        let toml = formatdoc! {r#"
            [imagegen]
            provider = "{default_provider}"

            [imagegen.providers.gemini]
            api_key = "test-key"
            endpoint = "{gemini_endpoint}"
            model = "imagen-test"
            request_timeout = "{request_timeout}"
            max_retries = {max_retries}
            retry_interval = "10ms"

            [imagegen.providers.openai]
            api_key = "test-key"
            endpoint = "{openai_endpoint}"
            model = "gpt-image-1"
            response_format = "b64_json"
            request_timeout = "{request_timeout}"
            max_retries = {max_retries}
            retry_interval = "10ms"

            [prompts]
            directory = '{prompts}'
        "#,
            default_provider = self.default_provider,
            gemini_endpoint = self.gemini_endpoint,
            openai_endpoint = self.openai_endpoint,
            request_timeout = self.request_timeout,
            max_retries = self.max_retries,
            prompts = super::PROMPTS_DIR,
        };

        Config::from_toml(&toml).expect("test configuration must load")
    }
}
