use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::TemplateError,
    types::{Attributes, ExampleImage, Prompt},
};

/// Prompt template as stored in the template store
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDefinition {
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// User prompt body with `{{ name }}` placeholders
    pub user_prompt_template: String,
    #[serde(default)]
    pub example_images: Vec<ExampleImage>,
}

/// Source of prompt templates keyed by identifier
pub trait TemplateSource: Send + Sync {
    /// Look up a template; `Ok(None)` when no such template exists
    fn fetch(&self, template_id: &str) -> Result<Option<TemplateDefinition>, TemplateError>;
}

impl TemplateSource for IndexMap<String, TemplateDefinition> {
    fn fetch(&self, template_id: &str) -> Result<Option<TemplateDefinition>, TemplateError> {
        Ok(self.get(template_id).cloned())
    }
}

/// Templates stored as `<id>.toml` files in one directory
#[derive(Debug, Clone)]
pub struct TemplateDirectory {
    root: PathBuf,
}

impl TemplateDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for TemplateDirectory {
    fn fetch(&self, template_id: &str) -> Result<Option<TemplateDefinition>, TemplateError> {
        // Identifiers never address anything outside the template directory
        if template_id.is_empty()
            || !template_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Ok(None);
        }

        let path = self.root.join(format!("{template_id}.toml"));

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TemplateError::Read {
                    template: template_id.to_owned(),
                    source,
                });
            }
        };

        toml::from_str(&raw).map(Some).map_err(|source| TemplateError::Parse {
            template: template_id.to_owned(),
            source,
        })
    }
}

/// Renders prompts from templates
#[derive(Clone)]
pub struct PromptLoader {
    source: Arc<dyn TemplateSource>,
}

impl PromptLoader {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self { source }
    }

    /// Loader backed by a directory of `<id>.toml` templates
    pub fn from_directory(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(TemplateDirectory::new(root)))
    }

    /// Render the named template with the given attributes
    ///
    /// Every `{{ name }}` placeholder must have a matching attribute. The
    /// template's example images are listed after the rendered body.
    pub fn load(&self, template_id: &str, attributes: &Attributes) -> Result<Prompt, TemplateError> {
        let template = self
            .source
            .fetch(template_id)?
            .ok_or_else(|| TemplateError::Missing(template_id.to_owned()))?;

        let mut text = render(template_id, &template.user_prompt_template, attributes)?;

        if !template.example_images.is_empty() {
            text = append_example_images(&text, &template.example_images);
        }

        tracing::debug!(
            template = template_id,
            characters = text.len(),
            examples = template.example_images.len(),
            "prompt rendered"
        );

        Ok(Prompt {
            system_prompt: template.system_prompt,
            text,
            example_images: template.example_images,
        })
    }
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("must be valid regex"))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute every `{{ ... }}` in `body`
///
/// Placeholders that are not a bare identifier cannot be resolved and are
/// reported verbatim.
fn render(template_id: &str, body: &str, attributes: &Attributes) -> Result<String, TemplateError> {
    let mut unresolved: Vec<String> = Vec::new();

    let rendered = placeholder().replace_all(body, |captures: &regex::Captures<'_>| {
        let name = &captures[1];
        let value = is_identifier(name)
            .then(|| attributes.get(name).and_then(render_value))
            .flatten();

        value.unwrap_or_else(|| {
            let label = if is_identifier(name) { name } else { &captures[0] };
            if !unresolved.iter().any(|n| n == label) {
                unresolved.push(label.to_owned());
            }
            String::new()
        })
    });

    if !unresolved.is_empty() {
        return Err(TemplateError::UnresolvedPlaceholders {
            template: template_id.to_owned(),
            names: unresolved,
        });
    }

    Ok(rendered.into_owned())
}

/// Display form of an attribute; `None` for null
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(items.iter().filter_map(render_value).collect::<Vec<_>>().join(", ")),
        Value::Object(_) => Some(value.to_string()),
    }
}

fn append_example_images(text: &str, examples: &[ExampleImage]) -> String {
    let mut lines = vec![text.to_owned(), String::new(), "Reference example images:".to_owned()];

    lines.extend(examples.iter().map(|example| {
        let description = format!("- {}: {}", example.label, example.url);
        match example.notes.as_deref().map(str::trim).filter(|notes| !notes.is_empty()) {
            Some(notes) => format!("{description} ({notes})"),
            None => description,
        }
    }));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attributes(pairs: &[(&str, Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    fn loader_with(id: &str, template: TemplateDefinition) -> PromptLoader {
        let mut templates = IndexMap::new();
        templates.insert(id.to_owned(), template);
        PromptLoader::new(Arc::new(templates))
    }

    fn avatar_template() -> TemplateDefinition {
        TemplateDefinition {
            system_prompt: Some("Keep the house style.".to_owned()),
            user_prompt_template: "Portrait of {{ name }}, a {{klass}} who is {{ traits }}.".to_owned(),
            example_images: vec![
                ExampleImage {
                    label: "A".to_owned(),
                    url: "u1".to_owned(),
                    notes: None,
                },
                ExampleImage {
                    label: "B".to_owned(),
                    url: "u2".to_owned(),
                    notes: Some("n".to_owned()),
                },
            ],
        }
    }

    #[test]
    fn renders_attributes_and_examples() {
        let loader = loader_with("avatar", avatar_template());
        let attrs = attributes(&[
            ("name", json!("Astra")),
            ("klass", json!("Wizard")),
            ("traits", json!(["Clever", "Curious"])),
        ]);

        let prompt = loader.load("avatar", &attrs).unwrap();

        insta::assert_snapshot!(prompt.text, @r"
        Portrait of Astra, a Wizard who is Clever, Curious.

        Reference example images:
        - A: u1
        - B: u2 (n)
        ");
        assert_eq!(prompt.system_prompt.as_deref(), Some("Keep the house style."));
        assert_eq!(prompt.example_images.len(), 2);
    }

    #[test]
    fn rendering_is_deterministic() {
        let loader = loader_with("avatar", avatar_template());
        let attrs = attributes(&[
            ("name", json!("Astra")),
            ("klass", json!("Wizard")),
            ("traits", json!(["Clever"])),
        ]);

        let first = loader.load("avatar", &attrs).unwrap();
        let second = loader.load("avatar", &attrs).unwrap();

        assert_eq!(first.text, second.text);
    }

    #[test]
    fn unresolved_placeholders_are_errors() {
        let loader = loader_with("avatar", avatar_template());
        let attrs = attributes(&[("name", json!("Astra")), ("traits", Value::Null)]);

        let err = loader.load("avatar", &attrs).unwrap_err();

        match err {
            TemplateError::UnresolvedPlaceholders { template, names } => {
                assert_eq!(template, "avatar");
                assert_eq!(names, vec!["klass".to_owned(), "traits".to_owned()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_placeholders_are_unresolved() {
        let template = TemplateDefinition {
            system_prompt: None,
            user_prompt_template: "{{ first-name }} {{ name | upper }} {{name}}".to_owned(),
            example_images: Vec::new(),
        };
        let loader = loader_with("typo", template);
        let attrs = attributes(&[("name", json!("Astra")), ("first-name", json!("Astra"))]);

        let err = loader.load("typo", &attrs).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Prompt template 'typo' has unresolved placeholders: {{ first-name }}, {{ name | upper }}"
        );
    }

    #[test]
    fn body_is_not_trimmed() {
        let template = TemplateDefinition {
            system_prompt: None,
            user_prompt_template: "Portrait of {{ name }}\n".to_owned(),
            example_images: Vec::new(),
        };
        let loader = loader_with("avatar", template);

        let prompt = loader.load("avatar", &attributes(&[("name", json!("Astra"))])).unwrap();

        assert_eq!(prompt.text, "Portrait of Astra\n");
    }

    #[test]
    fn missing_template() {
        let loader = PromptLoader::new(Arc::new(IndexMap::<String, TemplateDefinition>::new()));

        let err = loader.load("avatar", &Attributes::new()).unwrap_err();

        assert_eq!(err.to_string(), "No prompt template named 'avatar'");
    }

    #[test]
    fn blank_notes_are_omitted() {
        let template = TemplateDefinition {
            system_prompt: None,
            user_prompt_template: "Plain body".to_owned(),
            example_images: vec![ExampleImage {
                label: "C".to_owned(),
                url: "u3".to_owned(),
                notes: Some("  ".to_owned()),
            }],
        };
        let loader = loader_with("plain", template);

        let prompt = loader.load("plain", &Attributes::new()).unwrap();

        assert!(prompt.text.ends_with("Reference example images:\n- C: u3"));
        assert!(prompt.system_prompt.is_none());
    }

    #[test]
    fn scalar_values_render_in_display_form() {
        let template = TemplateDefinition {
            system_prompt: None,
            user_prompt_template: "{{ level }} {{ hero }}".to_owned(),
            example_images: Vec::new(),
        };
        let loader = loader_with("scalars", template);
        let attrs = attributes(&[("level", json!(7)), ("hero", json!(true))]);

        assert_eq!(loader.load("scalars", &attrs).unwrap().text, "7 true");
    }

    #[test]
    fn loads_templates_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("badge.toml"),
            "system_prompt = \"Flat icons\"\nuser_prompt_template = \"Badge for {{ name }}\"\n",
        )
        .unwrap();
        let loader = PromptLoader::from_directory(dir.path());

        let prompt = loader.load("badge", &attributes(&[("name", json!("Astra"))])).unwrap();
        assert_eq!(prompt.text, "Badge for Astra");

        assert!(matches!(
            loader.load("../badge", &Attributes::new()),
            Err(TemplateError::Missing(_))
        ));
        assert!(matches!(loader.load("nope", &Attributes::new()), Err(TemplateError::Missing(_))));
    }

    #[test]
    fn malformed_template_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.toml"), "system_prompt = \"no body\"\n").unwrap();
        let loader = PromptLoader::from_directory(dir.path());

        assert!(matches!(
            loader.load("broken", &Attributes::new()),
            Err(TemplateError::Parse { .. })
        ));
    }

    #[test]
    fn bundled_avatar_template_renders() {
        let loader = PromptLoader::from_directory(concat!(env!("CARGO_MANIFEST_DIR"), "/../../prompts"));
        let attrs = attributes(&[
            ("name", json!("storm mage")),
            ("gender", json!("female")),
            ("klass", json!("Wizard")),
            ("traits", json!(["Brave"])),
        ]);

        let prompt = loader.load("avatar", &attrs).unwrap();

        assert!(prompt.text.contains("storm mage"));
        assert!(prompt.text.contains("Reference example images:"));
        assert!(prompt.system_prompt.is_some());
    }
}
