use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigil_imagegen::Attributes;

/// Character an avatar image is generated for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub name: String,
    pub gender: String,
    pub klass: String,
    pub traits: Vec<String>,
}

impl Avatar {
    /// Character used when the caller leaves fields unset
    pub fn defaults() -> Self {
        Self {
            name: "Astra".to_owned(),
            gender: "non-binary".to_owned(),
            klass: "Wizard".to_owned(),
            traits: vec!["Clever".to_owned(), "Curious".to_owned()],
        }
    }

    /// Template attributes, keyed by the placeholder names the avatar template uses
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_owned(), Value::from(self.name.as_str()));
        attributes.insert("gender".to_owned(), Value::from(self.gender.as_str()));
        attributes.insert("klass".to_owned(), Value::from(self.klass.as_str()));
        attributes.insert(
            "traits".to_owned(),
            Value::Array(self.traits.iter().map(|t| Value::from(t.as_str())).collect()),
        );
        attributes
    }
}

impl Default for Avatar {
    fn default() -> Self {
        Self::defaults()
    }
}
