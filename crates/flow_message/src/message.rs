use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Whether the conversation continues after this response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseKind {
    /// More input is expected.
    Prompt,
    /// The flow has ended; the transport should close the conversation.
    Terminal,
}

/// The normalized `(kind, message, choices, media)` tuple every pipeline returns.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Response {
    pub kind: ResponseKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Choices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
}

impl Response {
    pub fn prompt(message: impl Into<String>, choices: Option<Choices>, media: Option<Media>) -> Self {
        Self {
            kind: ResponseKind::Prompt,
            message: message.into(),
            choices,
            media,
        }
    }

    pub fn terminal(message: impl Into<String>, media: Option<Media>) -> Self {
        Self {
            kind: ResponseKind::Terminal,
            message: message.into(),
            choices: None,
            media,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == ResponseKind::Terminal
    }
}

/// One selectable option: the key the flow sees and the label the user sees.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Choice {
    pub key: String,
    pub label: String,
}

/// An ordered key → label set.
///
/// Built either from a plain list (every item is its own key) or from
/// explicit `(key, label)` pairs; insertion order is what the user sees.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(transparent)]
pub struct Choices(Vec<Choice>);

impl Choices {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Each item is both key and label.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut choices = Self::new();
        for item in items {
            let item = item.into();
            choices.insert(item.clone(), item);
        }
        choices
    }

    pub fn pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut choices = Self::new();
        for (key, label) in pairs {
            choices.insert(key, label);
        }
        choices
    }

    /// Adds a choice, replacing the label in place if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let label = label.into();
        match self.0.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.label = label,
            None => self.0.push(Choice { key, label }),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|c| c.key == key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|c| c.key == key).map(|c| c.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Choice> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.key.as_str())
    }
}

impl<'a> IntoIterator for &'a Choices {
    type Item = &'a Choice;
    type IntoIter = std::slice::Iter<'a, Choice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<String>> for Choices {
    fn from(items: Vec<String>) -> Self {
        Self::list(items)
    }
}

impl From<Vec<&str>> for Choices {
    fn from(items: Vec<&str>) -> Self {
        Self::list(items)
    }
}

impl<const N: usize> From<[&str; N]> for Choices {
    fn from(items: [&str; N]) -> Self {
        Self::list(items)
    }
}

impl From<Vec<(String, String)>> for Choices {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::pairs(pairs)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Choices {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::pairs(pairs)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaType {
    #[default]
    Image,
    Document,
    Audio,
    Video,
    Sticker,
}

/// An attachment on an outgoing (or incoming) message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Media {
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Media {
    pub fn new(kind: MediaType, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            filename: None,
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::new(MediaType::Image, url)
    }

    pub fn document(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..Self::new(MediaType::Document, url)
        }
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self::new(MediaType::Audio, url)
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::new(MediaType::Video, url)
    }

    pub fn sticker(url: impl Into<String>) -> Self {
        Self::new(MediaType::Sticker, url)
    }
}

/// The person on the other side of the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Participant {
    pub id: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
}

impl Participant {
    pub fn new(id: String, display_name: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            id,
            display_name,
            phone_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

/// Structured payload for chat transports with native widgets.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPayload {
    Text {
        body: String,
    },
    Media {
        media: Media,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Buttons {
        body: String,
        buttons: Vec<Button>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<Media>,
    },
    List {
        body: String,
        button_text: String,
        sections: Vec<ListSection>,
    },
}
