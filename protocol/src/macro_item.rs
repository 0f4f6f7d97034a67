use serde::Deserialize;
use serde::Serialize;

/// Prefix placed in front of the macro name inside the generated markup's alt text.
pub const MACRO_NAME_PREFIX: &str = "github-macros-";

/// A named remote image/GIF resource.
///
/// Identity is `name`; everything else is display metadata that older catalog
/// responses may omit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroItem {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gif_thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_gif: Option<bool>,
}

impl MacroItem {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            width: None,
            height: None,
            thumbnail: None,
            gif_thumbnail: None,
            is_gif: None,
        }
    }

    /// Markdown image markup that renders this macro on GitHub.
    pub fn markup(&self) -> String {
        macro_markup(&self.name, &self.url)
    }
}

pub fn macro_markup(name: &str, url: &str) -> String {
    format!("![{MACRO_NAME_PREFIX}{name}]({url})")
}
