use serde::Deserialize;
use serde::Serialize;

/// How a macro ended up in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageTrigger {
    /// Picked from the popup.
    Click,
    /// Expanded inline from a `$name$` pattern.
    Direct,
}

impl UsageTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageTrigger::Click => "click",
            UsageTrigger::Direct => "direct",
        }
    }
}
