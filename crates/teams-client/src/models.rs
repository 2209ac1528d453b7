//! Teams webhook payload types
//!
//! Incoming webhooks accept the legacy `MessageCard` shape; only the
//! `summary`, `text` and `themeColor` fields are used.

use serde::{Deserialize, Serialize};

/// Amber, used for the first alert of a container.
pub const THEME_COLOR_WARNING: &str = "#FFA500";
/// Red, used when a container keeps restarting after a previous alert.
pub const THEME_COLOR_CRITICAL: &str = "#FF0000";
/// Gold, used for informational notices such as the startup message.
pub const THEME_COLOR_INFO: &str = "#FFD700";

/// Message posted to a Teams incoming webhook
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsMessage {
    /// Short summary, shown in notifications and the activity feed
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Main body (Teams renders a markdown subset)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Hex color of the card accent bar, e.g. `#FF0000`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub theme_color: String,
}

impl TeamsMessage {
    /// Create a message from its three parts
    pub fn new(
        summary: impl Into<String>,
        text: impl Into<String>,
        theme_color: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            text: text.into(),
            theme_color: theme_color.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let msg = TeamsMessage::new("pod restarted", "details", THEME_COLOR_CRITICAL);
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "summary": "pod restarted",
                "text": "details",
                "themeColor": "#FF0000",
            })
        );
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let msg = TeamsMessage::new("only summary", "", "");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert_eq!(json, r#"{"summary":"only summary"}"#);
    }
}
