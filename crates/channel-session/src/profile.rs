//! Static description of one web chat integration.

use action_locator::{CandidateSet, Capability, LocatorCandidate};
use chatrelay_core_types::ChannelId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: String,
    pub chat_url: String,
    pub home_url: String,
    pub login_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Press Enter in the input when no send button resolves.
    #[serde(default = "default_true")]
    pub submit_with_enter: bool,
    #[serde(default)]
    pub locators: CandidateSet,
}

fn default_true() -> bool {
    true
}

impl ChannelProfile {
    pub fn candidates(&self, capability: Capability) -> &[LocatorCandidate] {
        self.locators.get(capability)
    }

    /// Capabilities a session cannot work without.
    pub fn missing_capabilities(&self) -> Vec<Capability> {
        [Capability::InputBox, Capability::ResponseContainer]
            .into_iter()
            .filter(|cap| !self.locators.is_configured(*cap))
            .collect()
    }

    /// ByteDance Doubao web chat.
    pub fn doubao() -> Self {
        let locators = CandidateSet::new()
            .with(
                Capability::InputBox,
                candidates(&[
                    ("textarea[placeholder*=\"请输入\"]", "prompt textarea"),
                    ("textarea[placeholder*=\"问问\"]", "ask textarea"),
                    ("input[type=\"text\"]", "text input"),
                    ("textarea", "any textarea"),
                    ("[contenteditable=\"true\"]", "rich editor"),
                    ("[data-testid=\"chat-input\"]", "chat input test id"),
                    ("[class*=\"input\"]", "input class"),
                    ("[class*=\"textarea\"]", "textarea class"),
                ]),
            )
            .with(
                Capability::SendButton,
                candidates(&[
                    ("[data-testid=\"send-button\"]", "send test id"),
                    ("button[type=\"submit\"]", "submit button"),
                    (".send-button", "send class"),
                    ("[class*=\"send\"]", "send-like class"),
                    ("button:has-text(\"发送\")", "send label"),
                    ("button:has-text(\"提交\")", "submit label"),
                    ("[aria-label*=\"发送\"]", "send aria label"),
                ]),
            )
            .with(
                Capability::ResponseContainer,
                candidates(&[
                    ("[data-testid=\"message-content\"]", "message test id"),
                    (".message-content", "message content"),
                    (".response-content", "response content"),
                    ("[class*=\"message\"]", "message class"),
                    ("[class*=\"response\"]", "response class"),
                    ("[class*=\"reply\"]", "reply class"),
                ]),
            )
            .with(
                Capability::LoadingIndicator,
                candidates(&[
                    (".loading", "loading"),
                    (".typing", "typing"),
                    ("[class*=\"loading\"]", "loading class"),
                    ("[class*=\"typing\"]", "typing class"),
                    ("[data-testid*=\"loading\"]", "loading test id"),
                ]),
            )
            .with(
                Capability::LoginIndicator,
                candidates(&[
                    ("[data-testid=\"user-avatar\"]", "avatar test id"),
                    (".user-info", "user info"),
                    (".avatar", "avatar"),
                    ("[class*=\"avatar\"]", "avatar class"),
                    ("[class*=\"user\"]", "user class"),
                ]),
            )
            .with(
                Capability::LogoutControl,
                candidates(&[
                    ("[data-testid=\"logout\"]", "logout test id"),
                    ("[href*=\"logout\"]", "logout link"),
                    (".logout", "logout"),
                    ("[class*=\"logout\"]", "logout class"),
                    ("button:has-text(\"登出\")", "sign out label"),
                    ("button:has-text(\"退出\")", "exit label"),
                ]),
            );

        Self {
            id: ChannelId::from_static("doubao"),
            name: "Doubao".to_string(),
            description: "ByteDance Doubao assistant".to_string(),
            website: "https://www.doubao.com".to_string(),
            chat_url: "https://www.doubao.com/chat".to_string(),
            home_url: "https://www.doubao.com".to_string(),
            login_url: "https://www.doubao.com/login".to_string(),
            enabled: true,
            submit_with_enter: true,
            locators,
        }
    }
}

fn candidates(entries: &[(&str, &str)]) -> Vec<LocatorCandidate> {
    entries
        .iter()
        .map(|(selector, description)| LocatorCandidate::new(*selector, *description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubao_covers_every_capability() {
        let profile = ChannelProfile::doubao();
        assert!(profile.missing_capabilities().is_empty());
        for cap in Capability::all() {
            assert!(profile.locators.is_configured(cap), "{cap} missing");
        }
        let inputs = profile.candidates(Capability::InputBox);
        assert_eq!(inputs[0].priority, 0);
        assert_eq!(inputs[7].priority, 7);
    }

    #[test]
    fn yaml_profile_defaults_flags() {
        let yaml = r#"
id: demo
name: Demo
chat_url: https://chat.example/c
home_url: https://chat.example
login_url: https://chat.example/login
locators:
  input_box:
    - selector: textarea
"#;
        let profile: ChannelProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.enabled);
        assert!(profile.submit_with_enter);
        assert_eq!(
            profile.missing_capabilities(),
            vec![Capability::ResponseContainer]
        );
    }
}
