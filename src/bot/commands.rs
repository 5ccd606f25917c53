//! Command table: maps slash commands and keyboard labels to actions.
//!
//! Keyboard buttons send their label back as a plain text message, so a
//! label must match exactly, in any of the supported languages.

use crate::localization::{get_localization_manager, t_lang};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    Help,
    Information,
    AnalyzeSkin,
    UploadPhoto,
    Back,
}

impl MenuCommand {
    /// Commands presented as keyboard buttons
    pub const BUTTONS: [MenuCommand; 4] = [
        MenuCommand::AnalyzeSkin,
        MenuCommand::Information,
        MenuCommand::UploadPhoto,
        MenuCommand::Back,
    ];

    /// Slash command text, for commands typed by the user
    pub fn slash(self) -> Option<&'static str> {
        match self {
            MenuCommand::Start => Some("/start"),
            MenuCommand::Help => Some("/help"),
            _ => None,
        }
    }

    /// Localization key of the button label
    pub fn label_key(self) -> Option<&'static str> {
        match self {
            MenuCommand::AnalyzeSkin => Some("button-analyze"),
            MenuCommand::Information => Some("button-info"),
            MenuCommand::UploadPhoto => Some("button-upload"),
            MenuCommand::Back => Some("button-back"),
            MenuCommand::Start | MenuCommand::Help => None,
        }
    }

    /// Text the user sends to trigger this command in the given language
    pub fn label(self, language_code: Option<&str>) -> String {
        match (self.label_key(), self.slash()) {
            (Some(key), _) => t_lang(key, language_code),
            (None, Some(slash)) => slash.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Resolve an incoming text message to a command
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(command) = parse_slash_command(text) {
            return Some(command);
        }

        let manager = get_localization_manager();
        Self::BUTTONS.into_iter().find(|command| {
            command
                .label_key()
                .map(|key| manager.all_translations(key).iter().any(|label| label == text))
                .unwrap_or(false)
        })
    }
}

/// Parse `/start`, `/start@SomeBot` or `/start payload`
fn parse_slash_command(text: &str) -> Option<MenuCommand> {
    let word = text.trim().split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }
    let name = word.split('@').next().unwrap_or(word);

    [MenuCommand::Start, MenuCommand::Help]
        .into_iter()
        .find(|command| command.slash() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(MenuCommand::parse("/start"), Some(MenuCommand::Start));
        assert_eq!(MenuCommand::parse("/start@SkinAnalyzerBot"), Some(MenuCommand::Start));
        assert_eq!(MenuCommand::parse("/start ref123"), Some(MenuCommand::Start));
        assert_eq!(MenuCommand::parse("/help"), Some(MenuCommand::Help));
        assert_eq!(MenuCommand::parse("/stop"), None);
    }

    #[test]
    fn test_parse_button_labels_in_every_language() {
        assert_eq!(MenuCommand::parse("📷 Analyze skin"), Some(MenuCommand::AnalyzeSkin));
        assert_eq!(MenuCommand::parse("📷 Анализ кожи"), Some(MenuCommand::AnalyzeSkin));
        assert_eq!(MenuCommand::parse("ℹ️ Information"), Some(MenuCommand::Information));
        assert_eq!(MenuCommand::parse("↩️ Назад"), Some(MenuCommand::Back));
        assert_eq!(MenuCommand::parse("📸 Upload photo"), Some(MenuCommand::UploadPhoto));
    }

    #[test]
    fn test_labels_round_trip() {
        for command in MenuCommand::BUTTONS {
            for language in ["en", "ru"] {
                let label = command.label(Some(language));
                assert_eq!(MenuCommand::parse(&label), Some(command), "{label}");
            }
        }
    }

    #[test]
    fn test_labels_match_exactly() {
        assert_eq!(MenuCommand::parse("Analyze skin"), None);
        assert_eq!(MenuCommand::parse("📷 analyze skin"), None);
        assert_eq!(MenuCommand::parse("hello"), None);
        assert_eq!(MenuCommand::parse(""), None);
    }
}
