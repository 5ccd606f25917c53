//! # Localization Tests
//!
//! Message lookup, fallbacks and argument formatting for the bundled
//! English and Russian resources.

use skinbot::localization::LocalizationManager;
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    const USER_FACING_KEYS: [&str; 19] = [
        "welcome-title",
        "welcome-description",
        "welcome-disclaimer",
        "welcome-choose",
        "main-menu",
        "help-text",
        "info-description",
        "info-disclaimer",
        "info-usage",
        "upload-prompt",
        "upload-hint",
        "awaiting-photo-reminder",
        "processing-photo",
        "nothing-found",
        "result-disclaimer",
        "error-analysis-failed",
        "button-analyze",
        "button-info",
        "button-upload",
    ];

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nothing-found", "en", None);
        assert_eq!(message, "Nothing found.");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert_eq!(message, "Missing translation: nonexistent-key");
    }

    #[test]
    fn test_unsupported_language_falls_back_to_english() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("button-back", "de", None);
        assert_eq!(message, "↩️ Back");
    }

    /// The product name in `info-title` is the same in every language
    #[test]
    fn test_every_message_is_translated() {
        let manager = setup_localization();

        for key in USER_FACING_KEYS {
            let english = manager.get_message_in_language(key, "en", None);
            let russian = manager.get_message_in_language(key, "ru", None);
            assert!(!english.starts_with("Missing translation"), "{key} missing in en");
            assert_ne!(english, russian, "{key} is not translated to ru");
        }
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("count", "7");

        let message = manager.get_message_in_language("caption-more", "en", Some(&args));
        assert_eq!(message, "…and 7 more");
    }

    #[test]
    fn test_all_translations_lists_each_language() {
        let manager = setup_localization();

        let labels = manager.all_translations("button-info");
        assert_eq!(labels, vec!["ℹ️ Information", "ℹ️ Информация"]);
    }

    #[test]
    fn test_empty_manager_reports_missing() {
        let manager = LocalizationManager::empty();

        let message = manager.get_message_in_language("nothing-found", "en", None);
        assert_eq!(message, "Missing translation: nothing-found");
    }

    #[test]
    fn test_convenience_functions() {
        skinbot::localization::init_localization().expect("Failed to initialize localization");

        let message = skinbot::localization::t_lang("main-menu", Some("en-GB"));
        assert_eq!(message, "Choose an action:");

        let message = skinbot::localization::t_args_lang("caption-more", &[("count", "3")], Some("en"));
        assert!(message.contains('3'));
    }
}
