use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::error;
use unic_langid::LanguageIdentifier;

/// Languages with a bundled resource, in lookup order
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "ru"];

/// Language used when the user's language is unknown or unsupported
pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: [(&str, &str); 2] = [
    ("en", include_str!("../locales/en/main.ftl")),
    ("ru", include_str!("../locales/ru/main.ftl")),
];

/// Localization manager for the bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every bundled language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in RESOURCES {
            let locale: LanguageIdentifier = language.parse()?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(language.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// A manager without any resources; every lookup reports a missing translation
    pub fn empty() -> Self {
        Self {
            bundles: HashMap::new(),
        }
    }

    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Unicode isolation marks would end up verbatim in Telegram messages
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Failed to parse {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Failed to add {locale} resource: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message in a specific language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None if language != DEFAULT_LANGUAGE => {
                return self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
            }
            None => return format!("Missing translation: {key}"),
        };

        let fluent_args = args.map(|args| {
            FluentArgs::from_iter(args.iter().map(|(k, v)| (*k, FluentValue::from(*v))))
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            error!(key, language, errors = ?errors, "Failed to format localized message");
        }

        value.into_owned()
    }

    /// Every translation of `key` across the supported languages
    pub fn all_translations(&self, key: &str) -> Vec<String> {
        SUPPORTED_LANGUAGES
            .iter()
            .filter(|language| self.bundles.contains_key(**language))
            .map(|language| self.get_message_in_language(key, language, None))
            .collect()
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Load the bundled resources eagerly so a broken resource fails at startup
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            error!(error = %format!("{e:#}"), "Failed to load localization resources");
            LocalizationManager::empty()
        })
    })
}

/// Map a Telegram language code (e.g. `en-US`, `ru`) to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    let primary = language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(|code| code.to_ascii_lowercase());

    match primary {
        Some(code) => SUPPORTED_LANGUAGES
            .iter()
            .find(|supported| **supported == code)
            .copied()
            .unwrap_or(DEFAULT_LANGUAGE),
        None => DEFAULT_LANGUAGE,
    }
}

/// Convenience function to get a localized message in the user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    get_localization_manager().get_message_in_language(key, detect_language(language_code), None)
}

/// Convenience function to get a localized message with arguments in the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    get_localization_manager().get_message_in_language(
        key,
        detect_language(language_code),
        Some(&args_map),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(detect_language(Some("en")), "en");
        assert_eq!(detect_language(Some("en-US")), "en");
        assert_eq!(detect_language(Some("ru")), "ru");
        assert_eq!(detect_language(Some("RU_ru")), "ru");
        assert_eq!(detect_language(None), "en");
        assert_eq!(detect_language(Some("de")), "en");
        assert_eq!(detect_language(Some("")), "en");
    }

    #[test]
    fn test_every_key_is_translated() {
        let manager = LocalizationManager::new().unwrap();
        let english = manager.bundles.get("en").unwrap();
        let russian = manager.bundles.get("ru").unwrap();

        for key in [
            "welcome-title",
            "main-menu",
            "help-text",
            "info-disclaimer",
            "upload-prompt",
            "awaiting-photo-reminder",
            "processing-photo",
            "nothing-found",
            "caption-more",
            "result-disclaimer",
            "error-analysis-failed",
            "button-analyze",
            "button-info",
            "button-upload",
            "button-back",
        ] {
            assert!(english.has_message(key), "missing en key {key}");
            assert!(russian.has_message(key), "missing ru key {key}");
        }
    }

    #[test]
    fn test_args_are_not_isolated() {
        let manager = LocalizationManager::new().unwrap();
        let mut args = HashMap::new();
        args.insert("count", "3");
        let message = manager.get_message_in_language("caption-more", "en", Some(&args));
        assert_eq!(message, "…and 3 more");
    }

    #[test]
    fn test_empty_manager_reports_missing() {
        let manager = LocalizationManager::empty();
        assert_eq!(
            manager.get_message_in_language("main-menu", "en", None),
            "Missing translation: main-menu"
        );
    }
}
