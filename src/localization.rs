use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Languages with a bundle under `locales/<lang>/main.ftl`
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["uk", "en"];
pub const DEFAULT_LANGUAGE: &str = "uk";
pub const DEFAULT_LOCALES_DIR: &str = "./locales";

type Bundle = FluentBundle<FluentResource>;

/// Localization manager for the poll bot
pub struct LocalizationManager {
    bundles: HashMap<String, Bundle>,
    default_language: String,
}

impl LocalizationManager {
    /// Load every supported language from the default locales directory
    pub fn new() -> Result<Self> {
        Self::from_dir(DEFAULT_LOCALES_DIR, DEFAULT_LANGUAGE)
    }

    /// Load every supported language found under `dir`
    pub fn from_dir(dir: impl AsRef<Path>, default_language: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let mut bundles = HashMap::new();

        for language in SUPPORTED_LANGUAGES {
            let path = dir.join(language).join("main.ftl");
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Locale file not loaded");
                    continue;
                }
            };
            let bundle = Self::create_bundle(language, content)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            bundles.insert(language.to_string(), bundle);
        }

        debug!(languages = bundles.len(), dir = %dir.display(), "Localization loaded");
        Ok(Self {
            bundles,
            default_language: default_language.to_string(),
        })
    }

    fn create_bundle(language: &str, content: String) -> Result<Bundle> {
        let locale: LanguageIdentifier = language.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Messages go into HTML and plain chat text; isolation marks only add noise
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(content)
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid Fluent syntax: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate Fluent messages: {errors:?}"))?;
        Ok(bundle)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Get a localized message in a language, falling back to the default language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        [language, self.default_language.as_str()]
            .into_iter()
            .filter_map(|language| self.bundles.get(language))
            .find_map(|bundle| Self::format(bundle, key, args))
            .unwrap_or_else(|| format!("Missing translation: {}", key))
    }

    /// Get a localized message in the default language
    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, &self.default_language, args)
    }

    fn format(bundle: &Bundle, key: &str, args: Option<&HashMap<&str, &str>>) -> Option<String> {
        let pattern = bundle.get_message(key)?.value()?;
        let fluent_args = args.map(|args| {
            FluentArgs::from_iter(
                args.iter()
                    .map(|(name, value)| (*name, FluentValue::from(*value))),
            )
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            debug!(key, ?errors, "Fluent formatting errors");
        }
        Some(value.into_owned())
    }
}

impl Default for LocalizationManager {
    /// Empty manager; every lookup yields the missing-translation text
    fn default() -> Self {
        Self {
            bundles: HashMap::new(),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Supported language matching a Telegram language code such as `en-US`
pub fn supported_language(language_code: Option<&str>) -> Option<&'static str> {
    let primary = language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(str::to_lowercase)?;

    SUPPORTED_LANGUAGES
        .into_iter()
        .find(|language| primary == *language)
}

/// Map a Telegram language code to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    supported_language(language_code).unwrap_or(DEFAULT_LANGUAGE)
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization(dir: impl AsRef<Path>, default_language: &str) -> Result<()> {
    let manager = LocalizationManager::from_dir(dir, default_language)?;
    if LOCALIZATION_MANAGER.set(manager).is_err() {
        debug!("Localization already initialized");
    }
    Ok(())
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|err| {
            warn!(error = %err, "Falling back to empty localization");
            LocalizationManager::default()
        })
    })
}

/// Localized message for a Telegram language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    let language = supported_language(language_code).unwrap_or(manager.default_language());
    manager.get_message_in_language(key, language, None)
}

/// Localized message with arguments for a Telegram language code
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let manager = get_localization_manager();
    let language = supported_language(language_code).unwrap_or(manager.default_language());
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    manager.get_message_in_language(key, language, Some(&args_map))
}
