//! Locale resolution and language metadata.

use std::collections::HashMap;
use lazy_static::lazy_static;
use log::debug;
use crate::errors::AssistError;

/// The requesting user, as far as this crate needs to know them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: u64,
    /// Effective locale of the user, e.g. `"pt_BR"`. `None` falls back to the site default.
    pub locale: Option<String>,
    /// IANA timezone name, e.g. `"America/Sao_Paulo"`. `None` is treated as UTC.
    pub timezone: Option<String>,
}

impl User {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// English and native name of a language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageName {
    pub name: String,
    pub native_name: String,
}

/// Lookup of language names by locale code. Absence is a normal answer, not an error.
pub trait LocaleMetadata: Send + Sync {
    fn language_name(&self, locale: &str) -> Option<LanguageName>;
}

/// Look up language names, reporting absence as [AssistError::LocaleMetadataMissing].
///
/// Callers degrade on the error instead of propagating it.
pub fn lookup_language(metadata: &dyn LocaleMetadata, locale: &str) -> Result<LanguageName, AssistError> {
    metadata.language_name(locale).ok_or_else(|| {
        debug!("no language names for locale {:?}", locale);
        AssistError::LocaleMetadataMissing(locale.to_string())
    })
}

/// Like [lookup_language], but retries with the base language of a regional code (`pt_BR` -> `pt`).
pub fn lookup_language_or_base(metadata: &dyn LocaleMetadata, locale: &str) -> Result<LanguageName, AssistError> {
    lookup_language(metadata, locale).or_else(|err| match locale.split_once('_') {
        Some((base, _)) => lookup_language(metadata, base),
        None => Err(err),
    })
}

/// Resolve the locale a request should be answered in.
///
/// Returns `default_locale` when `force_default` is set, when there is no user, or when the user has no locale.
pub fn resolve_locale<'a>(user: Option<&'a User>, force_default: bool, default_locale: &'a str) -> &'a str {
    match user {
        Some(user) if !force_default => user.locale.as_deref().filter(|l| !l.is_empty()).unwrap_or(default_locale),
        _ => default_locale,
    }
}

lazy_static! {
    static ref BUILTIN_LANGUAGE_NAMES: HashMap<&'static str, (&'static str, &'static str)> = HashMap::from([
        ("ar", ("Arabic", "العربية")),
        ("de", ("German", "Deutsch")),
        ("en", ("English (US)", "English (US)")),
        ("en_GB", ("English (UK)", "English (UK)")),
        ("es", ("Spanish", "Español")),
        ("fr", ("French", "Français")),
        ("he", ("Hebrew", "עברית")),
        ("it", ("Italian", "Italiano")),
        ("ja", ("Japanese", "日本語")),
        ("ko", ("Korean", "한국어")),
        ("nl", ("Dutch", "Nederlands")),
        ("pl_PL", ("Polish", "polski")),
        ("pt", ("Portuguese", "Português")),
        ("pt_BR", ("Portuguese (Brazil)", "Português (BR)")),
        ("ru", ("Russian", "Русский")),
        ("sv", ("Swedish", "Svenska")),
        ("tr_TR", ("Turkish", "Türkçe")),
        ("uk", ("Ukrainian", "українська")),
        ("zh_CN", ("Chinese (China)", "简体中文")),
        ("zh_TW", ("Chinese (Taiwan)", "繁體中文")),
    ]);
}

/// In-memory language names. [StaticLocaleNames::builtin] covers the most common site locales.
#[derive(Debug, Clone, Default)]
pub struct StaticLocaleNames {
    names: HashMap<String, LanguageName>,
}

impl StaticLocaleNames {
    pub fn builtin() -> Self {
        let names = BUILTIN_LANGUAGE_NAMES
            .iter()
            .map(|(code, (name, native_name))| (code.to_string(), LanguageName {
                name: name.to_string(),
                native_name: native_name.to_string(),
            }))
            .collect();
        Self { names }
    }

    pub fn insert(&mut self, locale: impl Into<String>, name: impl Into<String>, native_name: impl Into<String>) -> &mut Self {
        self.names.insert(locale.into(), LanguageName {
            name: name.into(),
            native_name: native_name.into(),
        });
        self
    }
}

impl LocaleMetadata for StaticLocaleNames {
    fn language_name(&self, locale: &str) -> Option<LanguageName> {
        self.names.get(locale).cloned()
    }
}

#[cfg(test)]
mod test_locale {
    use super::{lookup_language, lookup_language_or_base, resolve_locale, StaticLocaleNames, User};
    use crate::errors::AssistError;

    #[test]
    fn test_resolve_locale() {
        let user = User::new(1).with_locale("fr");
        assert_eq!("fr", resolve_locale(Some(&user), false, "en"));
        assert_eq!("en", resolve_locale(Some(&user), true, "en"));
        assert_eq!("en", resolve_locale(None, false, "en"));
        assert_eq!("de", resolve_locale(Some(&User::new(2)), false, "de"));
    }

    #[test]
    fn test_lookup_falls_back_to_base_language() {
        let names = StaticLocaleNames::builtin();
        assert_eq!("Français", lookup_language(&names, "fr").unwrap().native_name);
        assert_eq!("Español", lookup_language_or_base(&names, "es_MX").unwrap().native_name);
        let err = lookup_language_or_base(&names, "xx_YY").unwrap_err();
        assert!(matches!(err, AssistError::LocaleMetadataMissing(code) if code == "xx"));
    }

    #[test]
    fn test_inserted_names_override_builtin() {
        let mut names = StaticLocaleNames::builtin();
        names.insert("de", "German (formal)", "Deutsch (Sie)")
            .insert("tlh", "Klingon", "tlhIngan Hol");
        assert_eq!("German (formal)", lookup_language(&names, "de").unwrap().name);
        assert_eq!("tlhIngan Hol", lookup_language_or_base(&names, "tlh_XX").unwrap().native_name);
    }
}
