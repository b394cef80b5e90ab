//! Message catalogs
//!
//! Catalogs are flat JSON objects (`"key": "text with {placeholders}"`)
//! compiled into the binary.

use anyhow::{Context, Result};
use stagekit::{Params, Translate};
use std::collections::HashMap;

const RU: &str = include_str!("../locales/ru.json");
const EN: &str = include_str!("../locales/en.json");

/// Language used when the requested one has no catalog
pub const FALLBACK_LANG: &str = "ru";

/// Messages of one language
#[derive(Debug, Clone)]
pub struct Catalog {
    lang: &'static str,
    messages: HashMap<String, String>,
}

impl Catalog {
    /// Load the catalog for `lang`, falling back to Russian
    pub fn load(lang: &str) -> Result<Self> {
        let (lang, raw) = match lang {
            "en" => ("en", EN),
            _ => (FALLBACK_LANG, RU),
        };
        let messages: HashMap<String, String> =
            serde_json::from_str(raw).with_context(|| format!("Invalid {lang} message catalog"))?;
        Ok(Self { lang, messages })
    }

    /// Code of the loaded language
    pub fn lang(&self) -> &'static str {
        self.lang
    }

    #[cfg(test)]
    fn keys(&self) -> impl Iterator<Item = &String> {
        self.messages.keys()
    }
}

impl Translate for Catalog {
    fn t(&self, key: &str, params: Params<'_>) -> String {
        self.messages
            .get(key)
            .map_or_else(|| key.to_string(), |template| render(template, params))
    }
}

/// Substitute `{name}` placeholders; unknown placeholders stay as written
pub fn render(template: &str, params: Params<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match params.iter().find(|(k, _)| *k == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..=open + 1 + close]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
