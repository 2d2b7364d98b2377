//! Deterministic merchant name normalization
//!
//! Turns raw bank descriptions ("NETFLIX.COM*12345", "SQ *BLUE BOTTLE #0123")
//! into canonical merchant keys, and flags generic labels (ATM, transfers,
//! payments) that describe a class of activity rather than one merchant.

use std::collections::BTreeMap;

use regex::Regex;

use crate::collaborators::{MerchantNameResolver, MerchantResolution};
use crate::error::Result;

/// Built-in aliases: cleaned name (or token prefix) -> canonical name
const ALIASES: &[(&str, &str)] = &[
    ("nflx", "netflix"),
    ("netflix", "netflix"),
    ("amzn mktp", "amazon"),
    ("amzn mktplace", "amazon"),
    ("amazon mktplace", "amazon"),
    ("amzn digital", "amazon digital"),
    ("amzn prime", "amazon prime"),
    ("amazon prime", "amazon prime"),
    ("prime video", "amazon prime video"),
    ("spotify", "spotify"),
    ("hulu", "hulu"),
    ("disneyplus", "disney plus"),
    ("disney plus", "disney plus"),
    ("hbo max", "max"),
    ("apple com bill", "apple services"),
    ("itunes com bill", "apple services"),
    ("google storage", "google one"),
    ("google one", "google one"),
    ("gsuite", "google workspace"),
    ("yt premium", "youtube premium"),
    ("youtube premium", "youtube premium"),
    ("dropbox", "dropbox"),
    ("msft", "microsoft"),
    ("planet fit", "planet fitness"),
    ("at t", "att"),
    ("tmobile", "t mobile"),
];

/// Labels describing heterogeneous activity rather than a merchant relationship
const GENERIC_PHRASES: &[&str] = &[
    "atm",
    "cash withdrawal",
    "withdrawal",
    "cash",
    "transfer",
    "online transfer",
    "funds transfer",
    "payment",
    "online payment",
    "bill payment",
    "autopay",
    "debit purchase",
    "pos purchase",
    "pos debit",
    "purchase",
    "deposit",
    "mobile deposit",
    "check",
    "zelle",
    "venmo",
    "interest",
    "fee",
];

/// Payment-processor prefixes that precede the real merchant name
const PROCESSOR_PREFIXES: &[&str] = &["sq", "tst", "sp", "aplpay", "applepay", "pp", "pos"];

/// Legal-entity and domain suffixes stripped from the end of a name
const SUFFIXES: &[&str] = &["inc", "llc", "corp", "co", "ltd", "com"];

/// Result of normalizing one raw merchant string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMerchant {
    /// Name after cleaning, before alias lookup
    pub cleaned: String,
    /// Canonical merchant key
    pub canonical: String,
    /// Whether the alias table supplied the canonical name
    pub alias_hit: bool,
    pub generic: bool,
}

/// Rule-based merchant normalizer.
///
/// Immutable after construction; share one instance across runs and threads.
#[derive(Debug, Clone)]
pub struct MerchantNormalizer {
    punctuation: Regex,
    store_number: Regex,
    whitespace: Regex,
    /// Sorted longest alias first so specific aliases win
    aliases: Vec<(String, String)>,
}

impl MerchantNormalizer {
    pub fn new() -> Self {
        Self::with_aliases(&BTreeMap::new())
    }

    /// Build with extra aliases layered over the built-in table
    pub fn with_aliases(extra: &BTreeMap<String, String>) -> Self {
        let mut table: BTreeMap<String, String> = ALIASES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in extra {
            table.insert(k.to_lowercase(), v.to_lowercase());
        }

        let mut aliases: Vec<(String, String)> = table.into_iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            punctuation: Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid punctuation regex"),
            store_number: Regex::new(r"[#*]\s*\d+\b").expect("valid store number regex"),
            whitespace: Regex::new(r"\s+").expect("valid whitespace regex"),
            aliases,
        }
    }

    /// Full normalization: clean, resolve aliases, flag generic labels
    pub fn normalize(&self, raw: &str) -> NormalizedMerchant {
        let cleaned = self.clean(raw);
        let (canonical, alias_hit) = match self.lookup_alias(&cleaned) {
            Some(alias) => (alias.to_string(), true),
            None => (cleaned.clone(), false),
        };
        let generic = is_generic(&canonical);

        NormalizedMerchant {
            cleaned,
            canonical,
            alias_hit,
            generic,
        }
    }

    /// Cleaning steps only (no alias lookup)
    pub fn clean(&self, raw: &str) -> String {
        let lower = raw.to_lowercase().replace(['\'', '\u{2019}'], "");
        let without_numbers = self.store_number.replace_all(&lower, " ");
        let spaced = self.punctuation.replace_all(&without_numbers, " ");
        let collapsed = self.collapse(&spaced);

        let mut tokens: Vec<&str> = collapsed.split(' ').filter(|t| !t.is_empty()).collect();
        while tokens.len() > 1 && PROCESSOR_PREFIXES.contains(&tokens[0]) {
            tokens.remove(0);
        }
        // Trailing store/terminal numbers and entity suffixes, in any order
        while tokens.len() > 1
            && tokens
                .last()
                .is_some_and(|t| SUFFIXES.contains(t) || is_store_number(t))
        {
            tokens.pop();
        }

        tokens.join(" ")
    }

    /// Canonical name for a cleaned string, if an alias matches the whole
    /// name or a token-boundary prefix of it
    pub fn lookup_alias(&self, cleaned: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(alias, _)| {
                cleaned == alias
                    || (cleaned.starts_with(alias.as_str())
                        && cleaned.as_bytes().get(alias.len()) == Some(&b' '))
            })
            .map(|(_, canonical)| canonical.as_str())
    }

    fn collapse(&self, s: &str) -> String {
        self.whitespace.replace_all(s, " ").trim().to_string()
    }
}

impl Default for MerchantNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_store_number(token: &str) -> bool {
    token.len() >= 3 && token.bytes().all(|b| b.is_ascii_digit())
}

/// Whether a normalized name denotes generic activity
pub fn is_generic(name: &str) -> bool {
    if name.trim().is_empty() {
        return true;
    }
    GENERIC_PHRASES.iter().any(|phrase| {
        name == *phrase
            || (name.starts_with(phrase) && name.as_bytes().get(phrase.len()) == Some(&b' '))
    })
}

/// Rule-based resolver strategy
impl MerchantNameResolver for MerchantNormalizer {
    fn resolve(&self, raw_name: &str) -> Result<MerchantResolution> {
        let normalized = self.normalize(raw_name);
        let (confidence, reasoning) = if normalized.alias_hit {
            (1.0, format!("alias table maps '{}'", normalized.cleaned))
        } else {
            (0.6, "cleaned name, no alias match".to_string())
        };
        Ok(MerchantResolution {
            canonical_name: normalized.canonical,
            merchant_type: if normalized.generic {
                "generic".to_string()
            } else {
                "merchant".to_string()
            },
            confidence,
            reasoning,
        })
    }
}
