//! Symbol Extractor
//!
//! Maps company names and ticker codes mentioned in free text to the
//! allow-listed ticker symbols the market-data service supports.

use crate::models::SymbolSet;

/// Allow-listed tickers and the company each one belongs to
pub const SUPPORTED_TICKERS: &[(&str, &str)] = &[
    // Tech
    ("AAPL", "Apple"),
    ("MSFT", "Microsoft"),
    ("GOOGL", "Google"),
    ("NVDA", "NVIDIA"),
    ("META", "Meta"),
    // Auto / EV
    ("TSLA", "Tesla"),
    ("GM", "General Motors"),
    ("F", "Ford"),
    // Finance
    ("JPM", "JPMorgan Chase"),
    ("BAC", "Bank of America"),
    ("V", "Visa"),
    // Consumer
    ("AMZN", "Amazon"),
    ("WMT", "Walmart"),
];

/// Upper-case company aliases, matched as substrings. Order decides result order.
const COMPANY_ALIASES: &[(&str, &str)] = &[
    ("APPLE", "AAPL"),
    ("MICROSOFT", "MSFT"),
    ("TESLA", "TSLA"),
    ("NVIDIA", "NVDA"),
    ("GOOGLE", "GOOGL"),
    ("ALPHABET", "GOOGL"),
    ("META", "META"),
    ("AMAZON", "AMZN"),
    ("JPMORGAN", "JPM"),
    ("VISA", "V"),
    ("GENERAL MOTORS", "GM"),
    ("BANK OF AMERICA", "BAC"),
    ("WALMART", "WMT"),
];

/// Codes shorter than this are only recognised when written in upper case
const MIN_CASE_INSENSITIVE_CODE_LEN: usize = 3;

pub fn is_supported(symbol: &str) -> bool {
    SUPPORTED_TICKERS.iter().any(|(code, _)| *code == symbol)
}

pub fn company_name(symbol: &str) -> Option<&'static str> {
    SUPPORTED_TICKERS
        .iter()
        .find(|(code, _)| *code == symbol)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolExtractor;

impl SymbolExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract symbols from a question. Never fails; empty when nothing matches.
    pub fn extract(&self, question: &str) -> SymbolSet {
        let upper = question.to_uppercase();
        let mut found = SymbolSet::new();

        for (alias, symbol) in COMPANY_ALIASES {
            if upper.contains(alias) {
                found.insert((*symbol).to_string());
            }
        }

        // Ticker codes must stand alone as words
        let raw_words: Vec<&str> = question
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        for (code, _) in SUPPORTED_TICKERS {
            let mentioned = raw_words.iter().any(|word| {
                if code.len() >= MIN_CASE_INSENSITIVE_CODE_LEN {
                    word.eq_ignore_ascii_case(code)
                } else {
                    word == code
                }
            });
            if mentioned {
                found.insert((*code).to_string());
            }
        }

        found
    }

    /// Keep only allow-listed symbols from an untrusted list, upper-cased and de-duplicated
    pub fn filter_supported<I, S>(&self, symbols: I) -> SymbolSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| is_supported(s))
            .collect()
    }
}
