//! Static answer whitelist.
//!
//! Survey answers that literally name a well-known brand don't need a model
//! call: the reviewer's code is the brand itself. [`Whitelist`] holds a
//! built-in list plus a caller-supplied custom list and matches against the
//! merged set case-insensitively.
//!
//! Matching runs in two phases:
//! 1. exact match of the trimmed, lowercased input;
//! 2. substring containment of entries longer than
//!    [`PARTIAL_MATCH_MIN_CHARS`] characters. When several entries are
//!    contained, the longest one wins ("PayMaya" over "Maya").
//!
//! The custom list lives only in memory and is never persisted.

use std::sync::RwLock;

use super::read;

/// Entries must be strictly longer than this to match as a substring.
pub const PARTIAL_MATCH_MIN_CHARS: usize = 3;

/// Built-in answer literals.
pub const BUILTIN_ENTRIES: &[&str] = &[
    "GCash",
    "Maya",
    "PayMaya",
    "GrabPay",
    "ShopeePay",
    "Coins.ph",
    "BDO",
    "BPI",
    "Metrobank",
    "Landbank",
    "UnionBank",
    "Security Bank",
    "RCBC",
    "PNB",
    "Jollibee",
    "McDonald's",
    "Mang Inasal",
    "Chowking",
    "Globe",
    "PLDT",
    "Converge",
    "Lazada",
    "Shopee",
    "Foodpanda",
    "Nestle",
    "Coca-Cola",
    "Pepsi",
    "Samsung",
    "Xiaomi",
    "Huawei",
    "Toyota",
];

/// Case-insensitive whitelist over built-in and custom entries.
#[derive(Debug)]
pub struct Whitelist {
    builtin: Vec<Entry>,
    custom: RwLock<Vec<Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    literal: String,
    lowered: String,
}

impl Entry {
    fn new(literal: impl Into<String>) -> Option<Self> {
        let literal = literal.into().trim().to_string();
        if literal.is_empty() {
            return None;
        }
        Some(Self {
            lowered: literal.to_lowercase(),
            literal,
        })
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::with_builtin(BUILTIN_ENTRIES.iter().copied())
    }
}

impl Whitelist {
    /// Whitelist seeded with [`BUILTIN_ENTRIES`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist with a caller-chosen built-in list.
    pub fn with_builtin<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            builtin: entries.into_iter().filter_map(Entry::new).collect(),
            custom: RwLock::new(Vec::new()),
        }
    }

    /// Look up `input`, returning the matching entry's original literal.
    ///
    /// `None` is the normal "not whitelisted" answer, not an error.
    pub fn check(&self, input: &str) -> Option<String> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let custom = read(&self.custom);
        let merged = || self.builtin.iter().chain(custom.iter());

        if let Some(entry) = merged().find(|e| e.lowered == needle) {
            return Some(entry.literal.clone());
        }

        merged()
            .filter(|e| e.lowered.chars().count() > PARTIAL_MATCH_MIN_CHARS)
            .filter(|e| needle.contains(&e.lowered))
            .fold(None::<&Entry>, |best, e| match best {
                Some(b) if b.lowered.len() >= e.lowered.len() => Some(b),
                _ => Some(e),
            })
            .map(|e| e.literal.clone())
    }

    /// Replace the custom list wholesale.
    pub fn set_custom<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<Entry> = entries.into_iter().filter_map(Entry::new).collect();
        *super::write(&self.custom) = entries;
    }

    /// Append one entry to the custom list. Duplicates are ignored.
    pub fn add_custom(&self, entry: impl Into<String>) {
        let Some(entry) = Entry::new(entry) else {
            return;
        };
        let mut custom = super::write(&self.custom);
        if !custom.iter().any(|e| e.lowered == entry.lowered) {
            custom.push(entry);
        }
    }

    /// Drop every custom entry.
    pub fn clear_custom(&self) {
        super::write(&self.custom).clear();
    }

    /// Current custom entries, in insertion order.
    pub fn custom_entries(&self) -> Vec<String> {
        read(&self.custom)
            .iter()
            .map(|e| e.literal.clone())
            .collect()
    }

    /// Built-in followed by custom entries.
    pub fn all_entries(&self) -> Vec<String> {
        let custom = read(&self.custom);
        self.builtin
            .iter()
            .chain(custom.iter())
            .map(|e| e.literal.clone())
            .collect()
    }
}
