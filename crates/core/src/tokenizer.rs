//! Title tokenizer
//!
//! Pipeline: drop launcher extension → split on whitespace, punctuation,
//!           path separators and camelCase boundaries → lowercase
//!           → append compound, acronym and extension tokens → dedupe
//!
//! Boundary detection looks at the original casing, so lowercasing happens
//! per piece after the split.
//!
//! ```
//! use launchdex_core::tokenizer::tokenize;
//!
//! let tokens = tokenize("VisualStudioCode.exe");
//! assert_eq!(
//!     tokens.as_slice(),
//!     ["visual", "studio", "code", "visualstudiocode", "vscode"]
//! );
//! ```

use serde::{Deserialize, Serialize};

/// Extensions that only mark something as launchable and carry no search value.
const LAUNCHER_EXTENSIONS: &[&str] = &[
    "exe", "lnk", "url", "appref-ms", "desktop", "app", "bat", "cmd", "com", "msc",
];

/// Longest suffix treated as a file extension.
const MAX_EXTENSION_LEN: usize = 10;

#[inline]
fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

/// Ordered, de-duplicated set of normalized tokens.
///
/// Also carries the compound form (all sub-tokens concatenated) so readers
/// can test whole-title matches without re-tokenizing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSet {
    tokens: Vec<String>,
    compound: String,
}

impl TokenSet {
    /// Tokens in derivation order
    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }

    /// Iterate tokens in derivation order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Concatenation of all sub-tokens (empty for empty input)
    pub fn compound(&self) -> &str {
        &self.compound
    }

    /// First sub-token, if any
    pub fn leading(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Membership test
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no tokens were derived
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Structured tokenizer output.
///
/// Queries need the individual words for per-word matching; items only keep
/// the flattened [`TokenSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Sub-tokens in appearance order (duplicates kept)
    pub words: Vec<String>,
    /// Concatenation of all words
    pub compound: String,
    /// Initials of all but the last word, then the last word (multi-word only)
    pub acronym: Option<String>,
    /// Non-launcher file extension, kept as its own token
    pub extension: Option<String>,
}

impl Analysis {
    /// Flatten into the ordered, de-duplicated token set.
    pub fn to_token_set(&self) -> TokenSet {
        let mut tokens: Vec<String> = Vec::with_capacity(self.words.len() + 3);
        let mut push = |token: &str| {
            if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        };
        for word in &self.words {
            push(word);
        }
        push(&self.compound);
        if let Some(acronym) = &self.acronym {
            push(acronym);
        }
        if let Some(ext) = &self.extension {
            push(ext);
        }
        TokenSet {
            tokens,
            compound: self.compound.clone(),
        }
    }

    /// True when no words or extension were found
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.extension.is_none()
    }
}

/// Tokenize text into its normalized token set.
pub fn tokenize(text: &str) -> TokenSet {
    analyze(text).to_token_set()
}

/// Run the tokenizer pipeline and keep the intermediate structure.
pub fn analyze(text: &str) -> Analysis {
    let (stem, extension) = split_extension(text.trim());
    let words = split_words(stem);
    let compound: String = words.concat();
    let acronym = match words.split_last() {
        Some((last, init)) if !init.is_empty() => {
            let mut acronym: String = init.iter().filter_map(|w| w.chars().next()).collect();
            acronym.push_str(last);
            Some(acronym)
        }
        _ => None,
    };
    Analysis {
        words,
        compound,
        acronym,
        extension,
    }
}

/// Split off a trailing file extension.
///
/// Launcher extensions are dropped; other extensions are returned lowercased.
fn split_extension(text: &str) -> (&str, Option<String>) {
    let Some(dot) = text.rfind('.') else {
        return (text, None);
    };
    let (stem, ext) = (&text[..dot], &text[dot + 1..]);
    let looks_like_ext = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_alphanumeric() || c == '-')
        && ext.chars().any(|c| c.is_alphabetic());
    if stem.trim().is_empty() || !looks_like_ext {
        return (text, None);
    }
    let ext = ext.to_lowercase();
    if LAUNCHER_EXTENSIONS.contains(&ext.as_str()) {
        (stem, None)
    } else {
        (stem, Some(ext.replace('-', "")))
    }
}

/// Split on non-alphanumerics and camelCase boundaries, lowercasing each piece.
fn split_words(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().filter(|c| !is_apostrophe(*c)).collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() && is_camel_boundary(&chars, i) {
            words.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `fooBar` splits before `B`; `XMLParser` and `Win32Api` split before the
/// uppercase letter that starts a lowercase run.
fn is_camel_boundary(chars: &[char], i: usize) -> bool {
    let cur = chars[i];
    if i == 0 || !cur.is_uppercase() {
        return false;
    }
    let prev = chars[i - 1];
    if prev.is_lowercase() {
        return true;
    }
    if prev.is_uppercase() || prev.is_numeric() {
        return chars.get(i + 1).is_some_and(|next| next.is_lowercase());
    }
    false
}
