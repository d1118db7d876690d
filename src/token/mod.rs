//! Bearer token harvesting and banking.
//!
//! The shopping frontend issues short-lived bearer tokens with a `DAAAA`
//! prefix. Tokens surface in several places: page state, web storage,
//! meta tags, inline scripts, and the headers of outgoing API requests.
//! Every token seen during a search is banked in a [`TokenSet`] so later
//! strategies (and the final replay pass) can spend them.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

/// Prefix carried by shopping API bearer tokens.
pub const TOKEN_PREFIX: &str = "DAAAA";

static HTML_BEARER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"bearer\s+(DAAAA[^"'\s]+)"#).unwrap());

/// Where a token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenSource {
    InitialState,
    LocalStorage,
    SessionStorage,
    MetaTag,
    DataAttribute,
    ScriptScan,
    GlobalVariable,
    Html,
    Intercepted,
}

impl TokenSource {
    fn from_probe(s: &str) -> Option<Self> {
        match s {
            "initial-state" => Some(TokenSource::InitialState),
            "local-storage" => Some(TokenSource::LocalStorage),
            "session-storage" => Some(TokenSource::SessionStorage),
            "meta-tag" => Some(TokenSource::MetaTag),
            "data-attribute" => Some(TokenSource::DataAttribute),
            "script-scan" => Some(TokenSource::ScriptScan),
            "global-variable" => Some(TokenSource::GlobalVariable),
            _ => None,
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenSource::InitialState => "initial-state",
            TokenSource::LocalStorage => "local-storage",
            TokenSource::SessionStorage => "session-storage",
            TokenSource::MetaTag => "meta-tag",
            TokenSource::DataAttribute => "data-attribute",
            TokenSource::ScriptScan => "script-scan",
            TokenSource::GlobalVariable => "global-variable",
            TokenSource::Html => "html",
            TokenSource::Intercepted => "intercepted",
        };
        write!(f, "{}", name)
    }
}

/// A harvested bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthToken {
    pub value: String,
    pub source: TokenSource,
    pub captured_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>, source: TokenSource) -> Self {
        Self {
            value: value.into(),
            source,
            captured_at: Utc::now(),
        }
    }

    /// Short prefix safe to log.
    pub fn preview(&self) -> &str {
        let end = self.value.len().min(10);
        &self.value[..end]
    }
}

/// Insertion-ordered set of tokens, deduplicated by value.
///
/// Order matters: tokens harvested earlier in the session tend to have
/// more life left, so replay spends them first.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    tokens: Vec<AuthToken>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token. Returns false if an identical value was already
    /// banked (the original keeps its source and timestamp).
    pub fn insert(&mut self, token: AuthToken) -> bool {
        if token.value.trim().is_empty() {
            return false;
        }
        if self.tokens.iter().any(|t| t.value == token.value) {
            return false;
        }
        self.tokens.push(token);
        true
    }

    pub fn merge(&mut self, other: TokenSet) {
        for token in other.tokens {
            self.insert(token);
        }
    }

    /// Drop a token by value. Used to burn rate-limited tokens so replay
    /// never retries them.
    pub fn remove(&mut self, value: &str) {
        self.tokens.retain(|t| t.value != value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthToken> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// JavaScript probe evaluated in the page to collect candidate tokens.
///
/// Checks page state and storage first; those sources are the cheapest
/// and least likely to trip detection. Returns every hit rather than the
/// first so the whole batch can be banked in one round trip.
pub const PROBE_SCRIPT: &str = r#"
(() => {
    const hits = [];
    const push = (source, token) => {
        if (typeof token === 'string' && token.length > 0) {
            hits.push({ source: source, token: token });
        }
    };
    try { push('initial-state', window.__INITIAL_STATE__?.auth?.token); } catch (e) {}
    try { push('local-storage', localStorage.getItem('auth_token')); } catch (e) {}
    try { push('session-storage', sessionStorage.getItem('auth_token')); } catch (e) {}
    try { push('meta-tag', document.querySelector('meta[name="authorization"]')?.content); } catch (e) {}
    try { push('data-attribute', document.querySelector('[data-auth-token]')?.dataset.authToken); } catch (e) {}
    try {
        const scripts = document.getElementsByTagName('script');
        for (let i = 0; i < scripts.length; i++) {
            const content = scripts[i].textContent || '';
            const match = content.match(/bearer\s+(DAAAA[^"'\s]+)/);
            if (match) { push('script-scan', match[1]); }
        }
    } catch (e) {}
    try {
        if (typeof window.token === 'string' && window.token.startsWith('DAAAA')) {
            push('global-variable', window.token);
        }
    } catch (e) {}
    return hits;
})()
"#;

/// Convert the probe's JSON result into tokens.
pub fn parse_probe_hits(value: &serde_json::Value) -> Vec<AuthToken> {
    let mut tokens = Vec::new();
    let Some(hits) = value.as_array() else {
        return tokens;
    };
    for hit in hits {
        let Some(raw) = hit.get("token").and_then(|t| t.as_str()) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let source = hit
            .get("source")
            .and_then(|s| s.as_str())
            .and_then(TokenSource::from_probe)
            .unwrap_or(TokenSource::ScriptScan);
        tokens.push(AuthToken::new(raw, source));
    }
    tokens
}

/// Scan raw HTML for bearer tokens.
pub fn harvest_from_html(html: &str) -> Vec<AuthToken> {
    HTML_BEARER
        .captures_iter(html)
        .map(|cap| AuthToken::new(&cap[1], TokenSource::Html))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_deduplicates() {
        let mut set = TokenSet::new();
        assert!(set.insert(AuthToken::new("DAAAAabc123", TokenSource::InitialState)));
        assert!(!set.insert(AuthToken::new("DAAAAabc123", TokenSource::Intercepted)));
        assert_eq!(set.len(), 1);
        // The first sighting keeps its source
        assert_eq!(
            set.iter().next().unwrap().source,
            TokenSource::InitialState
        );
    }

    #[test]
    fn test_insert_rejects_blank() {
        let mut set = TokenSet::new();
        assert!(!set.insert(AuthToken::new("", TokenSource::Html)));
        assert!(!set.insert(AuthToken::new("   ", TokenSource::Html)));
        assert!(set.is_empty());
    }

    #[test]
    fn test_preserves_insertion_order() {
        let mut set = TokenSet::new();
        set.insert(AuthToken::new("DAAAAfirst", TokenSource::LocalStorage));
        set.insert(AuthToken::new("DAAAAsecond", TokenSource::Intercepted));
        set.insert(AuthToken::new("DAAAAthird", TokenSource::Html));
        let values: Vec<&str> = set.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["DAAAAfirst", "DAAAAsecond", "DAAAAthird"]);
    }

    #[test]
    fn test_merge_keeps_order_and_dedups() {
        let mut a = TokenSet::new();
        a.insert(AuthToken::new("DAAAA1", TokenSource::MetaTag));
        let mut b = TokenSet::new();
        b.insert(AuthToken::new("DAAAA1", TokenSource::Html));
        b.insert(AuthToken::new("DAAAA2", TokenSource::Html));
        a.merge(b);
        assert_eq!(a.len(), 2);
        let values: Vec<&str> = a.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["DAAAA1", "DAAAA2"]);
    }

    #[test]
    fn test_remove_burns_by_value() {
        let mut set = TokenSet::new();
        set.insert(AuthToken::new("DAAAAkeep", TokenSource::Html));
        set.insert(AuthToken::new("DAAAAburn", TokenSource::Html));
        set.remove("DAAAAburn");
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().value, "DAAAAkeep");
        // Removing an absent value is a no-op
        set.remove("DAAAAmissing");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_probe_hits() {
        let value = json!([
            { "source": "local-storage", "token": "DAAAAxyz" },
            { "source": "global-variable", "token": "DAAAAglobal" },
            { "source": "unknown-place", "token": "DAAAAother" },
            { "source": "meta-tag", "token": "" },
        ]);
        let tokens = parse_probe_hits(&value);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].source, TokenSource::LocalStorage);
        assert_eq!(tokens[1].source, TokenSource::GlobalVariable);
        // Unrecognized source labels fall back rather than dropping the token
        assert_eq!(tokens[2].source, TokenSource::ScriptScan);
    }

    #[test]
    fn test_parse_probe_hits_non_array() {
        assert!(parse_probe_hits(&json!(null)).is_empty());
        assert!(parse_probe_hits(&json!({"token": "DAAAAx"})).is_empty());
    }

    #[test]
    fn test_harvest_from_html() {
        let html = r#"
            <script>fetch('/api', {headers: {Authorization: 'bearer DAAAAtok_one'}})</script>
            <script>var auth = "bearer DAAAAtok_two";</script>
            <p>bearer nothing-here</p>
        "#;
        let tokens = harvest_from_html(html);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].value, "DAAAAtok_one");
        assert_eq!(tokens[1].value, "DAAAAtok_two");
        assert!(tokens.iter().all(|t| t.source == TokenSource::Html));
    }

    #[test]
    fn test_token_preview_truncates() {
        let token = AuthToken::new("DAAAA0123456789extra", TokenSource::Html);
        assert_eq!(token.preview(), "DAAAA01234");
        let short = AuthToken::new("DAAAA", TokenSource::Html);
        assert_eq!(short.preview(), "DAAAA");
    }
}
