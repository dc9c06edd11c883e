//! Reserved words of the target language.
use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Words that must be backtick-escaped when used as identifiers.
pub static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "associatedtype", "class", "deinit", "enum", "extension", "fileprivate", "func",
        "import", "init", "inout", "internal", "let", "open", "operator", "private",
        "protocol", "public", "rethrows", "static", "struct", "subscript", "typealias",
        "var", "break", "case", "continue", "default", "defer", "do", "else",
        "fallthrough", "for", "guard", "if", "in", "repeat", "return", "switch", "where",
        "while", "as", "Any", "catch", "false", "is", "nil", "super", "self", "Self",
        "throw", "throws", "true", "try", "Type", "Protocol",
    ]
    .into_iter()
    .collect()
});

/// The only keywords that stay escaped in argument-label position.
pub static RESERVED_ARGUMENTS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["inout", "var", "let"].into_iter().collect());

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(name)
}

pub fn escape(name: &str) -> String {
    format!("`{name}`")
}

pub fn unescape(name: &str) -> &str {
    name.strip_prefix('`').and_then(|n| n.strip_suffix('`')).unwrap_or(name)
}

/// Argument-position form of an (escaped or plain) declaration name.
pub fn argument_name(name: &str) -> String {
    let plain = unescape(name);
    if RESERVED_ARGUMENTS.contains(plain) { escape(plain) } else { plain.to_string() }
}
