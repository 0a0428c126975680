//! Shell escaping and quoting utilities.

/// Characters that force an argument into single quotes.
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~',
];

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument for shell execution.
/// - Empty strings become `''`
/// - Strings with shell metacharacters are wrapped in single quotes
/// - Embedded single quotes are escaped
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_leaves_flags_and_paths_bare() {
        assert_eq!(quote_arg("-n"), "-n");
        assert_eq!(quote_arg("/home/rails/shop/current"), "/home/rails/shop/current");
        assert_eq!(quote_arg("db:migrate"), "db:migrate");
    }

    #[test]
    fn quote_arg_wraps_alias_lists() {
        assert_eq!(
            quote_arg("www.shop.example shop.example"),
            "'www.shop.example shop.example'"
        );
    }

    #[test]
    fn quote_arg_neutralises_command_substitution() {
        assert_eq!(quote_arg("shop; rm -rf /"), "'shop; rm -rf /'");
        assert_eq!(quote_arg("$(whoami)"), "'$(whoami)'");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_path_always_quotes() {
        assert_eq!(quote_path("/var/www"), "'/var/www'");
        assert_eq!(quote_path("/var/www/it's"), "'/var/www/it'\\''s'");
    }
}
