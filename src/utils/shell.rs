//! Shell escaping and quoting for command lines fed to the session shell.

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

    // Characters that require quoting
    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for shell execution.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_simple() {
        assert_eq!(quote_arg("upgrade"), "upgrade");
        assert_eq!(quote_arg("--install"), "--install");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("my release"), "'my release'");
    }

    #[test]
    fn quote_arg_with_shell_subst() {
        assert_eq!(
            quote_arg("$(awsEksGetContextClusterName ctx)"),
            "'$(awsEksGetContextClusterName ctx)'"
        );
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
    fn quote_args_mixed() {
        let args = vec!["template".to_string(), "nginx web".to_string()];
        assert_eq!(quote_args(&args), "template 'nginx web'");
    }

    #[test]
    fn quote_path_simple() {
        assert_eq!(quote_path("/tmp/values.json"), "'/tmp/values.json'");
    }

    #[test]
    fn quote_path_with_quote() {
        assert_eq!(quote_path("/env/it's"), "'/env/it'\\''s'");
    }
}
