/// Substring replacements for title-class fields. Order matters: `": "`
/// must be handled before the bare `':'`.
const TITLE_REPLACEMENTS: &[(&str, &str)] = &[
    (": ", " - "),
    (":", "-"),
    ("|", "l"),
    ("?", ""),
    ("/", "_"),
    ("\\", "_"),
    ("*", "_"),
    ("<", "("),
    (">", ")"),
];

/// Makes a title usable as a file name while keeping it readable.
///
/// Reserved device names such as `CON` or `NUL` are passed through
/// unchanged.
pub fn sanitize_title(value: &str) -> String {
    TITLE_REPLACEMENTS
        .iter()
        .fold(value.to_string(), |acc, &(from, to)| acc.replace(from, to))
}
