use crate::metadata::MetadataMap;
use crate::sanitize::sanitize_title;
use thiserror::Error;

pub const PLACEHOLDER_DELIMITER: char = '%';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    /// Name between the delimiters, in its original casing.
    Placeholder(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("title field '{0}' not found in package metadata")]
    MissingTitleField(String),
}

/// Splits a template into literal runs and `%NAME%` placeholders.
///
/// The scan is non-greedy: a placeholder ends at the next delimiter. A
/// trailing delimiter with no partner is kept as literal text.
pub fn parse_template(input: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(open) = rest.find(PLACEHOLDER_DELIMITER) {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find(PLACEHOLDER_DELIMITER) else {
            break;
        };

        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
        }
        parts.push(TemplatePart::Placeholder(after_open[..close].to_string()));
        rest = &after_open[close + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }

    parts
}

pub fn render_template(
    parts: &[TemplatePart],
    fields: &MetadataMap,
) -> Result<String, TemplateError> {
    let mut output = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => output.push_str(s),
            TemplatePart::Placeholder(name) => {
                let key = name.to_uppercase();
                if is_title_field(&key) {
                    let value = fields
                        .get(&key)
                        .ok_or_else(|| TemplateError::MissingTitleField(key.clone()))?;
                    output.push_str(&sanitize_title(value));
                } else if let Some(value) = fields.get(&key) {
                    output.push_str(value);
                } else {
                    output.push(PLACEHOLDER_DELIMITER);
                    output.push_str(name);
                    output.push(PLACEHOLDER_DELIMITER);
                }
            }
        }
    }

    Ok(output)
}

pub fn format_template(template: &str, fields: &MetadataMap) -> Result<String, TemplateError> {
    render_template(&parse_template(template), fields)
}

/// `TITLE`, `TITLE_00`, ... but not `TITLE_ID`.
pub fn is_title_field(upper_name: &str) -> bool {
    upper_name.starts_with("TITLE") && upper_name != "TITLE_ID"
}
