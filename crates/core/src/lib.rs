mod config;
mod metadata;
mod param_sfo;
mod pkg_reader;
mod renamer;
mod report;
mod sanitize;
mod template;
mod walker;

pub use config::{app_paths, load_config, load_config_from, AppConfig, AppPaths};
pub use metadata::{MetadataError, MetadataMap, MetadataProvider};
pub use param_sfo::parse_param_sfo;
pub use pkg_reader::PkgMetadataReader;
pub use renamer::{
    format_name, ErrorKind, FormatMode, RenameDecision, RenameError, RenameOptions,
    RenameOutcome, Renamer, ReportedError, PACKAGE_SUFFIX, READABLE_TEMPLATE,
};
pub use report::{describe, write_decision, OutputFormat};
pub use sanitize::sanitize_title;
pub use template::{
    format_template, is_title_field, parse_template, render_template, TemplateError,
    TemplatePart, PLACEHOLDER_DELIMITER,
};
pub use walker::{resolve_target, run_batch, walk, BatchSummary, ConfigError, Target};

/// Fields the help text advertises for custom templates.
pub const AVAILABLE_FIELDS: &[(&str, &str)] = &[
    ("TITLE", "title, sanitized for file names"),
    ("TITLE_XX", "localized title (TITLE_00 .. TITLE_29), sanitized"),
    ("TITLE_ID", "title id, e.g. CUSA01234"),
    ("CONTENT_ID", "full content id"),
    ("CATEGORY", "package category, e.g. gd (game) or gp (patch)"),
    ("APP_VER", "application version"),
    ("VERSION", "package version"),
    ("VER", "APP_VER when present, otherwise VERSION"),
    ("REGION", "region derived from the content id"),
    ("SYS_VER", "required system software version"),
];
