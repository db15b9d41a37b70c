use crate::metadata::{MetadataError, MetadataMap, MetadataProvider};
use crate::report::{write_decision, OutputFormat};
use crate::template::{format_template, TemplateError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const PACKAGE_SUFFIX: &str = ".pkg";
pub const READABLE_TEMPLATE: &str = "%TITLE% (%TITLE_ID%) [v%VER%]";

const DEFAULT_MODE_FIELDS: [&str; 3] = ["CONTENT_ID", "APP_VER", "VERSION"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatMode {
    Custom(String),
    Readable,
    Default,
}

impl FormatMode {
    /// A custom template wins over readable names, which win over the
    /// default naming scheme.
    pub fn select(custom_template: Option<String>, readable: bool) -> Self {
        match custom_template {
            Some(template) => FormatMode::Custom(template),
            None if readable => FormatMode::Readable,
            None => FormatMode::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenameOptions {
    pub mode: FormatMode,
    pub dry_run: bool,
    pub output: OutputFormat,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            mode: FormatMode::Default,
            dry_run: false,
            output: OutputFormat::Table,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenameOutcome {
    SkippedSameName,
    WouldRename,
    Renamed,
    Conflict,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Metadata,
    Conflict,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameDecision {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub outcome: RenameOutcome,
    pub error: Option<ReportedError>,
}

impl RenameDecision {
    fn failed(source: &Path, destination: Option<PathBuf>, err: &RenameError) -> Self {
        let kind = err.kind();
        Self {
            source: source.to_path_buf(),
            destination,
            outcome: if kind == ErrorKind::Conflict {
                RenameOutcome::Conflict
            } else {
                RenameOutcome::Error
            },
            error: Some(ReportedError {
                kind,
                message: err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenameError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("computed name '{0}' points outside the package directory")]
    OutsideDirectory(String),
    #[error("file '{}' already exists!", .0.display())]
    Conflict(PathBuf),
    #[error("unexpected error: {0:#}")]
    Unexpected(anyhow::Error),
}

impl RenameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenameError::Metadata(_)
            | RenameError::Template(_)
            | RenameError::OutsideDirectory(_) => ErrorKind::Metadata,
            RenameError::Conflict(_) => ErrorKind::Conflict,
            RenameError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// Builds the file name body (without suffix) for one package.
pub fn format_name(mode: &FormatMode, fields: &MetadataMap) -> Result<String, RenameError> {
    match mode {
        FormatMode::Custom(template) => Ok(format_template(template, fields)?),
        FormatMode::Readable => Ok(format_template(READABLE_TEMPLATE, fields)?),
        FormatMode::Default => default_name(fields),
    }
}

fn default_name(fields: &MetadataMap) -> Result<String, RenameError> {
    match (
        fields.non_empty("CONTENT_ID"),
        fields.non_empty("APP_VER"),
        fields.non_empty("VERSION"),
    ) {
        (Some(content_id), Some(app_ver), Some(version)) => Ok(format!(
            "{content_id}-A{}-V{}",
            app_ver.replace('.', ""),
            version.replace('.', "")
        )),
        _ => {
            let missing = DEFAULT_MODE_FIELDS
                .iter()
                .filter(|key| fields.non_empty(key).is_none())
                .map(|key| key.to_string())
                .collect();
            Err(MetadataError::MissingFields(missing).into())
        }
    }
}

/// Plain relative components only: no root, drive prefix or `..`.
fn stays_in_directory(file_name: &str) -> bool {
    Path::new(file_name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Renames single package files according to a fixed set of options.
pub struct Renamer<'a, P: ?Sized> {
    provider: &'a P,
    options: &'a RenameOptions,
}

impl<'a, P: MetadataProvider + ?Sized> Renamer<'a, P> {
    pub fn new(provider: &'a P, options: &'a RenameOptions) -> Self {
        Self { provider, options }
    }

    /// Decides and applies the rename for `path`, then reports it on `out`.
    ///
    /// Per-file failures end up in the returned decision; only a failure to
    /// write the report line is returned as an error.
    pub fn process<W: Write + ?Sized>(
        &self,
        path: &Path,
        out: &mut W,
    ) -> io::Result<RenameDecision> {
        let decision = self.decide(path);
        write_decision(out, &decision, self.options.output)?;
        Ok(decision)
    }

    pub fn decide(&self, path: &Path) -> RenameDecision {
        let (file_name, destination) = match self.resolve_destination(path) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "could not name package");
                return RenameDecision::failed(path, None, &err);
            }
        };

        match self.apply(path, &file_name, &destination) {
            Ok(outcome) => RenameDecision {
                source: path.to_path_buf(),
                destination: Some(destination),
                outcome,
                error: None,
            },
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "rename failed");
                RenameDecision::failed(path, Some(destination), &err)
            }
        }
    }

    fn resolve_destination(&self, path: &Path) -> Result<(String, PathBuf), RenameError> {
        let fields = self.provider.read_metadata(path)?;
        tracing::debug!(path = %path.display(), mode = ?self.options.mode, "formatting name");
        let file_name = format!(
            "{}{}",
            format_name(&self.options.mode, &fields)?,
            PACKAGE_SUFFIX
        );
        if !stays_in_directory(&file_name) {
            return Err(RenameError::OutsideDirectory(file_name));
        }
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let destination = parent.join(&file_name);
        Ok((file_name, destination))
    }

    fn apply(
        &self,
        path: &Path,
        file_name: &str,
        destination: &Path,
    ) -> Result<RenameOutcome, RenameError> {
        let current_name = path.file_name().map(|name| name.to_string_lossy());
        if current_name.as_deref() == Some(file_name) {
            return Ok(RenameOutcome::SkippedSameName);
        }

        let exists = destination
            .try_exists()
            .with_context(|| format!("failed to check '{}'", destination.display()))
            .map_err(RenameError::Unexpected)?;
        if exists {
            return Err(RenameError::Conflict(destination.to_path_buf()));
        }

        if self.options.dry_run {
            return Ok(RenameOutcome::WouldRename);
        }

        fs::rename(path, destination)
            .with_context(|| {
                format!(
                    "failed to rename '{}' to '{}'",
                    path.display(),
                    destination.display()
                )
            })
            .map_err(RenameError::Unexpected)?;
        tracing::info!(from = %path.display(), to = %destination.display(), "renamed package");
        Ok(RenameOutcome::Renamed)
    }
}
