use crate::renamer::{RenameDecision, RenameOutcome};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Writes the one line reported for every processed file.
pub fn write_decision<W: Write + ?Sized>(
    out: &mut W,
    decision: &RenameDecision,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Table => writeln!(out, "{}", describe(decision)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, decision)?;
            writeln!(out)
        }
    }
}

pub fn describe(decision: &RenameDecision) -> String {
    let source = file_label(&decision.source);
    let destination = decision
        .destination
        .as_deref()
        .map(file_label)
        .unwrap_or_default();

    match decision.outcome {
        RenameOutcome::SkippedSameName => {
            format!("Skipped '{source}', same filename already set.")
        }
        RenameOutcome::WouldRename => format!("Would rename '{source}' to '{destination}'"),
        RenameOutcome::Renamed => format!("Renamed '{source}' to '{destination}'"),
        RenameOutcome::Conflict | RenameOutcome::Error => {
            let message = decision
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown error");
            format!("ERROR: {message} ({})", decision.source.display())
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
