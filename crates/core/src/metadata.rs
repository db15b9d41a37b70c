use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field values read from a package descriptor, keyed by uppercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMap {
    fields: BTreeMap<String, String>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.fields
            .insert(key.as_ref().to_ascii_uppercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MetadataMap
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MetadataMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a valid pkg file: {0}")]
    InvalidPackage(String),
    #[error("param.sfo not found in pkg file")]
    MissingParamSfo,
    #[error("parsing of param.sfo failed: {0}")]
    InvalidParamSfo(String),
    #[error("parsing of param.sfo failed: missing {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// Source of descriptor fields for a package file.
pub trait MetadataProvider {
    fn read_metadata(&self, path: &Path) -> Result<MetadataMap, MetadataError>;
}

impl<F> MetadataProvider for F
where
    F: Fn(&Path) -> Result<MetadataMap, MetadataError>,
{
    fn read_metadata(&self, path: &Path) -> Result<MetadataMap, MetadataError> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{MetadataError, MetadataMap, MetadataProvider};
    use std::path::Path;

    #[test]
    fn insert_uppercases_keys() {
        let mut map = MetadataMap::new();
        map.insert("title_id", "CUSA01234");
        assert_eq!(map.get("TITLE_ID"), Some("CUSA01234"));
        assert_eq!(map.get("title_id"), None);
    }

    #[test]
    fn non_empty_drops_empty_values() {
        let map: MetadataMap = [("APP_VER", ""), ("VERSION", "01.00")]
            .into_iter()
            .collect();
        assert_eq!(map.non_empty("APP_VER"), None);
        assert_eq!(map.non_empty("VERSION"), Some("01.00"));
        assert_eq!(map.non_empty("CONTENT_ID"), None);
    }

    #[test]
    fn closures_act_as_providers() {
        let provider = |path: &Path| -> Result<MetadataMap, MetadataError> {
            if path.ends_with("bad.pkg") {
                Err(MetadataError::MissingParamSfo)
            } else {
                Ok([("TITLE", "Game")].into_iter().collect())
            }
        };

        let map = provider
            .read_metadata(Path::new("good.pkg"))
            .expect("good file must read");
        assert_eq!(map.get("TITLE"), Some("Game"));
        assert!(provider.read_metadata(Path::new("bad.pkg")).is_err());
    }

    #[test]
    fn missing_fields_message_lists_names() {
        let err = MetadataError::MissingFields(vec!["APP_VER".to_string(), "VERSION".to_string()]);
        assert_eq!(
            err.to_string(),
            "parsing of param.sfo failed: missing APP_VER, VERSION"
        );
    }
}
