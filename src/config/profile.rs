//! Named profiles: free-form state trees stored as `<name>.yml`
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;

use super::LoadError;

const PROFILE_EXT: &str = "yml";

/// Strip everything but letters, digits and spaces from a profile name
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Directory of stored profiles
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self, name: &str) -> Option<PathBuf> {
        let name = sanitize_name(name);
        if name.is_empty() {
            return None;
        }
        Some(self.path.join(format!("{name}.{PROFILE_EXT}")))
    }

    /// Names of all stored profiles, sorted
    pub fn list(&self) -> Result<Vec<String>, LoadError> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension()?.to_str()? != PROFILE_EXT {
                    return None;
                }
                Some(path.file_stem()?.to_str()?.to_string())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Returns the profile with the given name, if it exists
    pub fn get(&self, name: &str) -> Result<Option<Value>, LoadError> {
        let Some(path) = self.file(name) else {
            return Ok(None);
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_yaml::from_str(&content)?;
        Ok(Some(value))
    }

    /// Store a profile, returning the sanitised name it was stored under
    pub fn set(&self, name: &str, config: &Value) -> Result<String, LoadError> {
        let Some(path) = self.file(name) else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty profile name").into());
        };
        fs::create_dir_all(&self.path)?;
        fs::write(&path, serde_yaml::to_string(config)?)?;
        log::info!("Saved profile {path:?}");
        Ok(sanitize_name(name))
    }

    /// Delete a profile. Returns false if it did not exist.
    pub fn delete(&self, name: &str) -> Result<bool, LoadError> {
        let Some(path) = self.file(name) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Deleted profile {path:?}");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_name("My Profile 2"), "My Profile 2");
        assert_eq!(sanitize_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_name("  game: x!  "), "game x");
        assert_eq!(sanitize_name("/"), "");
    }

    #[test]
    fn store_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = ProfileStore::new(dir.path().join("profiles"));
        assert!(store.list()?.is_empty());
        assert_eq!(store.get("missing")?, None);

        let config = json!({"controller": {"emulation": "xbox"}});
        assert_eq!(store.set("Elden Ring!", &config)?, "Elden Ring");
        store.set("Balanced", &json!({"tdp": {"mode": "balanced"}}))?;

        assert_eq!(store.list()?, vec!["Balanced", "Elden Ring"]);
        assert_eq!(store.get("Elden Ring")?, Some(config));

        assert!(store.delete("Elden Ring")?);
        assert!(!store.delete("Elden Ring")?);
        assert_eq!(store.list()?, vec!["Balanced"]);
        assert!(store.set("???", &json!({})).is_err());
        Ok(())
    }
}
