//! Flat-file persistence
//! Saved question records live as one pretty-printed JSON file per record,
//! keyed by a generated UUID; the users list lives in a single `users.json`
//! behind a mutex.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::models::{QuestionRecord, User};

/// One JSON file per saved question.
pub struct QuestionStore {
    data_dir: PathBuf,
}

impl QuestionStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("could not create {}", data_dir.display()))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Save a record under a fresh UUID and return the id.
    pub fn save(&self, record: &QuestionRecord) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let path = self.data_dir.join(format!("{}.json", id));
        let payload = serde_json::to_string_pretty(record)?;
        fs::write(&path, payload).with_context(|| format!("could not write {}", path.display()))?;
        Ok(id)
    }

    /// Load a record by id. Returns `None` when no file exists.
    pub fn load(&self, id: &str) -> Result<Option<QuestionRecord>> {
        // ids are always UUIDs; anything else is rejected before touching
        // the filesystem
        if Uuid::parse_str(id).is_err() {
            return Err(anyhow!("invalid question id: {}", id));
        }

        let path = self.data_dir.join(format!("{}.json", id));
        if !path.exists() {
            return Ok(None);
        }

        let raw =
            fs::read_to_string(&path).with_context(|| format!("could not read {}", path.display()))?;
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt question file {}", path.display()))?;
        Ok(Some(record))
    }
}

/// Users list in a single JSON file.
pub struct UserStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl UserStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("could not create {}", data_dir.display()))?;
        Ok(Self {
            path: data_dir.join("users.json"),
            guard: Mutex::new(()),
        })
    }

    pub fn list(&self) -> Result<Vec<User>> {
        let _lock = self.guard.lock().unwrap();
        self.read_all()
    }

    pub fn get(&self, id: &str) -> Result<Option<User>> {
        let _lock = self.guard.lock().unwrap();
        Ok(self.read_all()?.into_iter().find(|user| user.id == id))
    }

    pub fn create(&self, name: &str, email: &str) -> Result<User> {
        let _lock = self.guard.lock().unwrap();
        let mut users = self.read_all()?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        self.write_all(&users)?;
        Ok(user)
    }

    /// Update name and email; returns `None` when the user does not exist.
    pub fn update(&self, id: &str, name: &str, email: &str) -> Result<Option<User>> {
        let _lock = self.guard.lock().unwrap();
        let mut users = self.read_all()?;

        let Some(user) = users.iter_mut().find(|user| user.id == id) else {
            return Ok(None);
        };
        user.name = name.to_string();
        user.email = email.to_string();
        user.updated_at = Utc::now();
        let updated = user.clone();

        self.write_all(&users)?;
        Ok(Some(updated))
    }

    fn read_all(&self) -> Result<Vec<User>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("could not read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("corrupt users file {}", self.path.display()))
    }

    fn write_all(&self, users: &[User]) -> Result<()> {
        let payload = serde_json::to_string_pretty(users)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("could not write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionMetadata;
    use tempfile::tempdir;

    fn sample_record() -> QuestionRecord {
        QuestionRecord {
            number: None,
            title: "A saved question".to_string(),
            keywords: vec!["saved".to_string()],
            categories: Vec::new(),
            content: "Some stem".to_string(),
            images: Vec::new(),
            answers: Vec::new(),
            metadata: QuestionMetadata::default(),
            resolution: Some("Because.".to_string()),
            correct_answer: Some("a".to_string()),
        }
    }

    #[test]
    fn test_question_save_and_load() {
        let dir = tempdir().unwrap();
        let store = QuestionStore::new(dir.path()).unwrap();

        let id = store.save(&sample_record()).unwrap();
        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded.title, "A saved question");
        assert_eq!(loaded.resolution.as_deref(), Some("Because."));
    }

    #[test]
    fn test_question_load_missing_and_invalid_ids() {
        let dir = tempdir().unwrap();
        let store = QuestionStore::new(dir.path()).unwrap();

        let missing = Uuid::new_v4().to_string();
        assert!(store.load(&missing).unwrap().is_none());
        assert!(store.load("../../etc/passwd").is_err());
    }

    #[test]
    fn test_user_crud() {
        let dir = tempdir().unwrap();
        let store = UserStore::new(dir.path()).unwrap();

        assert!(store.list().unwrap().is_empty());

        let user = store.create("Alice", "alice@example.com").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(
            store.get(&user.id).unwrap().unwrap().email,
            "alice@example.com"
        );

        let updated = store
            .update(&user.id, "Alice B", "alice.b@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Alice B");
        assert!(updated.updated_at >= updated.created_at);

        assert!(store.update("missing", "x", "y").unwrap().is_none());
        assert!(store.get("missing").unwrap().is_none());
    }
}
