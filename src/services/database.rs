// Database service module
// SQLite persistence for extracted question records

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::models::{Answer, ImageAsset, QuestionMetadata, QuestionRecord};

/// Row-level summary returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub id: i64,
    pub number: Option<String>,
    pub title: String,
    pub answer_count: usize,
    pub has_images: bool,
    pub created_at: DateTime<Utc>,
}

/// Database service
pub struct DatabaseService {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("could not create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("could not open database {}", path.display()))?;

        let service = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(path.to_path_buf()),
        };
        service.initialize()?;
        Ok(service)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let service = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
        };
        service.initialize()?;
        Ok(service)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Create tables and indexes idempotently.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.lock();

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number INTEGER,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                keywords TEXT,
                categories TEXT,
                difficulty TEXT,
                source TEXT,
                has_images INTEGER DEFAULT 0,
                has_formulas INTEGER DEFAULT 0,
                answer_count INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL,
                image_id TEXT NOT NULL,
                type TEXT NOT NULL,
                data TEXT,
                latex TEXT,
                media_type TEXT,
                name TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL,
                answer_id TEXT NOT NULL,
                content TEXT NOT NULL,
                is_correct INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_questions_number ON questions(number);
            CREATE INDEX IF NOT EXISTS idx_images_question_id ON images(question_id);
            CREATE INDEX IF NOT EXISTS idx_answers_question_id ON answers(question_id);",
        )?;

        Ok(())
    }

    // ==================== questions ====================

    /// Persist one record with its images and answers in a single
    /// transaction. Returns the new row id.
    pub fn insert_question(&self, record: &QuestionRecord) -> Result<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO questions
             (number, title, content, keywords, categories, difficulty, source,
              has_images, has_formulas, answer_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                record.number.as_deref().and_then(|n| n.parse::<i64>().ok()),
                record.title,
                record.content,
                serde_json::to_string(&record.keywords)?,
                serde_json::to_string(&record.categories)?,
                record.metadata.difficulty,
                record.metadata.source,
                record.metadata.has_images,
                record.metadata.has_formulas,
                record.metadata.answer_count as i64,
                now,
                now,
            ],
        )?;
        let question_id = tx.last_insert_rowid();

        for image in &record.images {
            tx.execute(
                "INSERT INTO images
                 (question_id, image_id, type, data, latex, media_type, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    question_id,
                    image.id,
                    image.kind,
                    image.data,
                    image.latex,
                    image.media_type,
                    image.name,
                    now,
                ],
            )?;
        }

        for answer in &record.answers {
            tx.execute(
                "INSERT INTO answers (question_id, answer_id, content, is_correct, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![question_id, answer.id, answer.content, answer.correct, now],
            )?;
        }

        tx.commit()?;
        Ok(question_id)
    }

    /// Rebuild a full record from its rows.
    pub fn get_question(&self, id: i64) -> Result<Option<QuestionRecord>> {
        let conn = self.lock();

        let mut stmt = conn.prepare(
            "SELECT number, title, content, keywords, categories, difficulty, source,
                    has_images, has_formulas, answer_count
             FROM questions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let number: Option<i64> = row.get(0)?;
        let title: String = row.get(1)?;
        let content: String = row.get(2)?;
        let keywords: Option<String> = row.get(3)?;
        let categories: Option<String> = row.get(4)?;
        let metadata = QuestionMetadata {
            difficulty: row.get(5)?,
            source: row.get(6)?,
            has_images: row.get(7)?,
            has_formulas: row.get(8)?,
            answer_count: row.get::<_, i64>(9)? as usize,
            extraction_method: None,
        };
        drop(rows);
        drop(stmt);

        let mut stmt = conn.prepare(
            "SELECT image_id, type, data, latex, media_type, name
             FROM images WHERE question_id = ?1 ORDER BY id",
        )?;
        let images = stmt
            .query_map(rusqlite::params![id], |row| {
                Ok(ImageAsset {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    data: row.get(2)?,
                    latex: row.get(3)?,
                    media_type: row.get(4)?,
                    name: row.get(5)?,
                    svg: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut stmt = conn.prepare(
            "SELECT answer_id, content, is_correct
             FROM answers WHERE question_id = ?1 ORDER BY id",
        )?;
        let answers = stmt
            .query_map(rusqlite::params![id], |row| {
                Ok(Answer {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    correct: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(QuestionRecord {
            number: number.map(|n| n.to_string()),
            title,
            keywords: keywords
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            categories: categories
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            content,
            images,
            answers,
            metadata,
            resolution: None,
            correct_answer: None,
        }))
    }

    /// Persisted questions, newest first.
    pub fn list_questions(&self) -> Result<Vec<QuestionSummary>> {
        let conn = self.lock();

        let mut stmt = conn.prepare(
            "SELECT id, number, title, answer_count, has_images, created_at
             FROM questions ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, number, title, answer_count, has_images, created_at)| {
                Ok(QuestionSummary {
                    id,
                    number: number.map(|n| n.to_string()),
                    title,
                    answer_count: answer_count as usize,
                    has_images,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    /// Delete a question; image and answer rows cascade.
    pub fn delete_question(&self, id: i64) -> Result<bool> {
        let conn = self.lock();
        let affected =
            conn.execute("DELETE FROM questions WHERE id = ?1", rusqlite::params![id])?;
        Ok(affected > 0)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad timestamp in database: {}", raw))?;
    Ok(parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> QuestionRecord {
        QuestionRecord {
            number: Some("69".to_string()),
            title: "Question 69: A polynomial".to_string(),
            keywords: vec!["polynomial".to_string(), "roots".to_string()],
            categories: vec!["algebra".to_string()],
            content: "A polynomial {{0}} is such that".to_string(),
            images: vec![
                ImageAsset::formula(0, "P(x) = x^2".to_string()),
                ImageAsset::picture(
                    1,
                    Some("diagram".to_string()),
                    "aGVsbG8=".to_string(),
                    "image/png".to_string(),
                    Some("<svg/>".to_string()),
                ),
            ],
            answers: vec![
                Answer {
                    id: "a".to_string(),
                    content: "P(0) = 3".to_string(),
                    correct: false,
                },
                Answer {
                    id: "b".to_string(),
                    content: "P(0) = 1".to_string(),
                    correct: true,
                },
            ],
            metadata: QuestionMetadata {
                has_images: true,
                has_formulas: true,
                answer_count: 2,
                difficulty: None,
                source: None,
                extraction_method: None,
            },
            resolution: None,
            correct_answer: None,
        }
    }

    #[test]
    fn test_insert_and_fetch_round_trip() {
        let db = DatabaseService::in_memory().unwrap();
        let id = db.insert_question(&sample_record()).unwrap();

        let fetched = db.get_question(id).unwrap().unwrap();
        assert_eq!(fetched.number.as_deref(), Some("69"));
        assert_eq!(fetched.title, "Question 69: A polynomial");
        assert_eq!(fetched.keywords, vec!["polynomial", "roots"]);
        assert_eq!(fetched.categories, vec!["algebra"]);
        assert_eq!(fetched.images.len(), 2);
        assert_eq!(fetched.images[0].kind, "formula");
        assert_eq!(fetched.images[0].latex.as_deref(), Some("P(x) = x^2"));
        assert_eq!(fetched.images[1].kind, "image");
        assert_eq!(fetched.answers.len(), 2);
        assert!(fetched.answers[1].correct);
        assert!(fetched.metadata.has_formulas);
    }

    #[test]
    fn test_get_missing_question() {
        let db = DatabaseService::in_memory().unwrap();
        assert!(db.get_question(999).unwrap().is_none());
    }

    #[test]
    fn test_list_questions_newest_first() {
        let db = DatabaseService::in_memory().unwrap();
        let mut record = sample_record();
        db.insert_question(&record).unwrap();
        record.title = "Question 70: Another".to_string();
        let second = db.insert_question(&record).unwrap();

        let summaries = db.list_questions().unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, second);
        assert_eq!(summaries[0].answer_count, 2);
    }

    #[test]
    fn test_delete_cascades() {
        let db = DatabaseService::in_memory().unwrap();
        let id = db.insert_question(&sample_record()).unwrap();

        assert!(db.delete_question(id).unwrap());
        assert!(!db.delete_question(id).unwrap());
        assert!(db.get_question(id).unwrap().is_none());

        let conn = db.lock();
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM answers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
