use serde::{Deserialize, Serialize};

/// One answer option in a question record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub correct: bool,
}

/// An image attached to a question, either a recognized formula or a plain
/// picture. Formulas carry LaTeX and leave `svg` to the client-side renderer;
/// pictures keep their original base64 payload plus a traced SVG when the
/// vectorizer succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex: Option<String>,
    pub svg: Option<String>,
}

impl ImageAsset {
    pub fn formula(index: usize, latex: String) -> Self {
        Self {
            id: format!("formula_{}", index),
            kind: "formula".to_string(),
            name: None,
            data: None,
            media_type: None,
            latex: Some(latex),
            svg: None,
        }
    }

    pub fn picture(
        index: usize,
        name: Option<String>,
        data: String,
        media_type: String,
        svg: Option<String>,
    ) -> Self {
        Self {
            id: format!("img_{}", index),
            kind: "image".to_string(),
            name: Some(name.unwrap_or_else(|| format!("image_{}", index))),
            data: Some(data),
            media_type: Some(media_type),
            latex: None,
            svg,
        }
    }

    pub fn is_formula(&self) -> bool {
        self.kind == "formula"
    }
}

/// Derived facts about a question record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
    pub has_images: bool,
    pub has_formulas: bool,
    pub answer_count: usize,
    pub difficulty: Option<String>,
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
}

/// A fully extracted question, the envelope every extraction path produces
/// and the persistence layer stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub number: Option<String>,
    pub title: String,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub content: String,
    pub images: Vec<ImageAsset>,
    pub answers: Vec<Answer>,
    pub metadata: QuestionMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

/// An image descriptor as posted by the editor: base64 payload plus its
/// media type. Entries missing either field are skipped by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Token and image accounting accumulated across model API calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub images_analyzed: u32,
}

impl ApiUsage {
    pub fn add(&mut self, other: ApiUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.images_analyzed += other.images_analyzed;
    }
}

/// A user account kept in the flat-file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
