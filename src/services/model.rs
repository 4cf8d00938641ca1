//! Model API client
//! Talks to the Anthropic Messages API over HTTP for the three AI-assisted
//! paths: image classification, whole-question extraction, and resolution
//! generation. The client is constructed from configuration and passed in
//! wherever it is needed; there is no process-wide instance.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Answer, ApiUsage, ImageUpload, QuestionRecord};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-opus-5";

/// Model client configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 4096,
        }
    }
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormulaAnalysis {
    #[serde(default, rename = "isFormula")]
    pub is_formula: bool,
    #[serde(default)]
    pub latex: Option<String>,
}

/// Resolution produced for a question.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub correct_answer: Option<String>,
    pub resolution: String,
}

// ==================== wire types ====================

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    media_type: &'a str,
    data: &'a str,
}

impl<'a> ImageSource<'a> {
    fn base64(media_type: &'a str, data: &'a str) -> Self {
        Self {
            kind: "base64",
            media_type,
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

// ==================== client ====================

/// Client for the hosted model API.
#[derive(Debug, Clone)]
pub struct ModelClient {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(
        &self,
        system: Option<&str>,
        content: Vec<ContentBlock<'_>>,
        max_tokens: u32,
    ) -> Result<(String, ApiUsage)> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens,
            system,
            messages: vec![RequestMessage {
                role: "user",
                content,
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("model API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("model API returned {}: {}", status, body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("failed to decode model API response")?;

        let text = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.trim().to_string())
            .ok_or_else(|| anyhow!("model API response had no text content"))?;

        let usage = ApiUsage {
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            images_analyzed: 0,
        };

        Ok((text, usage))
    }

    /// Classify one image as formula or plain picture.
    ///
    /// Classification failures degrade to "not a formula" at the call site;
    /// this method still reports them so the pipeline can log the cause.
    pub async fn analyze_image(
        &self,
        data: &str,
        media_type: &str,
    ) -> Result<(FormulaAnalysis, ApiUsage)> {
        let prompt = ExtractionPrompt::classify_image();
        let content = vec![
            ContentBlock::Image {
                source: ImageSource::base64(media_type, data),
            },
            ContentBlock::Text { text: &prompt },
        ];

        let (text, mut usage) = self.send(None, content, 1024).await?;
        usage.images_analyzed = 1;

        let analysis: FormulaAnalysis = serde_json::from_str(strip_code_fence(&text))
            .context("failed to parse classification JSON")?;
        Ok((analysis, usage))
    }

    /// Extract a whole question record from raw content and images, letting
    /// the model do the segmentation instead of the regex heuristic.
    pub async fn extract_question(
        &self,
        question_content: &str,
        images: &[ImageUpload],
        custom_instructions: Option<&str>,
    ) -> Result<(ModelExtraction, ApiUsage)> {
        let prompt = ExtractionPrompt::extract_question(question_content, custom_instructions);

        let mut content = Vec::with_capacity(images.len() + 1);
        for img in images {
            if let (Some(data), Some(media_type)) = (img.data.as_deref(), img.media_type.as_deref())
            {
                content.push(ContentBlock::Image {
                    source: ImageSource::base64(media_type, data),
                });
            }
        }
        content.push(ContentBlock::Text { text: &prompt });

        let (text, usage) = self.send(None, content, self.config.max_tokens).await?;

        let extraction: ModelExtraction = serde_json::from_str(strip_code_fence(&text))
            .context("model returned invalid extraction JSON")?;
        Ok((extraction, usage))
    }

    /// Generate a step-by-step resolution for an extracted question.
    pub async fn generate_resolution(
        &self,
        question: &QuestionRecord,
        images: &[ImageUpload],
        custom_instructions: Option<&str>,
    ) -> Result<(Resolution, ApiUsage)> {
        let prompt = ExtractionPrompt::generate_resolution(question, custom_instructions);

        let mut content = Vec::with_capacity(images.len() + 1);
        for img in images {
            if let (Some(data), Some(media_type)) = (img.data.as_deref(), img.media_type.as_deref())
            {
                content.push(ContentBlock::Image {
                    source: ImageSource::base64(media_type, data),
                });
            }
        }
        content.push(ContentBlock::Text { text: &prompt });

        let (text, usage) = self.send(None, content, self.config.max_tokens).await?;

        let value: Value = serde_json::from_str(strip_code_fence(&text))
            .context("model returned invalid resolution JSON")?;

        let resolution = Resolution {
            correct_answer: value
                .get("correctAnswer")
                .and_then(Value::as_str)
                .map(str::to_string),
            resolution: value
                .get("resolution")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
        Ok((resolution, usage))
    }
}

/// Question record as the model reports it, before image post-processing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelExtraction {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub images: Vec<ModelImageAnalysis>,
}

/// Per-image classification inside a model extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelImageAnalysis {
    #[serde(rename = "imageIndex")]
    pub image_index: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub latex: Option<String>,
}

/// Unwrap a JSON payload that may arrive fenced in a markdown code block.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag on the fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

// ==================== prompts ====================

/// Prompt builders for the extraction and resolution calls.
pub struct ExtractionPrompt;

impl ExtractionPrompt {
    /// Decide whether an image is a mathematical formula, and transcribe it.
    pub fn classify_image() -> String {
        r#"Analyze this image and determine if it contains a mathematical formula, equation, or mathematical expression.

If it DOES contain a mathematical formula:
- Respond with JSON: {"isFormula": true, "latex": "the LaTeX representation"}
- Convert the entire mathematical content to LaTeX notation
- Use proper LaTeX syntax (\frac{}{}, \sqrt{}, ^{}, _{}, etc.)

If it does NOT contain a mathematical formula (regular image, diagram, photo, etc.):
- Respond with JSON: {"isFormula": false}

Only respond with the JSON object, nothing else."#
            .to_string()
    }

    /// Full model-assisted extraction of a question record.
    pub fn extract_question(content: &str, custom_instructions: Option<&str>) -> String {
        let extra = match custom_instructions {
            Some(text) if !text.trim().is_empty() => {
                format!("\n**Additional Instructions from User**:\n{}\n", text)
            }
            _ => String::new(),
        };

        format!(
            r#"You are an expert at parsing educational content, specifically exam questions.
Extract the following information from the provided question content:

1. **Question Number**: If present (e.g., "69.")
2. **Question Text**: The main question content (may contain image placeholders like {{{{0}}}}, {{{{1}}}})
3. **Answer Options**: All answer choices (typically labeled a, b, c, d, e - can be formatted as "a)", "a.", "A)", "A.", etc.)
4. **Keywords**: 3-5 relevant keywords from the question
5. **Title**: A brief title (first sentence or 60 characters max)
6. **Images**: Analyze each image and determine if it's a formula or regular image

**IMPORTANT**:
- For each image, detect if it contains a mathematical formula
- If an image is a formula, convert it to LaTeX notation and mark type as "formula"
- If an image is NOT a formula, mark type as "image"
- Preserve image placeholders in the format {{{{0}}}}, {{{{1}}}}, {{{{2}}}}, etc.
- Extract all answer options regardless of formatting (a), a., A), A., etc.)
- Each answer should have an id (a, b, c, d, e) and content
{extra}
**Question Content:**
{content}

Respond with a JSON object in this exact format:
{{
  "number": "question number or null",
  "title": "brief title",
  "keywords": ["keyword1", "keyword2", "keyword3"],
  "content": "question text with image placeholders",
  "answers": [
    {{"id": "a", "content": "answer A text", "correct": false}},
    {{"id": "b", "content": "answer B text", "correct": false}}
  ],
  "images": [
    {{"imageIndex": 0, "type": "formula", "latex": "LaTeX notation"}},
    {{"imageIndex": 1, "type": "image"}}
  ]
}}

Only respond with the JSON object, nothing else."#
        )
    }

    /// Step-by-step resolution for a question plus its answer options.
    pub fn generate_resolution(
        question: &QuestionRecord,
        custom_instructions: Option<&str>,
    ) -> String {
        let answers = if question.answers.is_empty() {
            "No answers provided".to_string()
        } else {
            question
                .answers
                .iter()
                .map(|a| format!("{}) {}", a.id, a.content))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let extra = match custom_instructions {
            Some(text) if !text.trim().is_empty() => {
                format!("\n**Additional Instructions**:\n{}\n", text)
            }
            _ => String::new(),
        };

        format!(
            r#"You are an expert educator and problem solver.
Your task is to provide a detailed, step-by-step resolution for this educational question.

**Question Content**:
{content}

**Answer Options**:
{answers}
{extra}
**Your Task**:
1. Analyze the question carefully
2. Identify the correct answer (a, b, c, d, or e)
3. Provide a detailed, educational explanation with:
   - Step-by-step reasoning
   - Key concepts involved
   - Why the correct answer is right
   - Why other answers are wrong (if relevant)
   - Tips or insights that would help a student understand

Write your explanation in a clear, educational manner. Use markdown formatting for better readability.

Respond with a JSON object in this exact format:
{{
  "correctAnswer": "a",
  "resolution": "Detailed step-by-step explanation here. Use markdown formatting."
}}

Only respond with the JSON object, nothing else."#,
            content = question.content,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionMetadata;

    fn sample_record() -> QuestionRecord {
        QuestionRecord {
            number: Some("7".to_string()),
            title: "Question 7: A polynomial".to_string(),
            keywords: vec!["polynomial".to_string()],
            categories: Vec::new(),
            content: "A polynomial satisfies P(x) = x".to_string(),
            images: Vec::new(),
            answers: vec![
                Answer {
                    id: "a".to_string(),
                    content: "P(0) = 0".to_string(),
                    correct: false,
                },
                Answer {
                    id: "b".to_string(),
                    content: "P(0) = 1".to_string(),
                    correct: false,
                },
            ],
            metadata: QuestionMetadata::default(),
            resolution: None,
            correct_answer: None,
        }
    }

    #[test]
    fn test_strip_code_fence_plain() {
        assert_eq!(strip_code_fence(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_strip_code_fence_json_block() {
        let fenced = "```json\n{\"isFormula\": false}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"isFormula\": false}");
    }

    #[test]
    fn test_strip_code_fence_bare_block() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_classification_parsing() {
        let analysis: FormulaAnalysis =
            serde_json::from_str(strip_code_fence("```json\n{\"isFormula\": true, \"latex\": \"x^2\"}\n```")).unwrap();
        assert!(analysis.is_formula);
        assert_eq!(analysis.latex.as_deref(), Some("x^2"));
    }

    #[test]
    fn test_extraction_prompt_includes_content_and_instructions() {
        let prompt = ExtractionPrompt::extract_question("What is 2+2?", Some("Answer in English"));
        assert!(prompt.contains("What is 2+2?"));
        assert!(prompt.contains("Answer in English"));
        assert!(prompt.contains("{{0}}"));
    }

    #[test]
    fn test_resolution_prompt_lists_answers() {
        let prompt = ExtractionPrompt::generate_resolution(&sample_record(), None);
        assert!(prompt.contains("a) P(0) = 0"));
        assert!(prompt.contains("b) P(0) = 1"));
    }

    #[test]
    fn test_resolution_prompt_without_answers() {
        let mut record = sample_record();
        record.answers.clear();
        let prompt = ExtractionPrompt::generate_resolution(&record, None);
        assert!(prompt.contains("No answers provided"));
    }

    #[test]
    fn test_model_extraction_parsing() {
        let payload = r#"{
            "number": "12",
            "title": "A title",
            "keywords": ["k1"],
            "content": "Stem {{0}}",
            "answers": [{"id": "a", "content": "one", "correct": false}],
            "images": [{"imageIndex": 0, "type": "formula", "latex": "e=mc^2"}]
        }"#;
        let extraction: ModelExtraction = serde_json::from_str(payload).unwrap();
        assert_eq!(extraction.number.as_deref(), Some("12"));
        assert_eq!(extraction.images[0].kind, "formula");
        assert_eq!(extraction.images[0].latex.as_deref(), Some("e=mc^2"));
    }
}
