//! Question extraction service
//! Composes the text segmenter with keyword extraction, title generation,
//! and the image pipeline into a full question record. Two paths produce the
//! same envelope: the regex heuristic (always available) and the
//! model-assisted path (when an API key is configured).

use std::sync::Arc;

use anyhow::{anyhow, Result};
use regex::Regex;

use crate::models::{Answer, ApiUsage, ImageAsset, ImageUpload, QuestionMetadata, QuestionRecord};
use crate::services::model::{ModelClient, Resolution};
use crate::services::segmenter;
use crate::services::tracer::Tracer;

/// Stop words excluded from keyword extraction. The corpus this service was
/// built for is Portuguese-language exam text.
const STOP_WORDS: &[&str] = &[
    "para", "como", "qual", "onde", "quando", "porque", "este", "esta", "esse", "essa", "neste",
    "nesta", "pelo", "pela", "pelos", "pelas", "todos", "todas", "todo", "toda", "caso", "tem-se",
    "sendo",
];

/// Extraction orchestrator. The model client is optional; without it the
/// heuristic path still works and every image is treated as a plain picture.
#[derive(Clone)]
pub struct ExtractionService {
    model: Option<Arc<ModelClient>>,
    tracer: Arc<Tracer>,
}

impl ExtractionService {
    pub fn new(model: Option<Arc<ModelClient>>, tracer: Arc<Tracer>) -> Self {
        Self { model, tracer }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Heuristic extraction: segment the text, enrich with keywords and a
    /// title, classify and trace the images.
    ///
    /// Per-image failures are tolerated; the record always comes back.
    pub async fn extract(
        &self,
        content: &str,
        images: &[ImageUpload],
    ) -> (QuestionRecord, ApiUsage) {
        let segmented = segmenter::segment(content);

        let answers: Vec<Answer> = segmented
            .answers
            .iter()
            .map(|answer| Answer {
                id: answer.label.to_string(),
                content: answer.text.clone(),
                correct: false,
            })
            .collect();

        let (assets, usage) = self.process_images(images).await;

        let plain_text = strip_placeholders(&segmented.stem);
        let keywords = extract_keywords(&plain_text);
        let title = generate_title(&plain_text, segmented.number.as_deref());

        let record = QuestionRecord {
            metadata: build_metadata(&assets, answers.len(), None),
            number: segmented.number,
            title,
            keywords,
            categories: Vec::new(),
            content: segmented.stem,
            images: assets,
            answers,
            resolution: None,
            correct_answer: None,
        };

        (record, usage)
    }

    /// Model-assisted extraction: the model segments, titles, and classifies
    /// in one call; this side only runs the tracer over non-formula images.
    pub async fn extract_with_model(
        &self,
        content: &str,
        images: &[ImageUpload],
        custom_instructions: Option<&str>,
    ) -> Result<(QuestionRecord, ApiUsage)> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("model API key not configured"))?;

        let (extraction, mut usage) = model
            .extract_question(content, images, custom_instructions)
            .await?;
        usage.images_analyzed = images.len() as u32;

        let mut assets = Vec::new();
        if extraction.images.is_empty() {
            // model did not classify; fall back to tracing everything
            let (traced, trace_usage) = self.trace_all(images).await;
            usage.add(trace_usage);
            assets = traced;
        } else {
            for analysis in &extraction.images {
                let Some(original) = images.get(analysis.image_index) else {
                    continue;
                };
                if analysis.kind == "formula" {
                    if let Some(latex) = analysis.latex.clone() {
                        assets.push(ImageAsset::formula(analysis.image_index, latex));
                        continue;
                    }
                }
                assets.push(self.trace_one(analysis.image_index, original).await);
            }
        }

        let record = QuestionRecord {
            metadata: build_metadata(&assets, extraction.answers.len(), Some("model")),
            number: extraction.number,
            title: extraction.title,
            keywords: extraction.keywords,
            categories: Vec::new(),
            content: extraction.content,
            images: assets,
            answers: extraction.answers,
            resolution: None,
            correct_answer: None,
        };

        Ok((record, usage))
    }

    /// Generate a resolution for an already-extracted record.
    pub async fn resolve(
        &self,
        question: &QuestionRecord,
        images: &[ImageUpload],
        custom_instructions: Option<&str>,
    ) -> Result<(Resolution, ApiUsage)> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("model API key not configured"))?;
        model
            .generate_resolution(question, images, custom_instructions)
            .await
    }

    /// Classify each image with the model when available, trace the rest.
    async fn process_images(&self, images: &[ImageUpload]) -> (Vec<ImageAsset>, ApiUsage) {
        let mut assets = Vec::new();
        let mut usage = ApiUsage::default();

        for (index, image) in images.iter().enumerate() {
            let (Some(data), Some(media_type)) =
                (image.data.as_deref(), image.media_type.as_deref())
            else {
                log::warn!("skipping image {}: missing data or media type", index);
                continue;
            };

            if let Some(model) = &self.model {
                match model.analyze_image(data, media_type).await {
                    Ok((analysis, call_usage)) => {
                        usage.add(call_usage);
                        if analysis.is_formula {
                            if let Some(latex) = analysis.latex {
                                assets.push(ImageAsset::formula(index, latex));
                                continue;
                            }
                        }
                    }
                    Err(err) => {
                        log::warn!("image {} classification failed: {:#}", index, err);
                    }
                }
            }

            assets.push(self.trace_one(index, image).await);
        }

        (assets, usage)
    }

    async fn trace_all(&self, images: &[ImageUpload]) -> (Vec<ImageAsset>, ApiUsage) {
        let mut assets = Vec::new();
        for (index, image) in images.iter().enumerate() {
            if image.data.is_none() || image.media_type.is_none() {
                continue;
            }
            assets.push(self.trace_one(index, image).await);
        }
        (assets, ApiUsage::default())
    }

    /// Trace one upload into a picture asset. A failed trace keeps the
    /// original base64 and leaves `svg` empty.
    async fn trace_one(&self, index: usize, image: &ImageUpload) -> ImageAsset {
        let data = image.data.clone().unwrap_or_default();
        let media_type = image
            .media_type
            .clone()
            .unwrap_or_else(|| "image/png".to_string());

        let svg = match Tracer::decode_payload(&data) {
            Ok(bytes) => match self.tracer.trace(&bytes).await {
                Ok(svg) => Some(svg),
                Err(err) => {
                    log::warn!("image {} vectorization failed: {:#}", index, err);
                    None
                }
            },
            Err(err) => {
                log::warn!("image {} has invalid payload: {:#}", index, err);
                None
            }
        };

        ImageAsset::picture(index, image.name.clone(), data, media_type, svg)
    }
}

fn build_metadata(
    assets: &[ImageAsset],
    answer_count: usize,
    extraction_method: Option<&str>,
) -> QuestionMetadata {
    QuestionMetadata {
        has_images: !assets.is_empty(),
        has_formulas: assets.iter().any(ImageAsset::is_formula),
        answer_count,
        difficulty: None,
        source: None,
        extraction_method: extraction_method.map(str::to_string),
    }
}

/// Remove `{{N}}` placeholder tokens from text.
pub fn strip_placeholders(text: &str) -> String {
    let pattern = Regex::new(r"\{\{\d+\}\}").unwrap();
    pattern.replace_all(text, "").to_string()
}

/// Pick up to five keywords from question text.
///
/// Words shorter than five characters and common stop words are dropped;
/// order of first appearance is preserved.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleanup = Regex::new(r"[^\w\sáàâãéèêíïóôõöúçñ]").unwrap();
    let cleaned = cleanup.replace_all(&text.to_lowercase(), " ").to_string();

    let mut keywords: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() <= 4 {
            continue;
        }
        if STOP_WORDS.contains(&word) {
            continue;
        }
        if keywords.iter().any(|existing| existing == word) {
            continue;
        }
        keywords.push(word.to_string());
        if keywords.len() == 5 {
            break;
        }
    }
    keywords
}

/// Build a short title from the first sentence of the question text,
/// truncated to 60 characters, prefixed with the item number when present.
pub fn generate_title(text: &str, number: Option<&str>) -> String {
    let first_sentence = text
        .split(['.', '!', '?'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    let mut title = if first_sentence.chars().count() > 60 {
        let short: String = first_sentence.chars().take(57).collect();
        format!("{}...", short)
    } else {
        first_sentence
    };

    if let Some(number) = number {
        title = format!("Question {}: {}", number, title);
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tracer::TracerConfig;

    fn service() -> ExtractionService {
        ExtractionService::new(None, Arc::new(Tracer::new(TracerConfig::default())))
    }

    #[test]
    fn test_keywords_filter_stop_words_and_short_words() {
        let keywords = extract_keywords("O polinômio para todo valor real admite solução inteira");
        assert!(keywords.contains(&"polinômio".to_string()));
        assert!(!keywords.contains(&"para".to_string()));
        assert!(!keywords.contains(&"todo".to_string()));
        assert!(keywords.len() <= 5);
    }

    #[test]
    fn test_keywords_are_unique_and_capped() {
        let keywords =
            extract_keywords("banana banana cereja damasco framboesa groselha jabuticaba laranja");
        assert_eq!(keywords.len(), 5);
        assert_eq!(keywords[0], "banana");
        assert_eq!(keywords.iter().filter(|k| *k == "banana").count(), 1);
    }

    #[test]
    fn test_keywords_strip_punctuation() {
        let keywords = extract_keywords("equation, equation! (matrix)");
        assert_eq!(keywords, vec!["equation", "matrix"]);
    }

    #[test]
    fn test_title_truncates_long_sentences() {
        let long = "a".repeat(80);
        let title = generate_title(&long, None);
        assert_eq!(title.chars().count(), 60);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_title_takes_first_sentence_and_number() {
        let title = generate_title("What is x? Explain fully", Some("69"));
        assert_eq!(title, "Question 69: What is x");
    }

    #[test]
    fn test_strip_placeholders() {
        assert_eq!(strip_placeholders("see {{0}} and {{12}} here"), "see  and  here");
        assert_eq!(strip_placeholders("{no} change"), "{no} change");
    }

    #[tokio::test]
    async fn test_heuristic_extract_without_images() {
        let (record, usage) = service()
            .extract("42. Question text\na) opt1\nb) opt2", &[])
            .await;

        assert_eq!(record.number.as_deref(), Some("42"));
        assert_eq!(record.content, "Question text");
        assert_eq!(record.answers.len(), 2);
        assert_eq!(record.answers[0].id, "a");
        assert_eq!(record.answers[0].content, "opt1");
        assert!(!record.answers[0].correct);
        assert_eq!(record.title, "Question 42: Question text");
        assert!(record.categories.is_empty());
        assert_eq!(record.metadata.answer_count, 2);
        assert!(!record.metadata.has_images);
        assert_eq!(usage, ApiUsage::default());
    }

    #[tokio::test]
    async fn test_heuristic_extract_skips_incomplete_images() {
        let images = vec![ImageUpload {
            name: Some("broken".to_string()),
            data: None,
            media_type: Some("image/png".to_string()),
        }];
        let (record, _) = service().extract("Just a stem", &images).await;
        assert!(record.images.is_empty());
        assert!(!record.metadata.has_images);
    }

    #[tokio::test]
    async fn test_model_path_requires_client() {
        let err = service()
            .extract_with_model("content", &[], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
