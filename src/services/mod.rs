// Service modules
// Core business logic behind the HTTP surface

pub mod database;
pub mod extractor;
pub mod model;
pub mod segmenter;
pub mod store;
pub mod tracer;

pub use database::{DatabaseService, QuestionSummary};
pub use extractor::{extract_keywords, generate_title, strip_placeholders, ExtractionService};
pub use model::{ExtractionPrompt, ModelClient, ModelConfig, Resolution};
pub use segmenter::{advanced_trim, segment, AnswerSegment, SegmentedQuestion};
pub use store::{QuestionStore, UserStore};
pub use tracer::{Tracer, TracerConfig};
