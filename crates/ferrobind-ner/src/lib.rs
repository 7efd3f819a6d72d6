//! Rule-based fact extraction from article text.
//!
//! Recognizers are independent pure functions over the text, one per fact
//! kind; the extractor scores, filters and deduplicates their hits.

pub mod extractor;
pub mod recognizers;
pub mod sentences;
pub mod vocabulary;

pub use extractor::{ExtractorConfig, FactExtractor};
pub use recognizers::Hit;
pub use vocabulary::{Vocabulary, VocabularyMatch};
