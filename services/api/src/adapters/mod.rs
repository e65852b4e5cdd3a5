pub mod db;
pub mod explanation_llm;
pub mod flashcard_llm;
mod llm_support;

pub use db::DbAdapter;
pub use explanation_llm::OpenAiExplanationAdapter;
pub use flashcard_llm::OpenAiFlashcardAdapter;
