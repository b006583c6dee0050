pub mod approval;
pub mod envelope;
pub mod llm;
