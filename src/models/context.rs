use serde::{Deserialize, Serialize};

/// Uploaded questions file: `{"questions": ["...", ...]}`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct QuestionSet {
    pub questions: Vec<String>,
}

/// One answered question. `/answer` returns these in input order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
}
