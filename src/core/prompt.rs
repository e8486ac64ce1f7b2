/// Builds the single-turn prompt sent to the model for one question.
/// The whole document is embedded verbatim; context limits are the model's problem.
pub fn build_prompt(document_text: &str, question: &str) -> String {
    format!(
        "Answer the question based on the following document:\nDocument: {}\nQuestion: {}",
        document_text, question
    )
}
