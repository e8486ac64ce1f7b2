use crate::ax_state::AppState;
use crate::core::extractor::extract_text;
use crate::core::prompt::build_prompt;
use crate::error::{AppError, Result};
use crate::models::context::{AnswerRecord, QuestionSet};
use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub const QUESTIONS_FIELD: &str = "questions_file";
pub const DOCUMENT_FIELD: &str = "document_file";

/// The two files of an `/answer` upload, read fully into memory.
#[derive(Debug)]
pub struct AnswerUpload {
    pub questions: Bytes,
    pub document_name: String,
    pub document: Bytes,
}

impl AnswerUpload {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut questions = None;
        let mut document = None;

        while let Some(field) = multipart.next_field().await? {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some(QUESTIONS_FIELD) => {
                    questions = Some(field.bytes().await?);
                }
                Some(DOCUMENT_FIELD) => {
                    let name = field.file_name().unwrap_or_default().to_string();
                    document = Some((name, field.bytes().await?));
                }
                _ => {}
            }
        }

        let questions = questions.ok_or(AppError::MissingField(QUESTIONS_FIELD))?;
        let (document_name, document) = document.ok_or(AppError::MissingField(DOCUMENT_FIELD))?;
        Ok(Self {
            questions,
            document_name,
            document,
        })
    }
}

pub fn parse_questions(raw: &[u8]) -> Result<QuestionSet> {
    serde_json::from_slice(raw).map_err(|e| AppError::MalformedQuestionsPayload(e.to_string()))
}

/// `POST /answer`
///
/// Extracts the document once, then asks the model each question in input
/// order, one call at a time. Any failure aborts the whole batch: the caller
/// gets either every answer or an error, never a partial list.
#[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn answer_questions(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Vec<AnswerRecord>>> {
    // 1. Read both uploads
    let upload = AnswerUpload::read(multipart).await?;
    info!(
        document = %upload.document_name,
        document_size = upload.document.len(),
        "answer request received"
    );

    // 2. Questions first, so a bad payload never costs a PDF parse
    let QuestionSet { questions } = parse_questions(&upload.questions)?;

    // 3. Flatten the document
    let document_text = extract_text(
        &upload.document_name,
        upload.document,
        state.config.staging_dir.clone(),
    )
    .await?;
    debug!(bytes = document_text.len(), questions = questions.len(), "document extracted");

    // 4. One model call per question, strictly sequential
    let total = questions.len();
    let mut records = Vec::with_capacity(total);
    for (idx, question) in questions.into_iter().enumerate() {
        let prompt = build_prompt(&document_text, &question);
        let answer = state.model.ask(&prompt).await?;
        debug!(index = idx + 1, total, "question answered");
        records.push(AnswerRecord { question, answer });
    }

    info!(answered = records.len(), "answer request complete");
    Ok(Json(records))
}
