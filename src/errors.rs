use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("Resource already exists: {0}")]
    DuplicateResource(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The store schema predates the draft workflow; carries the exact
    /// statement an administrator needs to run.
    #[error("Database schema update needed: {details}")]
    SchemaOutOfDate { details: String, sql_hint: String },

    #[error("Internal server error: {0}")]
    #[allow(dead_code)]
    InternalError(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(
                        context
                            .user_friendly_message
                            .unwrap_or_else(|| format!("{} not found", context.resource_type)),
                    )),
                )
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::DuplicateResource(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Duplicate resource"
                );
                (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::BadRequest(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Bad request"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::SchemaOutOfDate { details, sql_hint } => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    sql_hint = %sql_hint,
                    "Schema out of date"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(format!(
                        "Database schema update needed: {}. Run: {}",
                        details, sql_hint
                    ))),
                )
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "Database operation failed. Please try again.".to_string(),
                    )),
                )
            }
            ApiError::InternalError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Internal server error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "An internal error occurred. Please try again.".to_string(),
                    )),
                )
            }
        }
    }

    /// Simple conversion without context
    #[allow(dead_code)]
    pub fn to_response(self) -> (StatusCode, Json<ApiResponse<()>>) {
        let context = ErrorContext::new("unknown", "resource");
        self.to_response_with_context(context)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(anyhow::Error::from(err))
    }
}

/// Map service-layer anyhow errors onto the API taxonomy from their
/// message text. The "no such column: published" case comes up when the
/// service runs against a questions table created before the draft
/// workflow existed; it carries the repair statement instead of a generic
/// failure (see also the add_question_columns binary).
pub fn classify_database_error(error: &anyhow::Error) -> ApiError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("no such column")
        && (error_str.contains("published") || error_str.contains("draft_of"))
    {
        ApiError::SchemaOutOfDate {
            details: "the questions table is missing the draft workflow columns".to_string(),
            sql_hint:
                "ALTER TABLE questions ADD COLUMN published INTEGER NOT NULL DEFAULT 0; \
                 ALTER TABLE questions ADD COLUMN draft_of TEXT;"
                    .to_string(),
        }
    } else if error_str.contains("already exists") || error_str.contains("unique constraint") {
        ApiError::DuplicateResource("Resource already exists".to_string())
    } else if error_str.contains("not found") || error_str.contains("no rows") {
        ApiError::NotFound(error.to_string())
    } else if error_str.contains("is required")
        || error_str.contains("must be marked correct")
        || error_str.contains("cannot be null")
    {
        ApiError::ValidationError(error.to_string())
    } else {
        ApiError::DatabaseError(anyhow::anyhow!("{}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("publish_chapter", "chapter")
            .with_id("123")
            .with_user_message("Custom message");

        assert_eq!(context.operation, "publish_chapter");
        assert_eq!(context.resource_type, "chapter");
        assert_eq!(context.resource_id, Some("123".to_string()));
        assert_eq!(
            context.user_friendly_message,
            Some("Custom message".to_string())
        );
    }

    #[test]
    fn test_error_classification() {
        let not_found_error =
            anyhow::anyhow!("original chapter 'abc' not found for draft 'def'");
        let classified = classify_database_error(&not_found_error);
        assert!(matches!(classified, ApiError::NotFound(_)));

        let validation_error = anyhow::anyhow!("title is required");
        let classified = classify_database_error(&validation_error);
        assert!(matches!(classified, ApiError::ValidationError(_)));

        let choice_error = anyhow::anyhow!("at least one choice must be marked correct");
        let classified = classify_database_error(&choice_error);
        assert!(matches!(classified, ApiError::ValidationError(_)));

        let duplicate_error = anyhow::anyhow!("UNIQUE constraint failed: quizzes.id");
        let classified = classify_database_error(&duplicate_error);
        assert!(matches!(classified, ApiError::DuplicateResource(_)));
    }

    #[test]
    fn test_missing_column_classifies_as_schema_hint() {
        let schema_error = anyhow::anyhow!("error returned from database: no such column: published");
        let classified = classify_database_error(&schema_error);
        match classified {
            ApiError::SchemaOutOfDate { sql_hint, .. } => {
                assert!(sql_hint.contains("ALTER TABLE questions"));
            }
            other => panic!("expected SchemaOutOfDate, got {other:?}"),
        }
    }

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::NotFound("Chapter not found".to_string());
        let context = ErrorContext::new("get_chapter", "chapter").with_id("123");
        let (status, _response) = error.to_response_with_context(context);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let error = ApiError::ValidationError("Invalid data".to_string());
        let (status, _) = error.to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let error = ApiError::SchemaOutOfDate {
            details: "missing column".to_string(),
            sql_hint: "ALTER TABLE questions ADD COLUMN published INTEGER;".to_string(),
        };
        let (status, _) = error.to_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
