use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    chapter_service::ChapterService,
    errors::{classify_database_error, ApiError, ErrorContext},
    grading_service::GradingService,
    models::*,
    question_service::QuestionService,
};

// Import logging macros
use crate::{log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub chapter_service: ChapterService,
    pub question_service: QuestionService,
    pub grading_service: GradingService,
}

#[derive(Deserialize)]
pub struct CourseScopeParams {
    pub course_id: Uuid,
}

#[derive(Deserialize)]
pub struct QuestionListParams {
    pub chapter_id: Uuid,
    pub is_practice: Option<bool>,
}

#[derive(Deserialize)]
pub struct QuestionScopeParams {
    pub quiz_id: Option<Uuid>,
    pub chapter_id: Option<Uuid>,
    pub is_practice: Option<bool>,
}

#[derive(Deserialize)]
pub struct PracticeParams {
    pub practice: Option<bool>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

// Course endpoints
pub async fn create_course(
    State(state): State<AppState>,
    Json(request): Json<CreateCourseRequest>,
) -> Result<Json<ApiResponse<Course>>, HandlerError> {
    info!(title = %request.title, "Creating new course");

    match state.chapter_service.create_course(request).await {
        Ok(course) => {
            log_api_success!("create_course", course_id = course.id, "course created");
            Ok(Json(ApiResponse::success(course)))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("create_course", "course");
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn get_courses(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Course>>>, StatusCode> {
    match state.chapter_service.get_all_courses().await {
        Ok(courses) => Ok(Json(ApiResponse::success(courses))),
        Err(e) => {
            error!(error = %e, "Error listing courses");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CourseWithChapters>>, HandlerError> {
    log_api_start!("get_course", course_id = id);

    match state.chapter_service.get_course_with_chapters(id).await {
        Ok(Some(course)) => Ok(Json(ApiResponse::success(course))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Course with ID '{}' not found", id));
            let context = ErrorContext::new("get_course", "course").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_course", "course").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// Chapter endpoints (authoring)
pub async fn list_admin_chapters(
    State(state): State<AppState>,
    Query(params): Query<CourseScopeParams>,
) -> Result<Json<ApiResponse<Vec<Chapter>>>, HandlerError> {
    debug!(course_id = %params.course_id, "Listing chapters for authoring");

    match state
        .chapter_service
        .list_chapters(params.course_id, false)
        .await
    {
        Ok(chapters) => {
            debug!(chapter_count = chapters.len(), "Chapters retrieved (drafts collapsed)");
            Ok(Json(ApiResponse::success(chapters)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("list_admin_chapters", "chapter");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn create_chapter(
    State(state): State<AppState>,
    Json(request): Json<CreateChapterRequest>,
) -> Result<Json<ApiResponse<Chapter>>, HandlerError> {
    info!(
        course_id = %request.course_id,
        title = %request.title,
        draft_of = ?request.draft_of,
        "Creating new chapter"
    );

    match state.chapter_service.create_chapter(request).await {
        Ok(chapter) => {
            log_api_success!("create_chapter", chapter_id = chapter.id, "chapter created");
            Ok(Json(ApiResponse::success(chapter)))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("create_chapter", "chapter");
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn get_admin_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Chapter>>, HandlerError> {
    log_api_start!("get_chapter", chapter_id = id);

    match state.chapter_service.get_chapter(id).await {
        Ok(Some(chapter)) => Ok(Json(ApiResponse::success(chapter))),
        Ok(None) => {
            log_api_warn!("get_chapter", chapter_id = id, "chapter not found");
            let error = ApiError::NotFound(format!("Chapter with ID '{}' not found", id));
            let context = ErrorContext::new("get_chapter", "chapter").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("get_chapter", "chapter").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn update_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateChapterRequest>,
) -> Result<Json<ApiResponse<Chapter>>, HandlerError> {
    info!(
        chapter_id = %id,
        draft = request.draft,
        "Updating chapter"
    );

    match state.chapter_service.update_chapter(id, request).await {
        Ok(Some(chapter)) => {
            log_api_success!("update_chapter", chapter_id = id, "chapter updated");
            Ok(Json(ApiResponse::success(chapter)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Chapter with ID '{}' not found", id));
            let context = ErrorContext::new("update_chapter", "chapter").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("update_chapter", "chapter").with_id(&id.to_string());
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn publish_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<ApiResponse<Chapter>>, HandlerError> {
    info!(
        chapter_id = %id,
        published = request.published,
        "Updating chapter publish state"
    );

    match state
        .chapter_service
        .publish_chapter(id, request.published)
        .await
    {
        Ok(Some(chapter)) => {
            log_api_success!(
                "publish_chapter",
                chapter_id = chapter.id,
                if request.published { "chapter published" } else { "chapter unpublished" }
            );
            Ok(Json(ApiResponse::success(chapter)))
        }
        Ok(None) => {
            log_api_warn!("publish_chapter", chapter_id = id, "chapter not found");
            let error = ApiError::NotFound(format!("Chapter with ID '{}' not found", id));
            let context = ErrorContext::new("publish_chapter", "chapter").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("publish_chapter", "chapter").with_id(&id.to_string());
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn publish_course_drafts(
    State(state): State<AppState>,
    Query(params): Query<CourseScopeParams>,
) -> Result<Json<ApiResponse<BulkPublishOutcome>>, HandlerError> {
    log_api_start!("publish_course_drafts", course_id = params.course_id);

    match state
        .chapter_service
        .publish_all_drafts(params.course_id)
        .await
    {
        Ok(outcome) => {
            log_api_success!(
                "publish_course_drafts",
                count = outcome.promoted,
                "chapter drafts promoted"
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("publish_course_drafts", "chapter");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn discard_course_drafts(
    State(state): State<AppState>,
    Query(params): Query<CourseScopeParams>,
) -> Result<Json<ApiResponse<BulkDiscardOutcome>>, HandlerError> {
    log_api_start!("discard_course_drafts", course_id = params.course_id);

    match state
        .chapter_service
        .discard_all_drafts(params.course_id)
        .await
    {
        Ok(outcome) => {
            log_api_success!(
                "discard_course_drafts",
                count = outcome.discarded,
                "chapter drafts discarded"
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("discard_course_drafts", "chapter");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn delete_chapter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<bool>>, HandlerError> {
    info!(chapter_id = %id, "Deleting chapter");

    match state.chapter_service.delete_chapter(id).await {
        Ok(Some(())) => {
            log_api_success!("delete_chapter", chapter_id = id, "chapter and descendants deleted");
            Ok(Json(ApiResponse::success(true)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Chapter with ID '{}' not found", id));
            let context = ErrorContext::new("delete_chapter", "chapter").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("delete_chapter", "chapter").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// Chapter endpoints (student-facing)
pub async fn list_chapters(
    State(state): State<AppState>,
    Query(params): Query<CourseScopeParams>,
) -> Result<Json<ApiResponse<Vec<Chapter>>>, StatusCode> {
    match state
        .chapter_service
        .list_chapters(params.course_id, true)
        .await
    {
        Ok(chapters) => Ok(Json(ApiResponse::success(chapters))),
        Err(e) => {
            error!(course_id = %params.course_id, error = %e, "Error listing published chapters");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_chapter_quizzes(
    State(state): State<AppState>,
    Path(chapter_id): Path<Uuid>,
    Query(params): Query<PracticeParams>,
) -> Result<Json<ApiResponse<Vec<QuizWithQuestions>>>, StatusCode> {
    debug!(
        chapter_id = %chapter_id,
        practice = ?params.practice,
        "Listing quizzes for chapter (published questions only)"
    );

    match state
        .question_service
        .get_quizzes_with_questions(chapter_id, params.practice, true)
        .await
    {
        Ok(quizzes) => Ok(Json(ApiResponse::success(quizzes))),
        Err(e) => {
            error!(chapter_id = %chapter_id, error = %e, "Error listing quizzes for chapter");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Question endpoints (authoring)
pub async fn list_admin_questions(
    State(state): State<AppState>,
    Query(params): Query<QuestionListParams>,
) -> Result<Json<ApiResponse<Vec<QuestionWithChoices>>>, HandlerError> {
    debug!(
        chapter_id = %params.chapter_id,
        is_practice = ?params.is_practice,
        "Listing questions for authoring"
    );

    match state
        .question_service
        .list_questions(params.chapter_id, params.is_practice.unwrap_or(true))
        .await
    {
        Ok(questions) => {
            debug!(question_count = questions.len(), "Questions retrieved (drafts collapsed)");
            Ok(Json(ApiResponse::success(questions)))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("list_admin_questions", "question");
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn create_question(
    State(state): State<AppState>,
    Json(request): Json<CreateQuestionRequest>,
) -> Result<Json<ApiResponse<QuestionWithChoices>>, HandlerError> {
    info!(
        chapter_id = %request.chapter_id,
        choice_count = request.choices.len(),
        "Creating new question"
    );

    match state.question_service.create_question(request).await {
        Ok(question) => {
            log_api_success!(
                "create_question",
                question_id = question.question.id,
                "question created"
            );
            Ok(Json(ApiResponse::success(question)))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("create_question", "question");
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQuestionRequest>,
) -> Result<Json<ApiResponse<QuestionWithChoices>>, HandlerError> {
    info!(
        question_id = %id,
        draft = request.draft,
        has_choices = request.choices.is_some(),
        "Updating question"
    );

    match state.question_service.update_question(id, request).await {
        Ok(Some(question)) => {
            log_api_success!("update_question", question_id = id, "question updated");
            Ok(Json(ApiResponse::success(question)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Question with ID '{}' not found", id));
            let context = ErrorContext::new("update_question", "question").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("update_question", "question").with_id(&id.to_string());
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn publish_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<ApiResponse<QuestionWithChoices>>, HandlerError> {
    info!(
        question_id = %id,
        published = request.published,
        "Updating question publish state"
    );

    match state
        .question_service
        .publish_question(id, request.published)
        .await
    {
        Ok(Some(question)) => {
            log_api_success!(
                "publish_question",
                question_id = question.question.id,
                if request.published { "question published" } else { "question unpublished" }
            );
            Ok(Json(ApiResponse::success(question)))
        }
        Ok(None) => {
            log_api_warn!("publish_question", question_id = id, "question not found");
            let error = ApiError::NotFound(format!("Question with ID '{}' not found", id));
            let context =
                ErrorContext::new("publish_question", "question").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            // classify_database_error maps "no such column: published" to
            // the schema-repair hint for stores predating the draft workflow
            let classified = classify_database_error(&e);
            let context =
                ErrorContext::new("publish_question", "question").with_id(&id.to_string());
            Err(classified.to_response_with_context(context))
        }
    }
}

async fn resolve_question_scope(
    state: &AppState,
    params: &QuestionScopeParams,
) -> Result<Uuid, HandlerError> {
    if let Some(quiz_id) = params.quiz_id {
        return Ok(quiz_id);
    }

    let Some(chapter_id) = params.chapter_id else {
        let error = ApiError::BadRequest("quiz_id or chapter_id required".to_string());
        let context = ErrorContext::new("resolve_question_scope", "quiz");
        return Err(error.to_response_with_context(context));
    };

    state
        .question_service
        .ensure_quiz(chapter_id, params.is_practice.unwrap_or(true))
        .await
        .map_err(|e| {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("resolve_question_scope", "quiz")
                .with_id(&chapter_id.to_string());
            classified.to_response_with_context(context)
        })
}

pub async fn publish_quiz_drafts(
    State(state): State<AppState>,
    Query(params): Query<QuestionScopeParams>,
) -> Result<Json<ApiResponse<BulkPublishOutcome>>, HandlerError> {
    let quiz_id = resolve_question_scope(&state, &params).await?;
    log_api_start!("publish_quiz_drafts", quiz_id = quiz_id);

    match state.question_service.publish_all_drafts(quiz_id).await {
        Ok(outcome) => {
            log_api_success!(
                "publish_quiz_drafts",
                count = outcome.promoted,
                "question drafts promoted"
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("publish_quiz_drafts", "question");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn discard_quiz_drafts(
    State(state): State<AppState>,
    Query(params): Query<QuestionScopeParams>,
) -> Result<Json<ApiResponse<BulkDiscardOutcome>>, HandlerError> {
    let quiz_id = resolve_question_scope(&state, &params).await?;
    log_api_start!("discard_quiz_drafts", quiz_id = quiz_id);

    match state.question_service.discard_all_drafts(quiz_id).await {
        Ok(outcome) => {
            log_api_success!(
                "discard_quiz_drafts",
                count = outcome.discarded,
                "question drafts discarded"
            );
            Ok(Json(ApiResponse::success(outcome)))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("discard_quiz_drafts", "question");
            Err(error.to_response_with_context(context))
        }
    }
}

pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<bool>>, HandlerError> {
    info!(question_id = %id, "Deleting question");

    match state.question_service.delete_question(id).await {
        Ok(Some(())) => {
            log_api_success!("delete_question", question_id = id, "question and choices deleted");
            Ok(Json(ApiResponse::success(true)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Question with ID '{}' not found", id));
            let context = ErrorContext::new("delete_question", "question").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("delete_question", "question").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

// Submission endpoints
pub async fn create_submission(
    State(state): State<AppState>,
    Json(request): Json<CreateSubmissionRequest>,
) -> Result<Json<ApiResponse<Submission>>, HandlerError> {
    info!(
        quiz_id = %request.quiz_id,
        answer_count = request.answers.len(),
        "Creating submission"
    );

    match state.grading_service.submit(request).await {
        Ok(submission) => {
            log_api_success!(
                "create_submission",
                submission_id = submission.id,
                "submission recorded"
            );
            Ok(Json(ApiResponse::success(submission)))
        }
        Err(e) => {
            let classified = classify_database_error(&e);
            let context = ErrorContext::new("create_submission", "submission");
            Err(classified.to_response_with_context(context))
        }
    }
}

pub async fn grade_submission(
    State(state): State<AppState>,
    Json(request): Json<GradeRequest>,
) -> Result<Json<ApiResponse<GradeReport>>, HandlerError> {
    log_api_start!("grade_submission", submission_id = request.submission_id);

    match state
        .grading_service
        .grade(request.submission_id, request.grader_id)
        .await
    {
        Ok(Some(report)) => {
            log_api_success!(
                "grade_submission",
                submission_id = request.submission_id,
                "submission graded"
            );
            Ok(Json(ApiResponse::success(report)))
        }
        Ok(None) => {
            warn!(submission_id = %request.submission_id, "Submission not found for grading");
            let error = ApiError::NotFound(format!(
                "Submission with ID '{}' not found",
                request.submission_id
            ));
            let context = ErrorContext::new("grade_submission", "submission")
                .with_id(&request.submission_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let error = ApiError::DatabaseError(e);
            let context = ErrorContext::new("grade_submission", "submission")
                .with_id(&request.submission_id.to_string());
            Err(error.to_response_with_context(context))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Course routes
        .route("/api/courses", get(get_courses))
        .route("/api/courses/:id", get(get_course))
        .route("/api/admin/courses", post(create_course))
        // Chapter authoring routes
        .route("/api/admin/chapters", get(list_admin_chapters))
        .route("/api/admin/chapters", post(create_chapter))
        .route("/api/admin/chapters/publish", patch(publish_course_drafts))
        .route("/api/admin/chapters/drafts", delete(discard_course_drafts))
        .route("/api/admin/chapters/:id", get(get_admin_chapter))
        .route("/api/admin/chapters/:id", put(update_chapter))
        .route("/api/admin/chapters/:id", delete(delete_chapter))
        .route("/api/admin/chapters/:id/publish", patch(publish_chapter))
        // Question authoring routes
        .route("/api/admin/questions", get(list_admin_questions))
        .route("/api/admin/questions", post(create_question))
        .route("/api/admin/questions/publish", patch(publish_quiz_drafts))
        .route("/api/admin/questions/drafts", delete(discard_quiz_drafts))
        .route("/api/admin/questions/:id", put(update_question))
        .route("/api/admin/questions/:id", delete(delete_question))
        .route("/api/admin/questions/:id/publish", patch(publish_question))
        // Student-facing routes
        .route("/api/chapters", get(list_chapters))
        .route("/api/chapters/:chapter_id/quizzes", get(get_chapter_quizzes))
        // Submission routes
        .route("/api/submissions", post(create_submission))
        .route("/api/grade", post(grade_submission))
        .with_state(state)
}

#[cfg(test)]
pub fn create_app(state: AppState) -> Router {
    create_router(state)
}
