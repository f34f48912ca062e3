use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub course_id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub published: bool,
    pub draft_of: Option<Uuid>, // None = original, Some(id) = pending draft of that original
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_practice: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub position: i32,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String, // "multiple_choice", "short_answer"
    pub points: i32,
    pub image: Option<String>, // opaque storage URL, copied verbatim
    pub published: bool,
    pub draft_of: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: Question,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizWithQuestions {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithChoices>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseWithChapters {
    #[serde(flatten)]
    pub course: Course,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub graded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub question_id: Uuid,
    pub choice_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub grader_id: Option<Uuid>,
    pub points: f64, // percentage score
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChapterRequest {
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub position: Option<i32>,
    pub draft_of: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateChapterRequest {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub position: Option<i32>,
    #[serde(default)]
    pub draft: bool, // true = write to a shadow draft row instead of the original
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionRequest {
    pub chapter_id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub points: Option<i32>,
    pub image: Option<String>,
    pub choices: Vec<ChoiceInput>,
    pub is_practice: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuestionRequest {
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub points: Option<i32>,
    pub image: Option<String>,
    pub choices: Option<Vec<ChoiceInput>>,
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

/// Aggregate result of a bulk draft promotion. Failures are counted, never
/// raised, so one bad draft cannot abort the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkPublishOutcome {
    pub promoted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDiscardOutcome {
    pub discarded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub choice_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubmissionRequest {
    pub quiz_id: Uuid,
    pub student_id: Option<Uuid>,
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub submission_id: Uuid,
    pub grader_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    pub grade: Grade,
    pub score: f64,
}
