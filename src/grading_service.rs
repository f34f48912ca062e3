use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::database::Database;
use crate::models::*;

#[derive(Clone)]
pub struct GradingService {
    db: Database,
}

impl GradingService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a quiz attempt: the submission row, then one answer row per
    /// submitted question. Grading happens in a separate call.
    pub async fn submit(&self, request: CreateSubmissionRequest) -> Result<Submission> {
        let submission = self
            .db
            .create_submission(request.quiz_id, request.student_id)
            .await?;

        for answer in &request.answers {
            self.db.insert_answer(submission.id, answer).await?;
        }

        info!(
            submission_id = %submission.id,
            quiz_id = %request.quiz_id,
            answer_count = request.answers.len(),
            "Submission recorded"
        );

        Ok(submission)
    }

    pub async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        self.db.get_submission(id).await
    }

    /// Auto-grade a submission by checking each answer's chosen choice
    /// against is_correct. Every answered question counts one point; the
    /// score is the correct percentage. Stores the grade row and stamps
    /// the submission.
    pub async fn grade(
        &self,
        submission_id: Uuid,
        grader_id: Option<Uuid>,
    ) -> Result<Option<GradeReport>> {
        if self.db.get_submission(submission_id).await?.is_none() {
            return Ok(None);
        }

        let correctness = self.db.get_answer_correctness(submission_id).await?;
        let total = correctness.len();
        let earned = correctness.iter().filter(|c| **c == Some(true)).count();

        let score = if total == 0 {
            0.0
        } else {
            (earned as f64 / total as f64) * 100.0
        };

        let grade = self
            .db
            .insert_grade(
                submission_id,
                grader_id,
                score,
                Some(format!("Auto-graded: {earned}/{total}")),
            )
            .await?;
        self.db.mark_submission_graded(submission_id, score).await?;

        info!(
            submission_id = %submission_id,
            earned,
            total,
            score,
            "Submission graded"
        );

        Ok(Some(GradeReport { grade, score }))
    }
}
