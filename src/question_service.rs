use anyhow::{anyhow, Result};
use futures_util::future::join_all;
use tracing::warn;
use uuid::Uuid;

use crate::cascade::DeletePlan;
use crate::database::Database;
use crate::draft::collapse;
use crate::models::*;

const PRACTICE_QUIZ_TITLE: &str = "Practice Quiz";
const GRADED_QUIZ_TITLE: &str = "Chapter Quiz";

#[derive(Clone)]
pub struct QuestionService {
    db: Database,
}

impl QuestionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up the chapter's quiz of the requested kind, creating it with
    /// deterministic defaults when absent. Keeps at most one practice and
    /// one graded quiz per chapter.
    ///
    /// Read-then-create: two concurrent first calls for the same
    /// chapter/kind can both see "none exists" and both insert. Closing
    /// that window needs a unique (chapter_id, is_practice) index or an
    /// upsert; callers today are low-concurrency authoring requests.
    pub async fn ensure_quiz(&self, chapter_id: Uuid, is_practice: bool) -> Result<Uuid> {
        if let Some(existing) = self.db.find_quiz(chapter_id, is_practice).await? {
            return Ok(existing.id);
        }

        let (title, description) = if is_practice {
            (PRACTICE_QUIZ_TITLE, "Auto-created practice quiz")
        } else {
            (GRADED_QUIZ_TITLE, "Auto-created chapter quiz")
        };

        let quiz = Quiz {
            id: Uuid::new_v4(),
            chapter_id,
            title: title.to_string(),
            description: Some(description.to_string()),
            is_practice,
        };
        self.db.insert_quiz(&quiz).await?;

        Ok(quiz.id)
    }

    /// Authoring view: the chapter's quiz of the requested kind, collapsed
    /// so pending drafts stand in for their originals.
    pub async fn list_questions(
        &self,
        chapter_id: Uuid,
        is_practice: bool,
    ) -> Result<Vec<QuestionWithChoices>> {
        let quiz_id = self.ensure_quiz(chapter_id, is_practice).await?;
        self.questions_for_quiz(quiz_id, false).await
    }

    /// Quizzes for a chapter with their questions attached. The student
    /// read path passes `published_only = true` and never sees draft-only
    /// or unpublished rows.
    pub async fn get_quizzes_with_questions(
        &self,
        chapter_id: Uuid,
        practice: Option<bool>,
        published_only: bool,
    ) -> Result<Vec<QuizWithQuestions>> {
        let quizzes = self.db.get_quizzes_for_chapter(chapter_id, practice).await?;

        let mut result = Vec::with_capacity(quizzes.len());
        for quiz in quizzes {
            let questions = self.questions_for_quiz(quiz.id, published_only).await?;
            result.push(QuizWithQuestions { quiz, questions });
        }

        Ok(result)
    }

    async fn questions_for_quiz(
        &self,
        quiz_id: Uuid,
        published_only: bool,
    ) -> Result<Vec<QuestionWithChoices>> {
        let questions = self.db.get_questions_for_quiz(quiz_id).await?;

        let mut rows = Vec::with_capacity(questions.len());
        for question in questions {
            rows.push(self.with_choices(question).await?);
        }

        let mut collapsed = collapse(rows);
        if published_only {
            collapsed.retain(|q| q.question.published);
        }

        Ok(collapsed)
    }

    pub async fn get_question(&self, id: Uuid) -> Result<Option<QuestionWithChoices>> {
        match self.db.get_question(id).await? {
            Some(question) => self.with_choices(question).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn create_question(
        &self,
        request: CreateQuestionRequest,
    ) -> Result<QuestionWithChoices> {
        if request.text.trim().is_empty() {
            return Err(anyhow!("text is required"));
        }
        ensure_correct_choice(&request.choices)?;

        let quiz_id = self
            .ensure_quiz(request.chapter_id, request.is_practice.unwrap_or(true))
            .await?;
        let position = self.db.next_question_position(quiz_id).await?;

        let question = Question {
            id: Uuid::new_v4(),
            quiz_id,
            position,
            text: request.text,
            question_type: request
                .question_type
                .unwrap_or_else(|| "multiple_choice".to_string()),
            points: request.points.unwrap_or(1),
            image: request.image,
            published: false,
            draft_of: None, // POST only ever creates originals
        };

        self.db.insert_question(&question).await?;
        self.db.insert_choices(question.id, &request.choices).await?;

        self.with_choices(question).await
    }

    /// Update a question in place, or (with `draft: true` on an original)
    /// stage the edit as a copy-on-write shadow draft. Provided choices
    /// replace the row's choice set wholesale.
    pub async fn update_question(
        &self,
        id: Uuid,
        request: UpdateQuestionRequest,
    ) -> Result<Option<QuestionWithChoices>> {
        if let Some(text) = &request.text {
            if text.trim().is_empty() {
                return Err(anyhow!("text is required"));
            }
        }
        if let Some(choices) = &request.choices {
            ensure_correct_choice(choices)?;
        }

        let Some(target) = self.db.get_question(id).await? else {
            return Ok(None);
        };

        if request.draft && target.draft_of.is_none() {
            return self.stage_question_draft(&target, request).await.map(Some);
        }

        let updated = Question {
            id: target.id,
            quiz_id: target.quiz_id,
            position: target.position,
            text: request.text.unwrap_or(target.text),
            question_type: request.question_type.unwrap_or(target.question_type),
            points: request.points.unwrap_or(target.points),
            image: request.image.or(target.image),
            published: target.published,
            draft_of: target.draft_of,
        };

        self.db.update_question(&updated).await?;
        if let Some(choices) = &request.choices {
            self.db.replace_choices(updated.id, choices).await?;
        }

        self.with_choices(updated).await.map(Some)
    }

    async fn stage_question_draft(
        &self,
        original: &Question,
        request: UpdateQuestionRequest,
    ) -> Result<QuestionWithChoices> {
        let existing = self.db.get_draft_for_question(original.id).await?;

        // Partial edits accumulate onto the existing draft when one is
        // already pending; a fresh draft starts from the original.
        let base = existing.clone().unwrap_or_else(|| original.clone());

        let draft = Question {
            id: existing.as_ref().map(|d| d.id).unwrap_or_else(Uuid::new_v4),
            quiz_id: original.quiz_id,
            position: base.position,
            text: request.text.unwrap_or(base.text),
            question_type: request.question_type.unwrap_or(base.question_type),
            points: request.points.unwrap_or(base.points),
            image: request.image.or(base.image),
            published: false,
            draft_of: Some(original.id),
        };

        if existing.is_some() {
            self.db.update_question(&draft).await?;
        } else {
            self.db.insert_question(&draft).await?;
        }

        match &request.choices {
            Some(choices) => self.db.replace_choices(draft.id, choices).await?,
            None if existing.is_none() => {
                // New draft with no choice edits inherits the original's
                // current choices so promotion stays a full replacement.
                let inherited: Vec<ChoiceInput> = self
                    .db
                    .get_choices_for_question(original.id)
                    .await?
                    .into_iter()
                    .map(choice_to_input)
                    .collect();
                self.db.insert_choices(draft.id, &inherited).await?;
            }
            None => {}
        }

        self.with_choices(draft).await
    }

    /// Publish coordinator. Publishing a draft promotes it (fields and
    /// choices) into its original; everything else is a direct toggle.
    pub async fn publish_question(
        &self,
        id: Uuid,
        published: bool,
    ) -> Result<Option<QuestionWithChoices>> {
        let Some(target) = self.db.get_question(id).await? else {
            return Ok(None);
        };

        if published {
            if let Some(original_id) = target.draft_of {
                self.promote_draft(&target).await?;
                return match self.db.get_question(original_id).await? {
                    Some(original) => self.with_choices(original).await.map(Some),
                    None => Ok(None),
                };
            }
        }

        let affected = self.db.set_question_published(id, published).await?;
        if affected == 0 {
            return Ok(None);
        }

        match self.db.get_question(id).await? {
            Some(question) => self.with_choices(question).await.map(Some),
            None => Ok(None),
        }
    }

    /// Promotion runs in a fixed order: original fields first, then the
    /// full choice replacement, and the draft row only once both have
    /// succeeded. A failure anywhere leaves the draft (and its choices)
    /// in place for retry.
    async fn promote_draft(&self, draft: &Question) -> Result<()> {
        let original_id = draft
            .draft_of
            .ok_or_else(|| anyhow!("question '{}' is not a draft", draft.id))?;

        let mut original = self
            .db
            .get_question(original_id)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "original question '{}' not found for draft '{}'",
                    original_id,
                    draft.id
                )
            })?;

        let draft_choices: Vec<ChoiceInput> = self
            .db
            .get_choices_for_question(draft.id)
            .await?
            .into_iter()
            .map(choice_to_input)
            .collect();

        original.text = draft.text.clone();
        original.question_type = draft.question_type.clone();
        original.points = draft.points;
        original.image = draft.image.clone();
        original.position = draft.position;
        original.published = true;

        self.db.update_question(&original).await?;
        self.db.replace_choices(original_id, &draft_choices).await?;

        DeletePlan::for_question(draft.id).execute(&self.db).await?;

        Ok(())
    }

    pub async fn publish_all_drafts(&self, quiz_id: Uuid) -> Result<BulkPublishOutcome> {
        let drafts = self.db.get_question_drafts_for_quiz(quiz_id).await?;
        let results = join_all(drafts.iter().map(|d| self.promote_draft(d))).await;

        let mut outcome = BulkPublishOutcome {
            promoted: 0,
            failed: 0,
        };
        for (draft, result) in drafts.iter().zip(results) {
            match result {
                Ok(()) => outcome.promoted += 1,
                Err(e) => {
                    warn!(
                        question_id = %draft.id,
                        quiz_id = %quiz_id,
                        error = %e,
                        "Failed to promote question draft"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    pub async fn discard_all_drafts(&self, quiz_id: Uuid) -> Result<BulkDiscardOutcome> {
        let drafts = self.db.get_question_drafts_for_quiz(quiz_id).await?;
        let results = join_all(drafts.iter().map(|d| {
            let plan = DeletePlan::for_question(d.id);
            async move { plan.execute(&self.db).await }
        }))
        .await;

        let mut outcome = BulkDiscardOutcome {
            discarded: 0,
            failed: 0,
        };
        for (draft, result) in drafts.iter().zip(results) {
            match result {
                Ok(_) => outcome.discarded += 1,
                Err(e) => {
                    warn!(
                        question_id = %draft.id,
                        quiz_id = %quiz_id,
                        error = %e,
                        "Failed to discard question draft"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Cascade delete: choices first, then the question row.
    pub async fn delete_question(&self, id: Uuid) -> Result<Option<()>> {
        if self.db.get_question(id).await?.is_none() {
            return Ok(None);
        }

        DeletePlan::for_question(id).execute(&self.db).await?;
        Ok(Some(()))
    }

    async fn with_choices(&self, question: Question) -> Result<QuestionWithChoices> {
        let choices = self.db.get_choices_for_question(question.id).await?;
        Ok(QuestionWithChoices { question, choices })
    }
}

/// The one authoring invariant enforced before any store write: a saved
/// choice set must mark at least one choice correct, or grading could
/// never score the question.
fn ensure_correct_choice(choices: &[ChoiceInput]) -> Result<()> {
    if !choices.iter().any(|c| c.is_correct) {
        return Err(anyhow!("at least one choice must be marked correct"));
    }

    Ok(())
}

fn choice_to_input(choice: Choice) -> ChoiceInput {
    ChoiceInput {
        text: choice.text,
        is_correct: choice.is_correct,
        image: choice.image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_correct_choice() {
        let no_correct = vec![
            ChoiceInput {
                text: "sp2".to_string(),
                is_correct: false,
                image: None,
            },
            ChoiceInput {
                text: "sp3".to_string(),
                is_correct: false,
                image: None,
            },
        ];
        assert!(ensure_correct_choice(&no_correct).is_err());

        let with_correct = vec![
            ChoiceInput {
                text: "sp2".to_string(),
                is_correct: true,
                image: None,
            },
            ChoiceInput {
                text: "sp3".to_string(),
                is_correct: false,
                image: None,
            },
        ];
        assert!(ensure_correct_choice(&with_correct).is_ok());

        // empty set has no correct choice either
        assert!(ensure_correct_choice(&[]).is_err());
    }
}
