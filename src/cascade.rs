use anyhow::Result;
use tracing::warn;
use uuid::Uuid;

use crate::database::Database;

/// One step of a deletion plan: DELETE FROM `table` WHERE `column` IN `ids`.
#[derive(Debug, Clone)]
pub struct DeleteStep {
    pub table: &'static str,
    pub column: &'static str,
    pub ids: Vec<Uuid>,
}

impl DeleteStep {
    pub fn new(table: &'static str, column: &'static str, ids: Vec<Uuid>) -> Self {
        Self { table, column, ids }
    }
}

/// A dependency-ordered deletion plan. The backing store does not enforce
/// cascading foreign keys for these relations, so child rows must go before
/// their parents; holding the order in one data structure keeps the
/// invariant visible and testable instead of re-sequenced per call site.
///
/// Non-final steps are best-effort: a failure is logged and the plan keeps
/// going. Only the final step's failure is surfaced to the caller.
#[derive(Debug)]
pub struct DeletePlan {
    steps: Vec<DeleteStep>,
    final_step: DeleteStep,
}

impl DeletePlan {
    pub fn new(steps: Vec<DeleteStep>, final_step: DeleteStep) -> Self {
        Self { steps, final_step }
    }

    /// chapter → quizzes → questions → choices, deleted leaf-first.
    pub fn for_chapter(chapter_id: Uuid, quiz_ids: Vec<Uuid>, question_ids: Vec<Uuid>) -> Self {
        Self::new(
            vec![
                DeleteStep::new("choices", "question_id", question_ids.clone()),
                DeleteStep::new("questions", "id", question_ids),
                DeleteStep::new("quizzes", "chapter_id", vec![chapter_id]),
            ],
            DeleteStep::new("chapters", "id", vec![chapter_id]),
        )
    }

    /// question → choices.
    pub fn for_question(question_id: Uuid) -> Self {
        Self::new(
            vec![DeleteStep::new("choices", "question_id", vec![question_id])],
            DeleteStep::new("questions", "id", vec![question_id]),
        )
    }

    pub fn steps(&self) -> &[DeleteStep] {
        &self.steps
    }

    pub fn final_step(&self) -> &DeleteStep {
        &self.final_step
    }

    /// Run the plan. Returns the rows removed by the final step.
    pub async fn execute(&self, db: &Database) -> Result<u64> {
        for step in &self.steps {
            if let Err(e) = db.delete_by_column(step.table, step.column, &step.ids).await {
                warn!(
                    table = step.table,
                    column = step.column,
                    id_count = step.ids.len(),
                    error = %e,
                    "Cascade delete step failed, continuing with remaining steps"
                );
            }
        }

        db.delete_by_column(
            self.final_step.table,
            self.final_step.column,
            &self.final_step.ids,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_plan_orders_children_first() {
        let chapter_id = Uuid::new_v4();
        let quiz_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let question_ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

        let plan = DeletePlan::for_chapter(chapter_id, quiz_ids, question_ids.clone());
        let tables: Vec<&str> = plan.steps().iter().map(|s| s.table).collect();

        assert_eq!(tables, vec!["choices", "questions", "quizzes"]);
        assert_eq!(plan.final_step().table, "chapters");
        assert_eq!(plan.steps()[0].ids, question_ids);
        assert_eq!(plan.final_step().ids, vec![chapter_id]);
    }

    #[test]
    fn test_question_plan_deletes_choices_first() {
        let question_id = Uuid::new_v4();
        let plan = DeletePlan::for_question(question_id);

        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.steps()[0].table, "choices");
        assert_eq!(plan.steps()[0].column, "question_id");
        assert_eq!(plan.final_step().table, "questions");
    }

    #[tokio::test]
    async fn test_execute_removes_rows_in_order() {
        use crate::models::{ChoiceInput, Question};

        let db = Database::new("sqlite::memory:").await.unwrap();

        let question = Question {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            position: 1,
            text: "Which is the conjugate base of H2O?".to_string(),
            question_type: "multiple_choice".to_string(),
            points: 1,
            image: None,
            published: true,
            draft_of: None,
        };
        db.insert_question(&question).await.unwrap();
        db.insert_choices(
            question.id,
            &[
                ChoiceInput {
                    text: "OH-".to_string(),
                    is_correct: true,
                    image: None,
                },
                ChoiceInput {
                    text: "H3O+".to_string(),
                    is_correct: false,
                    image: None,
                },
            ],
        )
        .await
        .unwrap();

        let removed = DeletePlan::for_question(question.id)
            .execute(&db)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(db.get_question(question.id).await.unwrap().is_none());
        assert!(db
            .get_choices_for_question(question.id)
            .await
            .unwrap()
            .is_empty());
    }
}
