use anyhow::{anyhow, Result};
use futures_util::future::join_all;
use tracing::warn;
use uuid::Uuid;

use crate::cascade::DeletePlan;
use crate::database::Database;
use crate::draft::collapse;
use crate::models::*;

#[derive(Clone)]
pub struct ChapterService {
    db: Database,
}

impl ChapterService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // Course operations (no draft workflow; chapters nest under courses
    // on the student read path)
    pub async fn create_course(&self, request: CreateCourseRequest) -> Result<Course> {
        if request.title.trim().is_empty() {
            return Err(anyhow!("title is required"));
        }

        self.db.create_course(request).await
    }

    pub async fn get_all_courses(&self) -> Result<Vec<Course>> {
        self.db.get_all_courses().await
    }

    pub async fn get_course_with_chapters(&self, id: Uuid) -> Result<Option<CourseWithChapters>> {
        let Some(course) = self.db.get_course(id).await? else {
            return Ok(None);
        };

        let chapters = self.list_chapters(id, true).await?;
        Ok(Some(CourseWithChapters { course, chapters }))
    }

    /// Chapters for a course, collapsed to one row per logical chapter.
    /// `published_only` is the student read path; authoring passes false
    /// and sees pending drafts in place of their originals.
    pub async fn list_chapters(
        &self,
        course_id: Uuid,
        published_only: bool,
    ) -> Result<Vec<Chapter>> {
        let rows = self.db.get_chapters_for_course(course_id).await?;
        let mut collapsed = collapse(rows);

        if published_only {
            collapsed.retain(|c| c.published);
        }

        Ok(collapsed)
    }

    pub async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>> {
        self.db.get_chapter(id).await
    }

    pub async fn create_chapter(&self, request: CreateChapterRequest) -> Result<Chapter> {
        if request.title.trim().is_empty() {
            return Err(anyhow!("title is required"));
        }

        let chapter = Chapter {
            id: Uuid::new_v4(),
            course_id: request.course_id,
            position: request.position.unwrap_or(1),
            title: request.title,
            description: request.description,
            video_url: request.video_url,
            published: false, // authored as a draft until explicitly published
            draft_of: request.draft_of,
        };

        self.db.insert_chapter(&chapter).await?;
        Ok(chapter)
    }

    /// Update a chapter. With `draft: false` the row is edited in place.
    /// With `draft: true` the edit is staged copy-on-write: an existing
    /// shadow draft is reused, otherwise one is created, and the original
    /// row is left untouched until promotion.
    pub async fn update_chapter(
        &self,
        id: Uuid,
        request: UpdateChapterRequest,
    ) -> Result<Option<Chapter>> {
        if request.title.trim().is_empty() {
            return Err(anyhow!("title is required"));
        }

        let Some(target) = self.db.get_chapter(id).await? else {
            return Ok(None);
        };

        // A draft row is already the staging copy; editing it with the
        // draft flag set must not spawn a draft-of-a-draft.
        if request.draft && target.draft_of.is_none() {
            return self.stage_chapter_draft(&target, request).await.map(Some);
        }

        let updated = Chapter {
            id: target.id,
            course_id: target.course_id,
            position: request.position.unwrap_or(target.position),
            title: request.title,
            description: request.description,
            video_url: request.video_url,
            published: target.published,
            draft_of: target.draft_of,
        };

        self.db.update_chapter(&updated).await?;
        Ok(Some(updated))
    }

    async fn stage_chapter_draft(
        &self,
        original: &Chapter,
        request: UpdateChapterRequest,
    ) -> Result<Chapter> {
        let existing = self.db.get_draft_for_chapter(original.id).await?;

        let draft = Chapter {
            id: existing.as_ref().map(|d| d.id).unwrap_or_else(Uuid::new_v4),
            course_id: original.course_id,
            position: request.position.unwrap_or(original.position),
            title: request.title,
            description: request.description,
            video_url: request.video_url,
            published: false, // draft rows are always unpublished staging records
            draft_of: Some(original.id),
        };

        if existing.is_some() {
            self.db.update_chapter(&draft).await?;
        } else {
            self.db.insert_chapter(&draft).await?;
        }

        Ok(draft)
    }

    /// Publish coordinator. Publishing a draft promotes it into its
    /// original and removes the draft row; any other case is a direct
    /// toggle of the publish flag.
    pub async fn publish_chapter(&self, id: Uuid, published: bool) -> Result<Option<Chapter>> {
        let Some(target) = self.db.get_chapter(id).await? else {
            return Ok(None);
        };

        if published {
            if let Some(original_id) = target.draft_of {
                self.promote_draft(&target).await?;
                return self.db.get_chapter(original_id).await;
            }
        }

        let affected = self.db.set_chapter_published(id, published).await?;
        if affected == 0 {
            return Ok(None);
        }

        self.db.get_chapter(id).await
    }

    /// Copy the draft's fields onto its original, mark the original
    /// published, then delete the draft. The original is updated before
    /// the draft is touched: if the update fails, the pending edits are
    /// still sitting in the draft row.
    async fn promote_draft(&self, draft: &Chapter) -> Result<()> {
        let original_id = draft
            .draft_of
            .ok_or_else(|| anyhow!("chapter '{}' is not a draft", draft.id))?;

        let mut original = self
            .db
            .get_chapter(original_id)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "original chapter '{}' not found for draft '{}'",
                    original_id,
                    draft.id
                )
            })?;

        original.title = draft.title.clone();
        original.description = draft.description.clone();
        original.video_url = draft.video_url.clone();
        original.position = draft.position;
        original.published = true;

        self.db.update_chapter(&original).await?;
        self.db.delete_chapter_row(draft.id).await?;

        Ok(())
    }

    /// Promote every pending chapter draft under a course. Items are
    /// independent: each failure is counted and logged, the rest of the
    /// batch proceeds.
    pub async fn publish_all_drafts(&self, course_id: Uuid) -> Result<BulkPublishOutcome> {
        let drafts = self.db.get_chapter_drafts_for_course(course_id).await?;
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
                        chapter_id = %draft.id,
                        course_id = %course_id,
                        error = %e,
                        "Failed to promote chapter draft"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Delete every pending chapter draft under a course without promoting.
    pub async fn discard_all_drafts(&self, course_id: Uuid) -> Result<BulkDiscardOutcome> {
        let drafts = self.db.get_chapter_drafts_for_course(course_id).await?;
        let results = join_all(drafts.iter().map(|d| self.db.delete_chapter_row(d.id))).await;

        let mut outcome = BulkDiscardOutcome {
            discarded: 0,
            failed: 0,
        };
        for (draft, result) in drafts.iter().zip(results) {
            match result {
                Ok(_) => outcome.discarded += 1,
                Err(e) => {
                    warn!(
                        chapter_id = %draft.id,
                        course_id = %course_id,
                        error = %e,
                        "Failed to discard chapter draft"
                    );
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Cascade delete: quizzes under the chapter, questions under those
    /// quizzes, and their choices all go before the chapter row itself.
    pub async fn delete_chapter(&self, id: Uuid) -> Result<Option<()>> {
        if self.db.get_chapter(id).await?.is_none() {
            return Ok(None);
        }

        let quizzes = match self.db.get_quizzes_for_chapter(id, None).await {
            Ok(quizzes) => quizzes,
            Err(e) => {
                warn!(chapter_id = %id, error = %e, "Failed to fetch related quizzes");
                Vec::new()
            }
        };
        let quiz_ids: Vec<Uuid> = quizzes.iter().map(|q| q.id).collect();

        let question_ids = match self.db.get_question_ids_for_quizzes(&quiz_ids).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(chapter_id = %id, error = %e, "Failed to fetch related question ids");
                Vec::new()
            }
        };

        DeletePlan::for_chapter(id, quiz_ids, question_ids)
            .execute(&self.db)
            .await?;

        Ok(Some(()))
    }
}
