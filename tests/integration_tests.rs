use ochem_academy::{
    AnswerInput, ChapterService, ChoiceInput, CreateChapterRequest, CreateCourseRequest,
    CreateQuestionRequest, CreateSubmissionRequest, Database, GradingService, QuestionService,
    UpdateChapterRequest, UpdateQuestionRequest,
};
use uuid::Uuid;

async fn setup() -> (Database, ChapterService, QuestionService, GradingService) {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let chapters = ChapterService::new(db.clone());
    let questions = QuestionService::new(db.clone());
    let grading = GradingService::new(db.clone());
    (db, chapters, questions, grading)
}

async fn create_course(db: &Database, title: &str) -> Uuid {
    db.create_course(CreateCourseRequest {
        title: title.to_string(),
        description: None,
        image_url: None,
    })
    .await
    .unwrap()
    .id
}

fn chapter_request(course_id: Uuid, title: &str, position: i32) -> CreateChapterRequest {
    CreateChapterRequest {
        course_id,
        title: title.to_string(),
        description: None,
        video_url: None,
        position: Some(position),
        draft_of: None,
    }
}

fn draft_edit(title: &str) -> UpdateChapterRequest {
    UpdateChapterRequest {
        title: title.to_string(),
        description: None,
        video_url: None,
        position: None,
        draft: true,
    }
}

fn choices(correct: &str, wrong: &str) -> Vec<ChoiceInput> {
    vec![
        ChoiceInput {
            text: correct.to_string(),
            is_correct: true,
            image: None,
        },
        ChoiceInput {
            text: wrong.to_string(),
            is_correct: false,
            image: None,
        },
    ]
}

fn question_request(chapter_id: Uuid, text: &str) -> CreateQuestionRequest {
    CreateQuestionRequest {
        chapter_id,
        text: text.to_string(),
        question_type: None,
        points: None,
        image: None,
        choices: choices("OH-", "H3O+"),
        is_practice: Some(true),
    }
}

#[tokio::test]
async fn test_chapter_draft_lifecycle() {
    let (db, chapters, _, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;

    // Published original with title "Intro"
    let original = chapters
        .create_chapter(chapter_request(course_id, "Intro", 1))
        .await
        .unwrap();
    chapters.publish_chapter(original.id, true).await.unwrap();

    // Editing with the draft flag stages a shadow row instead of touching
    // the live chapter
    let draft = chapters
        .update_chapter(original.id, draft_edit("Intro v2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(draft.draft_of, Some(original.id));
    assert!(!draft.published);

    let live = db.get_chapter(original.id).await.unwrap().unwrap();
    assert_eq!(live.title, "Intro");
    assert!(live.published);

    // The authoring list shows exactly the draft in place of the original
    let listed = chapters.list_chapters(course_id, false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, draft.id);
    assert_eq!(listed[0].title, "Intro v2");

    // Promotion copies the draft onto the original and removes the draft
    let promoted = chapters
        .publish_chapter(draft.id, true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.id, original.id);
    assert_eq!(promoted.title, "Intro v2");
    assert!(promoted.published);
    assert!(db.get_chapter(draft.id).await.unwrap().is_none());

    let listed = chapters.list_chapters(course_id, false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, original.id);
    assert_eq!(listed[0].title, "Intro v2");
}

#[tokio::test]
async fn test_ensure_quiz_is_idempotent_per_kind() {
    let (db, chapters, questions, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;
    let chapter = chapters
        .create_chapter(chapter_request(course_id, "Acids and Bases", 1))
        .await
        .unwrap();

    let practice_first = questions.ensure_quiz(chapter.id, true).await.unwrap();
    let practice_second = questions.ensure_quiz(chapter.id, true).await.unwrap();
    assert_eq!(practice_first, practice_second);

    let graded = questions.ensure_quiz(chapter.id, false).await.unwrap();
    assert_ne!(graded, practice_first);

    let quizzes = db.get_quizzes_for_chapter(chapter.id, None).await.unwrap();
    assert_eq!(quizzes.len(), 2);
}

#[tokio::test]
async fn test_cascade_delete_chapter_removes_descendants() {
    let (db, chapters, questions, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 2").await;
    let chapter = chapters
        .create_chapter(chapter_request(course_id, "Substitution Reactions", 1))
        .await
        .unwrap();

    // Two quizzes (practice and graded), two questions each, two choices each
    for is_practice in [true, false] {
        for i in 0..2 {
            let mut request = question_request(chapter.id, &format!("Question {i}"));
            request.is_practice = Some(is_practice);
            questions.create_question(request).await.unwrap();
        }
    }

    let quizzes = db.get_quizzes_for_chapter(chapter.id, None).await.unwrap();
    assert_eq!(quizzes.len(), 2);
    let quiz_ids: Vec<Uuid> = quizzes.iter().map(|q| q.id).collect();
    let question_ids = db.get_question_ids_for_quizzes(&quiz_ids).await.unwrap();
    assert_eq!(question_ids.len(), 4);

    let deleted = chapters.delete_chapter(chapter.id).await.unwrap();
    assert!(deleted.is_some());

    // No orphans reachable through normal queries
    assert!(db.get_chapter(chapter.id).await.unwrap().is_none());
    assert!(db
        .get_quizzes_for_chapter(chapter.id, None)
        .await
        .unwrap()
        .is_empty());
    assert!(db
        .get_question_ids_for_quizzes(&quiz_ids)
        .await
        .unwrap()
        .is_empty());
    for question_id in question_ids {
        assert!(db
            .get_choices_for_question(question_id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_delete_question_removes_choices_first() {
    let (db, chapters, questions, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;
    let chapter = chapters
        .create_chapter(chapter_request(course_id, "Resonance", 1))
        .await
        .unwrap();

    let question = questions
        .create_question(question_request(chapter.id, "Strongest acid?"))
        .await
        .unwrap();
    let question_id = question.question.id;

    assert!(questions.delete_question(question_id).await.unwrap().is_some());
    assert!(db.get_question(question_id).await.unwrap().is_none());
    assert!(db
        .get_choices_for_question(question_id)
        .await
        .unwrap()
        .is_empty());

    // Deleting again reports not found
    assert!(questions.delete_question(question_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bulk_publish_counts_orphans_as_failed() {
    let (db, chapters, _, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;

    // Three originals with pending drafts
    let mut originals = Vec::new();
    for i in 0..3 {
        let chapter = chapters
            .create_chapter(chapter_request(course_id, &format!("Chapter {i}"), i + 1))
            .await
            .unwrap();
        chapters.publish_chapter(chapter.id, true).await.unwrap();
        chapters
            .update_chapter(chapter.id, draft_edit(&format!("Chapter {i} v2")))
            .await
            .unwrap();
        originals.push(chapter);
    }

    // One draft whose original is deleted out-of-band
    let doomed = chapters
        .create_chapter(chapter_request(course_id, "Doomed", 4))
        .await
        .unwrap();
    chapters.publish_chapter(doomed.id, true).await.unwrap();
    chapters
        .update_chapter(doomed.id, draft_edit("Doomed v2"))
        .await
        .unwrap();
    db.delete_chapter_row(doomed.id).await.unwrap();

    let outcome = chapters.publish_all_drafts(course_id).await.unwrap();
    assert_eq!(outcome.promoted, 3);
    assert_eq!(outcome.failed, 1);

    for (i, original) in originals.iter().enumerate() {
        let refreshed = db.get_chapter(original.id).await.unwrap().unwrap();
        assert_eq!(refreshed.title, format!("Chapter {i} v2"));
        assert!(refreshed.published);
    }
}

#[tokio::test]
async fn test_bulk_discard_and_empty_scope() {
    let (db, chapters, _, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;

    // Empty scope is a zero count, not an error
    let outcome = chapters.discard_all_drafts(course_id).await.unwrap();
    assert_eq!(outcome.discarded, 0);
    assert_eq!(outcome.failed, 0);

    for i in 0..2 {
        let chapter = chapters
            .create_chapter(chapter_request(course_id, &format!("Chapter {i}"), i + 1))
            .await
            .unwrap();
        chapters.publish_chapter(chapter.id, true).await.unwrap();
        chapters
            .update_chapter(chapter.id, draft_edit("Scrapped edit"))
            .await
            .unwrap();
    }

    let outcome = chapters.discard_all_drafts(course_id).await.unwrap();
    assert_eq!(outcome.discarded, 2);
    assert_eq!(outcome.failed, 0);

    // Discard never touches the originals
    let listed = chapters.list_chapters(course_id, false).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|c| c.draft_of.is_none()));
    assert!(listed.iter().all(|c| c.title.starts_with("Chapter")));
}

#[tokio::test]
async fn test_question_bulk_publish_for_quiz_scope() {
    let (db, chapters, questions, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;
    let chapter = chapters
        .create_chapter(chapter_request(course_id, "Stereochemistry", 1))
        .await
        .unwrap();

    let mut original_ids = Vec::new();
    for i in 0..2 {
        let question = questions
            .create_question(question_request(chapter.id, &format!("Question {i}")))
            .await
            .unwrap();
        let id = question.question.id;
        questions.publish_question(id, true).await.unwrap();
        questions
            .update_question(
                id,
                UpdateQuestionRequest {
                    text: Some(format!("Question {i} (reworded)")),
                    question_type: None,
                    points: None,
                    image: None,
                    choices: None,
                    draft: true,
                },
            )
            .await
            .unwrap();
        original_ids.push(id);
    }

    let quiz_id = questions.ensure_quiz(chapter.id, true).await.unwrap();
    let outcome = questions.publish_all_drafts(quiz_id).await.unwrap();
    assert_eq!(outcome.promoted, 2);
    assert_eq!(outcome.failed, 0);

    for (i, id) in original_ids.iter().enumerate() {
        let refreshed = db.get_question(*id).await.unwrap().unwrap();
        assert_eq!(refreshed.text, format!("Question {i} (reworded)"));
        assert!(refreshed.published);
        // Inherited choices survived the promotion round-trip
        assert_eq!(db.get_choices_for_question(*id).await.unwrap().len(), 2);
    }

    assert!(db
        .get_question_drafts_for_quiz(quiz_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_question_save_requires_a_correct_choice() {
    let (db, chapters, questions, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;
    let chapter = chapters
        .create_chapter(chapter_request(course_id, "Alkenes", 1))
        .await
        .unwrap();

    let mut request = question_request(chapter.id, "Markovnikov addition favors?");
    for choice in &mut request.choices {
        choice.is_correct = false;
    }

    let result = questions.create_question(request).await;
    assert!(result.is_err());

    // Rejected before any store write: not even the lazy quiz was created
    assert!(db.find_quiz(chapter.id, true).await.unwrap().is_none());

    // Same check on update when choices are provided
    let question = questions
        .create_question(question_request(chapter.id, "Markovnikov addition favors?"))
        .await
        .unwrap();
    let result = questions
        .update_question(
            question.question.id,
            UpdateQuestionRequest {
                text: None,
                question_type: None,
                points: None,
                image: None,
                choices: Some(vec![ChoiceInput {
                    text: "the less substituted carbon".to_string(),
                    is_correct: false,
                    image: None,
                }]),
                draft: false,
            },
        )
        .await;
    assert!(result.is_err());

    // An update without choices skips the check entirely
    let updated = questions
        .update_question(
            question.question.id,
            UpdateQuestionRequest {
                text: Some("Markovnikov addition places the proton where?".to_string()),
                question_type: None,
                points: None,
                image: None,
                choices: None,
                draft: false,
            },
        )
        .await
        .unwrap();
    assert!(updated.is_some());
}

#[tokio::test]
async fn test_student_reads_only_see_published_collapsed_rows() {
    let (db, chapters, questions, _) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;

    let visible = chapters
        .create_chapter(chapter_request(course_id, "Published chapter", 1))
        .await
        .unwrap();
    chapters.publish_chapter(visible.id, true).await.unwrap();
    chapters
        .update_chapter(visible.id, draft_edit("Unreviewed edit"))
        .await
        .unwrap();

    chapters
        .create_chapter(chapter_request(course_id, "Unpublished chapter", 2))
        .await
        .unwrap();

    // The pending draft shadows its original out of the collapsed set, and
    // the draft itself is unpublished, so the student sees nothing for
    // that logical chapter until promotion; the never-published chapter is
    // filtered too.
    let student_view = chapters.list_chapters(course_id, true).await.unwrap();
    assert!(student_view.is_empty());

    let draft = db.get_draft_for_chapter(visible.id).await.unwrap().unwrap();
    chapters.publish_chapter(draft.id, true).await.unwrap();

    let student_view = chapters.list_chapters(course_id, true).await.unwrap();
    assert_eq!(student_view.len(), 1);
    assert_eq!(student_view[0].title, "Unreviewed edit");

    // Question side: unpublished questions stay invisible to students
    let question = questions
        .create_question(question_request(visible.id, "pKa of acetic acid?"))
        .await
        .unwrap();
    let quizzes = questions
        .get_quizzes_with_questions(visible.id, Some(true), true)
        .await
        .unwrap();
    assert_eq!(quizzes.len(), 1);
    assert!(quizzes[0].questions.is_empty());

    questions
        .publish_question(question.question.id, true)
        .await
        .unwrap();
    let quizzes = questions
        .get_quizzes_with_questions(visible.id, Some(true), true)
        .await
        .unwrap();
    assert_eq!(quizzes[0].questions.len(), 1);
    assert_eq!(quizzes[0].questions[0].choices.len(), 2);
}

#[tokio::test]
async fn test_submission_grading_counts_correct_choices() {
    let (db, chapters, questions, grading) = setup().await;
    let course_id = create_course(&db, "Organic Chemistry 1").await;
    let chapter = chapters
        .create_chapter(chapter_request(course_id, "Acids and Bases", 1))
        .await
        .unwrap();

    let mut answers = Vec::new();
    for (i, pick_correct) in [true, false].iter().enumerate() {
        let question = questions
            .create_question(question_request(chapter.id, &format!("Question {i}")))
            .await
            .unwrap();
        questions
            .publish_question(question.question.id, true)
            .await
            .unwrap();

        let refreshed = questions
            .get_question(question.question.id)
            .await
            .unwrap()
            .unwrap();
        let choice = refreshed
            .choices
            .iter()
            .find(|c| c.is_correct == *pick_correct)
            .unwrap();
        answers.push(AnswerInput {
            question_id: refreshed.question.id,
            choice_id: Some(choice.id),
        });
    }

    let quiz_id = questions.ensure_quiz(chapter.id, true).await.unwrap();
    let submission = grading
        .submit(CreateSubmissionRequest {
            quiz_id,
            student_id: None,
            answers,
        })
        .await
        .unwrap();
    assert!(!submission.graded);

    let report = grading.grade(submission.id, None).await.unwrap().unwrap();
    assert_eq!(report.score, 50.0);
    assert_eq!(report.grade.feedback.as_deref(), Some("Auto-graded: 1/2"));

    let stamped = grading.get_submission(submission.id).await.unwrap().unwrap();
    assert!(stamped.graded);
    assert_eq!(stamped.score, Some(50.0));

    // Unknown submission is a clean not-found
    assert!(grading.grade(Uuid::new_v4(), None).await.unwrap().is_none());
}
