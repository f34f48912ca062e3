use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory SQLite database exists per connection; pooling more
        // than one would hand out empty databases.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await?
        } else {
            SqlitePool::connect(database_url).await?
        };

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS courses (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                image_url TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 1,
                title TEXT NOT NULL,
                description TEXT,
                video_url TEXT,
                published INTEGER NOT NULL DEFAULT 0,
                draft_of TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id TEXT PRIMARY KEY,
                chapter_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                is_practice INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                quiz_id TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 1,
                text TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'multiple_choice',
                points INTEGER NOT NULL DEFAULT 1,
                image TEXT,
                published INTEGER NOT NULL DEFAULT 0,
                draft_of TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS choices (
                id TEXT PRIMARY KEY,
                question_id TEXT NOT NULL,
                text TEXT NOT NULL,
                is_correct INTEGER NOT NULL DEFAULT 0,
                image TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                quiz_id TEXT NOT NULL,
                student_id TEXT,
                submitted_at TEXT NOT NULL,
                score REAL,
                graded INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                submission_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                choice_id TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS grades (
                id TEXT PRIMARY KEY,
                submission_id TEXT NOT NULL,
                grader_id TEXT,
                points REAL NOT NULL,
                feedback TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Course operations
    pub async fn create_course(&self, request: CreateCourseRequest) -> Result<Course> {
        let course = Course {
            id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            image_url: request.image_url,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO courses (id, title, description, image_url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(course.id.to_string())
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.image_url)
        .bind(course.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(course)
    }

    pub async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query("SELECT * FROM courses WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_course(&r)).transpose()
    }

    pub async fn get_all_courses(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query("SELECT * FROM courses ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_course).collect()
    }

    // Chapter operations
    pub async fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chapters (id, course_id, position, title, description, video_url, published, draft_of)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(chapter.id.to_string())
        .bind(chapter.course_id.to_string())
        .bind(chapter.position)
        .bind(&chapter.title)
        .bind(&chapter.description)
        .bind(&chapter.video_url)
        .bind(chapter.published)
        .bind(chapter.draft_of.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_chapter(&self, id: Uuid) -> Result<Option<Chapter>> {
        let row = sqlx::query("SELECT * FROM chapters WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_chapter(&r)).transpose()
    }

    pub async fn get_chapters_for_course(&self, course_id: Uuid) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(
            "SELECT * FROM chapters WHERE course_id = ?1 ORDER BY position ASC",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chapter).collect()
    }

    /// Overwrite every mutable field of the chapter row, publish flag
    /// included. Promotion relies on this being a full overwrite rather
    /// than a merge.
    pub async fn update_chapter(&self, chapter: &Chapter) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE chapters
            SET title = ?1, description = ?2, video_url = ?3, position = ?4, published = ?5
            WHERE id = ?6
            "#,
        )
        .bind(&chapter.title)
        .bind(&chapter.description)
        .bind(&chapter.video_url)
        .bind(chapter.position)
        .bind(chapter.published)
        .bind(chapter.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_chapter_published(&self, id: Uuid, published: bool) -> Result<u64> {
        let result = sqlx::query("UPDATE chapters SET published = ?1 WHERE id = ?2")
            .bind(published)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// The pending draft row for an original chapter, if one exists.
    pub async fn get_draft_for_chapter(&self, original_id: Uuid) -> Result<Option<Chapter>> {
        let row = sqlx::query("SELECT * FROM chapters WHERE draft_of = ?1 LIMIT 1")
            .bind(original_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_chapter(&r)).transpose()
    }

    pub async fn get_chapter_drafts_for_course(&self, course_id: Uuid) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(
            "SELECT * FROM chapters WHERE course_id = ?1 AND draft_of IS NOT NULL",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chapter).collect()
    }

    pub async fn delete_chapter_row(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chapters WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // Quiz operations
    pub async fn find_quiz(&self, chapter_id: Uuid, is_practice: bool) -> Result<Option<Quiz>> {
        let row = sqlx::query(
            "SELECT * FROM quizzes WHERE chapter_id = ?1 AND is_practice = ?2 LIMIT 1",
        )
        .bind(chapter_id.to_string())
        .bind(is_practice)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_quiz(&r)).transpose()
    }

    pub async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        sqlx::query(
            "INSERT INTO quizzes (id, chapter_id, title, description, is_practice) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(quiz.id.to_string())
        .bind(quiz.chapter_id.to_string())
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.is_practice)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_quizzes_for_chapter(
        &self,
        chapter_id: Uuid,
        practice: Option<bool>,
    ) -> Result<Vec<Quiz>> {
        let rows = match practice {
            Some(is_practice) => {
                sqlx::query("SELECT * FROM quizzes WHERE chapter_id = ?1 AND is_practice = ?2")
                    .bind(chapter_id.to_string())
                    .bind(is_practice)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM quizzes WHERE chapter_id = ?1")
                    .bind(chapter_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(row_to_quiz).collect()
    }

    // Question operations
    pub async fn insert_question(&self, question: &Question) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, quiz_id, position, text, type, points, image, published, draft_of)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(question.id.to_string())
        .bind(question.quiz_id.to_string())
        .bind(question.position)
        .bind(&question.text)
        .bind(&question.question_type)
        .bind(question.points)
        .bind(&question.image)
        .bind(question.published)
        .bind(question.draft_of.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query("SELECT * FROM questions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_question(&r)).transpose()
    }

    pub async fn get_questions_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT * FROM questions WHERE quiz_id = ?1 ORDER BY position ASC",
        )
        .bind(quiz_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_question).collect()
    }

    /// Full-overwrite update of a question's mutable fields, publish flag
    /// included (see update_chapter).
    pub async fn update_question(&self, question: &Question) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE questions
            SET text = ?1, type = ?2, points = ?3, image = ?4, position = ?5, published = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&question.text)
        .bind(&question.question_type)
        .bind(question.points)
        .bind(&question.image)
        .bind(question.position)
        .bind(question.published)
        .bind(question.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_question_published(&self, id: Uuid, published: bool) -> Result<u64> {
        let result = sqlx::query("UPDATE questions SET published = ?1 WHERE id = ?2")
            .bind(published)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn get_draft_for_question(&self, original_id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query("SELECT * FROM questions WHERE draft_of = ?1 LIMIT 1")
            .bind(original_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_question(&r)).transpose()
    }

    pub async fn get_question_drafts_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT * FROM questions WHERE quiz_id = ?1 AND draft_of IS NOT NULL",
        )
        .bind(quiz_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_question).collect()
    }

    pub async fn delete_question_row(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn next_question_position(&self, quiz_id: Uuid) -> Result<i32> {
        let row = sqlx::query(
            "SELECT position FROM questions WHERE quiz_id = ?1 ORDER BY position DESC LIMIT 1",
        )
        .bind(quiz_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i32, _>("position") + 1).unwrap_or(1))
    }

    pub async fn get_question_ids_for_quizzes(&self, quiz_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if quiz_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=quiz_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT id FROM questions WHERE quiz_id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in quiz_ids {
            query = query.bind(id.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|r| Ok(Uuid::parse_str(&r.get::<String, _>("id"))?))
            .collect()
    }

    // Choice operations
    pub async fn get_choices_for_question(&self, question_id: Uuid) -> Result<Vec<Choice>> {
        let rows = sqlx::query("SELECT * FROM choices WHERE question_id = ?1")
            .bind(question_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_choice).collect()
    }

    pub async fn insert_choices(&self, question_id: Uuid, choices: &[ChoiceInput]) -> Result<()> {
        for choice in choices {
            sqlx::query(
                "INSERT INTO choices (id, question_id, text, is_correct, image) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(question_id.to_string())
            .bind(&choice.text)
            .bind(choice.is_correct)
            .bind(&choice.image)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Wholesale choice replacement: drop everything the question owns,
    /// then insert the new set. Choices are never patched field-by-field.
    pub async fn replace_choices(&self, question_id: Uuid, choices: &[ChoiceInput]) -> Result<()> {
        sqlx::query("DELETE FROM choices WHERE question_id = ?1")
            .bind(question_id.to_string())
            .execute(&self.pool)
            .await?;

        self.insert_choices(question_id, choices).await
    }

    /// Generic ordered-plan delete step: DELETE FROM table WHERE column IN (ids).
    /// Tables and columns come from the fixed deletion plans in cascade.rs,
    /// never from request input.
    pub async fn delete_by_column(&self, table: &str, column: &str, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("DELETE FROM {table} WHERE {column} IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    // Submission operations
    pub async fn create_submission(
        &self,
        quiz_id: Uuid,
        student_id: Option<Uuid>,
    ) -> Result<Submission> {
        let submission = Submission {
            id: Uuid::new_v4(),
            quiz_id,
            student_id,
            submitted_at: Utc::now(),
            score: None,
            graded: false,
        };

        sqlx::query(
            r#"
            INSERT INTO submissions (id, quiz_id, student_id, submitted_at, score, graded)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(submission.id.to_string())
        .bind(submission.quiz_id.to_string())
        .bind(submission.student_id.map(|id| id.to_string()))
        .bind(submission.submitted_at.to_rfc3339())
        .bind(submission.score)
        .bind(submission.graded)
        .execute(&self.pool)
        .await?;

        Ok(submission)
    }

    pub async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
        let row = sqlx::query("SELECT * FROM submissions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_submission(&r)).transpose()
    }

    pub async fn insert_answer(
        &self,
        submission_id: Uuid,
        answer: &AnswerInput,
    ) -> Result<Answer> {
        let record = Answer {
            id: Uuid::new_v4(),
            submission_id,
            question_id: answer.question_id,
            choice_id: answer.choice_id,
        };

        sqlx::query(
            "INSERT INTO answers (id, submission_id, question_id, choice_id) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(record.id.to_string())
        .bind(record.submission_id.to_string())
        .bind(record.question_id.to_string())
        .bind(record.choice_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Per-answer correctness for grading: the chosen choice's is_correct,
    /// or None when no choice was selected (or the choice row is gone).
    pub async fn get_answer_correctness(&self, submission_id: Uuid) -> Result<Vec<Option<bool>>> {
        let rows = sqlx::query(
            r#"
            SELECT choices.is_correct AS is_correct
            FROM answers
            LEFT JOIN choices ON choices.id = answers.choice_id
            WHERE answers.submission_id = ?1
            "#,
        )
        .bind(submission_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| r.get::<Option<bool>, _>("is_correct"))
            .collect())
    }

    pub async fn insert_grade(
        &self,
        submission_id: Uuid,
        grader_id: Option<Uuid>,
        points: f64,
        feedback: Option<String>,
    ) -> Result<Grade> {
        let grade = Grade {
            id: Uuid::new_v4(),
            submission_id,
            grader_id,
            points,
            feedback,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO grades (id, submission_id, grader_id, points, feedback, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(grade.id.to_string())
        .bind(grade.submission_id.to_string())
        .bind(grade.grader_id.map(|id| id.to_string()))
        .bind(grade.points)
        .bind(&grade.feedback)
        .bind(grade.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(grade)
    }

    pub async fn mark_submission_graded(&self, id: Uuid, score: f64) -> Result<()> {
        sqlx::query("UPDATE submissions SET score = ?1, graded = 1 WHERE id = ?2")
            .bind(score)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_course(row: &SqliteRow) -> Result<Course> {
    Ok(Course {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        title: row.get("title"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))?
            .with_timezone(&Utc),
    })
}

fn row_to_chapter(row: &SqliteRow) -> Result<Chapter> {
    Ok(Chapter {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        course_id: Uuid::parse_str(&row.get::<String, _>("course_id"))?,
        position: row.get("position"),
        title: row.get("title"),
        description: row.get("description"),
        video_url: row.get("video_url"),
        published: row.get("published"),
        draft_of: row
            .get::<Option<String>, _>("draft_of")
            .map(|s| Uuid::parse_str(&s))
            .transpose()?,
    })
}

fn row_to_quiz(row: &SqliteRow) -> Result<Quiz> {
    Ok(Quiz {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        chapter_id: Uuid::parse_str(&row.get::<String, _>("chapter_id"))?,
        title: row.get("title"),
        description: row.get("description"),
        is_practice: row.get("is_practice"),
    })
}

fn row_to_question(row: &SqliteRow) -> Result<Question> {
    Ok(Question {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        quiz_id: Uuid::parse_str(&row.get::<String, _>("quiz_id"))?,
        position: row.get("position"),
        text: row.get("text"),
        question_type: row.get("type"),
        points: row.get("points"),
        image: row.get("image"),
        published: row.get("published"),
        draft_of: row
            .get::<Option<String>, _>("draft_of")
            .map(|s| Uuid::parse_str(&s))
            .transpose()?,
    })
}

fn row_to_choice(row: &SqliteRow) -> Result<Choice> {
    Ok(Choice {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        question_id: Uuid::parse_str(&row.get::<String, _>("question_id"))?,
        text: row.get("text"),
        is_correct: row.get("is_correct"),
        image: row.get("image"),
    })
}

fn row_to_submission(row: &SqliteRow) -> Result<Submission> {
    Ok(Submission {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        quiz_id: Uuid::parse_str(&row.get::<String, _>("quiz_id"))?,
        student_id: row
            .get::<Option<String>, _>("student_id")
            .map(|s| Uuid::parse_str(&s))
            .transpose()?,
        submitted_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("submitted_at"))?
            .with_timezone(&Utc),
        score: row.get("score"),
        graded: row.get("graded"),
    })
}
