use sqlx::{Executor, Postgres};

use crate::models::QuestionRow;

/// Every question of a subject, restricted to `topics` when non-empty.
pub async fn list_for_topics<'e, E>(
    executor: E,
    subject: &str,
    topics: &[String],
) -> Result<Vec<QuestionRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, subject, topic, level, text, options, correct_index, explanation, hint, concepts
            FROM questions
            WHERE subject = $1
                AND (cardinality($2::text[]) = 0 OR topic = ANY($2))
            ORDER BY topic, level, created_at
        "#,
    )
    .bind(subject)
    .bind(topics)
    .fetch_all(executor)
    .await
}

pub async fn insert<'e, E>(executor: E, question: &QuestionRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO questions (id, subject, topic, level, text, options, correct_index, explanation, hint, concepts)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(question.id)
    .bind(&question.subject)
    .bind(&question.topic)
    .bind(question.level)
    .bind(&question.text)
    .bind(&question.options)
    .bind(question.correct_index)
    .bind(&question.explanation)
    .bind(&question.hint)
    .bind(&question.concepts)
    .execute(executor)
    .await?;
    Ok(())
}
