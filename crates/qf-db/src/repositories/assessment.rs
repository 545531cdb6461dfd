use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::AssessmentResultRow;

pub async fn insert<'e, E>(executor: E, result: &AssessmentResultRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO assessment_results (id, user_id, subject, topics, final_score, skill_tier,
                                            highest_level, max_level, total_questions, total_correct,
                                            avg_time_secs, duration_seconds, topic_performance,
                                            recommendations, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(result.id)
    .bind(result.user_id)
    .bind(&result.subject)
    .bind(&result.topics)
    .bind(result.final_score)
    .bind(&result.skill_tier)
    .bind(result.highest_level)
    .bind(result.max_level)
    .bind(result.total_questions)
    .bind(result.total_correct)
    .bind(result.avg_time_secs)
    .bind(result.duration_seconds)
    .bind(&result.topic_performance)
    .bind(&result.recommendations)
    .bind(result.completed_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get<'e, E>(executor: E, id: Uuid) -> Result<Option<AssessmentResultRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, subject, topics, final_score, skill_tier, highest_level, max_level,
                   total_questions, total_correct, avg_time_secs, duration_seconds,
                   topic_performance, recommendations, completed_at
            FROM assessment_results
            WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn list_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<AssessmentResultRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, subject, topics, final_score, skill_tier, highest_level, max_level,
                   total_questions, total_correct, avg_time_secs, duration_seconds,
                   topic_performance, recommendations, completed_at
            FROM assessment_results
            WHERE user_id = $1
            ORDER BY completed_at DESC
            LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}
