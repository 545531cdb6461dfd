use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::PracticeScheduleRow;

pub async fn get<'e, E>(
    executor: E,
    user_id: Uuid,
    subject: &str,
    topic: &str,
) -> Result<Option<PracticeScheduleRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT user_id, subject, topic, next_practice_at, interval_days, ease_factor,
                   review_count, last_practiced_at, last_performance
            FROM practice_schedules
            WHERE user_id = $1 AND subject = $2 AND topic = $3
        "#,
    )
    .bind(user_id)
    .bind(subject)
    .bind(topic)
    .fetch_optional(executor)
    .await
}

pub async fn list_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<PracticeScheduleRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT user_id, subject, topic, next_practice_at, interval_days, ease_factor,
                   review_count, last_practiced_at, last_performance
            FROM practice_schedules
            WHERE user_id = $1
            ORDER BY next_practice_at
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn upsert<'e, E>(executor: E, schedule: &PracticeScheduleRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO practice_schedules (user_id, subject, topic, next_practice_at, interval_days,
                                            ease_factor, review_count, last_practiced_at, last_performance)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, subject, topic)
            DO UPDATE SET
                next_practice_at = $4,
                interval_days = $5,
                ease_factor = $6,
                review_count = $7,
                last_practiced_at = $8,
                last_performance = $9,
                updated_at = NOW()
        "#,
    )
    .bind(schedule.user_id)
    .bind(&schedule.subject)
    .bind(&schedule.topic)
    .bind(schedule.next_practice_at)
    .bind(schedule.interval_days)
    .bind(schedule.ease_factor)
    .bind(schedule.review_count)
    .bind(schedule.last_practiced_at)
    .bind(schedule.last_performance)
    .execute(executor)
    .await?;
    Ok(())
}
