use sqlx::{Executor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::MasteryProgressRow;

pub async fn get_progress<'e, E>(
    executor: E,
    user_id: Uuid,
    subject: &str,
    topic: &str,
) -> Result<Vec<MasteryProgressRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT level, correct, total, mastered
            FROM mastery_progress
            WHERE user_id = $1 AND subject = $2 AND topic = $3
            ORDER BY level
        "#,
    )
    .bind(user_id)
    .bind(subject)
    .bind(topic)
    .fetch_all(executor)
    .await
}

/// Upsert the progress of several levels at once.
pub async fn upsert_progress<'e, E>(
    executor: E,
    user_id: Uuid,
    subject: &str,
    topic: &str,
    levels: &[MasteryProgressRow],
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if levels.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Postgres>::new(
        // language=PostgreSQL
        r#"
            INSERT INTO mastery_progress (user_id, subject, topic, level, correct, total, mastered)
        "#,
    );
    qb.push_values(levels, |mut b, row| {
        b.push_bind(user_id);
        b.push_bind(subject);
        b.push_bind(topic);
        b.push_bind(row.level);
        b.push_bind(row.correct);
        b.push_bind(row.total);
        b.push_bind(row.mastered);
    });
    qb.push(
        // language=PostgreSQL
        r#"
            ON CONFLICT (user_id, subject, topic, level)
            DO UPDATE SET
                correct = EXCLUDED.correct,
                total = EXCLUDED.total,
                mastered = mastery_progress.mastered OR EXCLUDED.mastered,
                updated_at = NOW()
        "#,
    );

    qb.build().execute(executor).await?;
    Ok(())
}

/// Forget every level of a topic. Returns the number of rows removed.
pub async fn delete_topic<'e, E>(
    executor: E,
    user_id: Uuid,
    subject: &str,
    topic: &str,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM mastery_progress
            WHERE user_id = $1 AND subject = $2 AND topic = $3
        "#,
    )
    .bind(user_id)
    .bind(subject)
    .bind(topic)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
