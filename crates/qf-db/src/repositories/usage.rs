use sqlx::{Executor, Postgres, QueryBuilder};

use crate::models::UsageLogInsert;

/// Insert a batch of usage records and bump the per-question counters in one statement.
pub async fn insert_batch<'e, E>(executor: E, records: &[UsageLogInsert]) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    if records.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Postgres>::new(
        // language=PostgreSQL
        r#"
            WITH inserted AS (
                INSERT INTO question_usage (question_id, selected_index, is_correct)
        "#,
    );
    qb.push_values(records, |mut b, record| {
        b.push_bind(record.question_id);
        b.push_bind(record.selected_index);
        b.push_bind(record.is_correct);
    });
    qb.push(
        // language=PostgreSQL
        r#"
                RETURNING question_id, is_correct
            )
            UPDATE questions q
            SET times_answered = q.times_answered + s.answered,
                times_correct = q.times_correct + s.correct
            FROM (
                SELECT question_id,
                       COUNT(*)::int AS answered,
                       (COUNT(*) FILTER (WHERE is_correct))::int AS correct
                FROM inserted
                GROUP BY question_id
            ) s
            WHERE q.id = s.question_id
        "#,
    );

    qb.build().execute(executor).await?;
    Ok(records.len() as u64)
}
