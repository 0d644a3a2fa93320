//! PostgreSQL repository implementation with pgvector support.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::models::{OwnerId, TabId};
use crate::domain::search::traits::{Result, SearchRepository};
use crate::domain::search::types::{ScoredTab, TabSummary};

/// PostgreSQL-backed tab index.
///
/// - Vector similarity via pgvector (`<=>` cosine distance, HNSW index)
/// - Full-text ranking via `ts_rank_cd` over an unaccented english tsvector
///
/// Fusion happens in the service, not in SQL.
#[derive(Clone)]
pub struct PgSearchRepository {
    pool: PgPool,
}

impl PgSearchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScoredTabRow {
    id: String,
    url: String,
    title: Option<String>,
    domain: Option<String>,
    summary: Option<String>,
    category: Option<String>,
    thumbnail_url: Option<String>,
    date_added: OffsetDateTime,
    score: Option<f64>,
}

impl ScoredTabRow {
    fn into_summary(self) -> (TabSummary, f64) {
        let summary = TabSummary {
            id: TabId::new(self.id),
            url: self.url,
            title: self.title,
            domain: self.domain,
            summary: self.summary,
            category: self.category,
            thumbnail_url: self.thumbnail_url,
            date_added: self.date_added,
        };
        (summary, self.score.unwrap_or(0.0))
    }
}

fn map_scored_rows(rows: Vec<ScoredTabRow>) -> Vec<ScoredTab> {
    rows.into_iter()
        .map(|row| {
            let (tab, score) = row.into_summary();
            ScoredTab { tab, score }
        })
        .collect()
}

#[async_trait]
impl SearchRepository for PgSearchRepository {
    async fn search_by_vector(
        &self,
        embedding: &[f32],
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>> {
        if embedding.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, ScoredTabRow>(
            r#"
            SELECT
                id, url, title, domain, summary, category, thumbnail_url, date_added,
                (1 - (embedding <=> $1))::float8 AS score
            FROM tabs
            WHERE owner_id = $2
              AND status <> 'discarded'
              AND embedding IS NOT NULL
            ORDER BY embedding <=> $1, id
            LIMIT $3
            "#,
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(owner.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(map_scored_rows(rows))
    }

    async fn search_by_text(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>> {
        let rows = sqlx::query_as::<_, ScoredTabRow>(
            r#"
            SELECT
                id, url, title, domain, summary, category, thumbnail_url, date_added,
                ts_rank_cd(search_vector, websearch_to_tsquery('english', f_unaccent($1)))::float8 AS score
            FROM tabs
            WHERE owner_id = $2
              AND search_vector @@ websearch_to_tsquery('english', f_unaccent($1))
            ORDER BY score DESC, date_added DESC, id
            LIMIT $3
            "#,
        )
        .bind(query)
        .bind(owner.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(map_scored_rows(rows))
    }

    async fn list_tab_summaries(&self, owner: &OwnerId) -> Result<Vec<TabSummary>> {
        let rows = sqlx::query_as::<_, ScoredTabRow>(
            r#"
            SELECT
                id, url, title, domain, summary, category, thumbnail_url, date_added,
                NULL::float8 AS score
            FROM tabs
            WHERE owner_id = $1
            ORDER BY date_added DESC, id
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.into_summary().0).collect())
    }
}
