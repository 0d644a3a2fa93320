use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::domain::models::{OwnerId, Tab, TabId, TabStatus, TabUpdate};

use super::repo_error::RepositoryError;

/// Durable tab records. Enrichment writes only through `update_tab`.
#[async_trait]
pub trait TabRepository: Send + Sync {
    /// Tabs with the given ids owned by `owner`. Missing ids are skipped.
    async fn get_tabs_by_ids(
        &self,
        ids: &[TabId],
        owner: &OwnerId,
    ) -> Result<Vec<Tab>, RepositoryError>;

    /// Apply the produced fields. Returns the number of rows affected; an
    /// empty update touches nothing and returns 0.
    async fn update_tab(&self, id: &TabId, update: &TabUpdate) -> Result<u64, RepositoryError>;

    /// All of the owner's tabs, newest first.
    async fn list_tabs(&self, owner: &OwnerId) -> Result<Vec<Tab>, RepositoryError>;

    async fn get_tab(&self, id: &TabId, owner: &OwnerId) -> Result<Tab, RepositoryError> {
        self.get_tabs_by_ids(std::slice::from_ref(id), owner)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(format!("tab {id}")))
    }
}

#[async_trait]
impl<T: TabRepository + ?Sized> TabRepository for Arc<T> {
    async fn get_tabs_by_ids(
        &self,
        ids: &[TabId],
        owner: &OwnerId,
    ) -> Result<Vec<Tab>, RepositoryError> {
        (**self).get_tabs_by_ids(ids, owner).await
    }

    async fn update_tab(&self, id: &TabId, update: &TabUpdate) -> Result<u64, RepositoryError> {
        (**self).update_tab(id, update).await
    }

    async fn list_tabs(&self, owner: &OwnerId) -> Result<Vec<Tab>, RepositoryError> {
        (**self).list_tabs(owner).await
    }
}

pub struct TabRepositoryImpl {
    pool: PgPool,
}

impl TabRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TAB_COLUMNS: &str = "id, owner_id, url, title, domain, summary, category, tags, content, \
     screenshot_url, thumbnail_url, full_screenshot_url, embedding, status, date_added, updated_at";

#[derive(sqlx::FromRow)]
struct TabRow {
    id: String,
    owner_id: String,
    url: String,
    title: Option<String>,
    domain: Option<String>,
    summary: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    content: Option<String>,
    screenshot_url: Option<String>,
    thumbnail_url: Option<String>,
    full_screenshot_url: Option<String>,
    embedding: Option<Vector>,
    status: String,
    date_added: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<TabRow> for Tab {
    type Error = RepositoryError;

    fn try_from(row: TabRow) -> Result<Self, Self::Error> {
        let status = TabStatus::from_str(&row.status).map_err(|_| {
            RepositoryError::InvalidRow(format!("tab {} has status '{}'", row.id, row.status))
        })?;

        Ok(Tab {
            id: TabId::new(row.id),
            owner_id: OwnerId::new(row.owner_id),
            url: row.url,
            title: row.title,
            domain: row.domain,
            summary: row.summary,
            category: row.category,
            tags: row.tags.unwrap_or_default(),
            content: row.content,
            screenshot_url: row.screenshot_url,
            thumbnail_url: row.thumbnail_url,
            full_screenshot_url: row.full_screenshot_url,
            embedding: row.embedding.map(|v| v.to_vec()),
            status,
            date_added: row.date_added,
            updated_at: row.updated_at,
        })
    }
}

fn into_tabs(rows: Vec<TabRow>) -> Result<Vec<Tab>, RepositoryError> {
    rows.into_iter().map(Tab::try_from).collect()
}

#[async_trait]
impl TabRepository for TabRepositoryImpl {
    async fn get_tabs_by_ids(
        &self,
        ids: &[TabId],
        owner: &OwnerId,
    ) -> Result<Vec<Tab>, RepositoryError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<&str> = ids.iter().map(TabId::as_str).collect();

        let rows = sqlx::query_as::<_, TabRow>(&format!(
            "SELECT {TAB_COLUMNS} FROM tabs WHERE owner_id = $1 AND id = ANY($2)"
        ))
        .bind(owner.as_str())
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        into_tabs(rows)
    }

    async fn update_tab(&self, id: &TabId, update: &TabUpdate) -> Result<u64, RepositoryError> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE tabs SET updated_at = NOW()");
        macro_rules! set_text {
            ($($field:ident),*) => {
                $(if let Some(value) = &update.$field {
                    builder
                        .push(concat!(", ", stringify!($field), " = "))
                        .push_bind(value.clone());
                })*
            };
        }
        set_text!(
            title,
            summary,
            category,
            content,
            screenshot_url,
            thumbnail_url,
            full_screenshot_url
        );
        if let Some(tags) = &update.tags {
            builder.push(", tags = ").push_bind(tags.clone());
        }
        if let Some(embedding) = &update.embedding {
            builder
                .push(", embedding = ")
                .push_bind(Vector::from(embedding.clone()));
        }
        builder.push(" WHERE id = ").push_bind(id.as_str().to_string());

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_tabs(&self, owner: &OwnerId) -> Result<Vec<Tab>, RepositoryError> {
        let rows = sqlx::query_as::<_, TabRow>(&format!(
            "SELECT {TAB_COLUMNS} FROM tabs WHERE owner_id = $1 ORDER BY date_added DESC, id"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        into_tabs(rows)
    }
}
