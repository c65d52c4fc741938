//! Repository pattern for database operations
//!
//! Provides a clean interface for all article data access,
//! including the conditional claim write used by the enrichment worker.

use crate::config::EnrichmentPolicy;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use tracing::debug;
use uuid::Uuid;

/// Fields of a freshly scraped article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub original_content: String,
}

/// Allow-listed article fields that may be overwritten after creation
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub updated_content: Option<String>,
    pub reference_links: Option<Vec<String>>,
    pub status: Option<ArticleStatus>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Article Reads
    // ========================================================================

    /// All articles, most recently updated first
    pub async fn list_articles(&self) -> Result<Vec<Article>> {
        ArticleEntity::find()
            .order_by_desc(ArticleColumn::LastUpdated)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find article by ID
    pub async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find article by its source URL
    pub async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::Url.eq(url))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Article Writes
    // ========================================================================

    /// Insert a new Pending article. A URL that is already stored fails with
    /// `DuplicateArticle`.
    pub async fn create_article(&self, new: NewArticle) -> Result<Article> {
        let now = Utc::now();
        let url = new.url.clone();

        let article = ArticleActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            url: Set(new.url),
            original_content: Set(new.original_content),
            updated_content: Set(String::new()),
            reference_links: Set(serde_json::json!([])),
            status: Set(ArticleStatus::Pending.as_str().to_string()),
            attempt_count: Set(0),
            error_kind: Set(None),
            last_error: Set(None),
            claimed_at: Set(None),
            created_at: Set(now.into()),
            last_updated: Set(now.into()),
        };

        article.insert(self.conn()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateArticle { url },
            _ => e.into(),
        })
    }

    /// Apply allow-listed changes; status may only move forward and
    /// Processing is entered only through `claim_article`
    pub async fn patch_article(&self, id: Uuid, changes: ArticleChanges) -> Result<Article> {
        let current = self
            .find_article_by_id(id)
            .await?
            .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })?;

        let from = current.article_status()?;
        if let Some(to) = changes.status {
            // a claim stamps the lease that makes Processing reclaimable
            let unclaimed = to == ArticleStatus::Processing && from != ArticleStatus::Processing;
            if unclaimed || !from.can_transition_to(to) {
                return Err(AppError::InvalidStatusTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }

        let mut article: ArticleActiveModel = current.into();

        if let Some(title) = changes.title {
            article.title = Set(title);
        }

        if let Some(content) = changes.updated_content {
            article.updated_content = Set(content);
        }

        if let Some(links) = changes.reference_links {
            article.reference_links = Set(serde_json::to_value(links)?);
        }

        if let Some(status) = changes.status {
            article.status = Set(status.as_str().to_string());
        }

        article.last_updated = Set(Utc::now().into());

        article.update(self.conn()).await.map_err(Into::into)
    }

    /// Atomically claim an article for enrichment.
    ///
    /// A single conditional write succeeds only when the article is Pending,
    /// or Processing with a claim older than the reclaim lease and attempts left.
    pub async fn claim_article(&self, id: Uuid, policy: &EnrichmentPolicy) -> Result<Article> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let cutoff = now - policy.reclaim_after();

        let claimable = Condition::any()
            .add(ArticleColumn::Status.eq(ArticleStatus::Pending.as_str()))
            .add(
                Condition::all()
                    .add(ArticleColumn::Status.eq(ArticleStatus::Processing.as_str()))
                    .add(ArticleColumn::AttemptCount.lt(policy.max_attempts))
                    .add(ArticleColumn::ClaimedAt.lt(cutoff)),
            );

        let result = ArticleEntity::update_many()
            .col_expr(
                ArticleColumn::Status,
                Expr::value(ArticleStatus::Processing.as_str()),
            )
            .col_expr(
                ArticleColumn::AttemptCount,
                Expr::col(ArticleColumn::AttemptCount).add(1),
            )
            .col_expr(ArticleColumn::ClaimedAt, Expr::value(now))
            .col_expr(ArticleColumn::LastUpdated, Expr::value(now))
            .filter(ArticleColumn::Id.eq(id))
            .filter(claimable)
            .exec(self.conn())
            .await?;

        let article = self
            .find_article_by_id(id)
            .await?
            .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })?;

        if result.rows_affected == 0 {
            debug!(article_id = %id, status = %article.status, "Claim rejected");
            return Err(AppError::NotClaimable { id: id.to_string() });
        }

        Ok(article)
    }

    /// Record a failed enrichment attempt.
    ///
    /// The article stays Processing while attempts remain and becomes Failed
    /// once `max_attempts` claims have been spent.
    pub async fn record_failure(
        &self,
        id: Uuid,
        kind: FailureKind,
        message: &str,
        max_attempts: i32,
    ) -> Result<Article> {
        let current = self
            .find_article_by_id(id)
            .await?
            .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })?;

        let status = current.article_status()?;
        if status != ArticleStatus::Processing {
            return Err(AppError::InvalidStatusTransition {
                from: status.to_string(),
                to: ArticleStatus::Failed.to_string(),
            });
        }

        let exhausted = current.attempt_count >= max_attempts;

        let mut article: ArticleActiveModel = current.into();
        article.error_kind = Set(Some(kind.as_str().to_string()));
        article.last_error = Set(Some(message.to_string()));
        if exhausted {
            article.status = Set(ArticleStatus::Failed.as_str().to_string());
        }
        article.last_updated = Set(Utc::now().into());

        article.update(self.conn()).await.map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, Database};

    pub(crate) async fn memory_repository() -> Repository {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let conn = Database::connect(opts).await.unwrap();
        let pool = DbPool::from_connection(conn);
        pool.ensure_schema().await.unwrap();
        Repository::new(pool)
    }

    fn new_article(url: &str) -> NewArticle {
        NewArticle {
            title: "How chatbots help support teams".to_string(),
            url: url.to_string(),
            original_content: "Support teams spend a lot of time on repetitive questions.".to_string(),
        }
    }

    fn immediate_reclaim() -> EnrichmentPolicy {
        EnrichmentPolicy {
            max_attempts: 2,
            reclaim_after_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_url() {
        let repo = memory_repository().await;

        let created = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();
        assert_eq!(created.article_status().unwrap(), ArticleStatus::Pending);
        assert!(created.updated_content.is_empty());
        assert!(created.links().is_empty());

        let found = repo.find_article_by_url("https://blog.example.com/a").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(created.id));
        assert!(repo.find_article_by_url("https://blog.example.com/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected_by_schema() {
        let repo = memory_repository().await;
        repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();

        let err = repo
            .create_article(new_article("https://blog.example.com/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateArticle { ref url } if url == "https://blog.example.com/a"));
    }

    #[tokio::test]
    async fn test_list_orders_by_last_updated() {
        let repo = memory_repository().await;
        let first = repo.create_article(new_article("https://blog.example.com/1")).await.unwrap();
        let second = repo.create_article(new_article("https://blog.example.com/2")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.patch_article(
            first.id,
            ArticleChanges { title: Some("Edited".into()), ..Default::default() },
        )
        .await
        .unwrap();

        let listed = repo.list_articles().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[tokio::test]
    async fn test_patch_unknown_id_is_not_found() {
        let repo = memory_repository().await;
        let err = repo
            .patch_article(Uuid::new_v4(), ArticleChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_patch_rejects_backward_transition() {
        let repo = memory_repository().await;
        let article = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();
        repo.claim_article(article.id, &EnrichmentPolicy::default()).await.unwrap();

        let completed = repo
            .patch_article(
                article.id,
                ArticleChanges {
                    updated_content: Some("<p>Better</p>".into()),
                    reference_links: Some(vec!["https://ref.example.org/x".into()]),
                    status: Some(ArticleStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.article_status().unwrap(), ArticleStatus::Completed);
        assert_eq!(completed.links(), vec!["https://ref.example.org/x".to_string()]);

        let err = repo
            .patch_article(
                article.id,
                ArticleChanges { status: Some(ArticleStatus::Pending), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatusTransition { .. }));

        let unchanged = repo.find_article_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(unchanged.article_status().unwrap(), ArticleStatus::Completed);
    }

    #[tokio::test]
    async fn test_pending_cannot_jump_to_completed() {
        let repo = memory_repository().await;
        let article = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();

        let err = repo
            .patch_article(
                article.id,
                ArticleChanges { status: Some(ArticleStatus::Completed), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatusTransition { .. }));
    }

    #[tokio::test]
    async fn test_patch_cannot_enter_processing() {
        let repo = memory_repository().await;
        let article = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();

        let err = repo
            .patch_article(
                article.id,
                ArticleChanges { status: Some(ArticleStatus::Processing), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatusTransition { .. }));

        let unchanged = repo.find_article_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(unchanged.article_status().unwrap(), ArticleStatus::Pending);
        assert!(unchanged.claimed_at.is_none());

        // still claimable, and a claimed article may restate its status
        let claimed = repo.claim_article(article.id, &immediate_reclaim()).await.unwrap();
        assert!(claimed.claimed_at.is_some());
        let restated = repo
            .patch_article(
                article.id,
                ArticleChanges {
                    title: Some("Edited".into()),
                    status: Some(ArticleStatus::Processing),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(restated.article_status().unwrap(), ArticleStatus::Processing);
        assert_eq!(restated.attempt_count, 1);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let repo = memory_repository().await;
        let article = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();
        let policy = EnrichmentPolicy::default();

        let claimed = repo.claim_article(article.id, &policy).await.unwrap();
        assert_eq!(claimed.article_status().unwrap(), ArticleStatus::Processing);
        assert_eq!(claimed.attempt_count, 1);
        assert!(claimed.claimed_at.is_some());

        let second = repo.claim_article(article.id, &policy).await.unwrap_err();
        assert!(matches!(second, AppError::NotClaimable { .. }));
    }

    #[tokio::test]
    async fn test_claim_unknown_id_is_not_found() {
        let repo = memory_repository().await;
        let err = repo
            .claim_article(Uuid::new_v4(), &EnrichmentPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_failure_keeps_processing_until_attempts_exhausted() {
        let repo = memory_repository().await;
        let article = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();
        let policy = immediate_reclaim();

        repo.claim_article(article.id, &policy).await.unwrap();
        let after_first = repo
            .record_failure(article.id, FailureKind::Generation, "model overloaded", policy.max_attempts)
            .await
            .unwrap();
        assert_eq!(after_first.article_status().unwrap(), ArticleStatus::Processing);
        assert_eq!(after_first.failure_kind(), Some(FailureKind::Generation));
        assert_eq!(after_first.last_error.as_deref(), Some("model overloaded"));

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let reclaimed = repo.claim_article(article.id, &policy).await.unwrap();
        assert_eq!(reclaimed.attempt_count, 2);

        let after_second = repo
            .record_failure(article.id, FailureKind::Generation, "model overloaded", policy.max_attempts)
            .await
            .unwrap();
        assert_eq!(after_second.article_status().unwrap(), ArticleStatus::Failed);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let err = repo.claim_article(article.id, &policy).await.unwrap_err();
        assert!(matches!(err, AppError::NotClaimable { .. }));
    }

    #[tokio::test]
    async fn test_failure_on_pending_article_is_rejected() {
        let repo = memory_repository().await;
        let article = repo.create_article(new_article("https://blog.example.com/a")).await.unwrap();

        let err = repo
            .record_failure(article.id, FailureKind::Internal, "boom", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStatusTransition { .. }));
    }
}
