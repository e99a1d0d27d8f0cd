use futures::future::{try_join_all, BoxFuture};
use tracing::{debug, info, instrument};

use crate::datastore::{Datastore, NewsRow};
use crate::error::Result;
use crate::newsapi::{Article, NewsFeed};

/// Datastore tables backing the news cache, one per headline category.
/// The first entry is the uncategorized top-headlines table.
pub const NEWS_TABLES: [&str; 7] = [
    "HEADLINES",
    "BUSINESS",
    "ENTERTAINMENT",
    "HEALTH",
    "SCIENCE",
    "SPORTS",
    "TECHNOLOGY",
];

/// Most articles kept per table on each sync.
pub const ARTICLE_LIMIT: usize = 15;

/// Rows written to the datastore per batch.
pub const DATASTORE_BATCH: usize = 5;

/// Per-table outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: &'static str,
    pub inserted: usize,
    pub updated: usize,
}

/// Outcome of a full sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub tables: Vec<TableSummary>,
}

struct TableMeta {
    table: &'static str,
    articles: Vec<Article>,
    row_ids: Vec<String>,
}

/// Refreshes the news cache tables from the feed.
pub struct NewsSync<F, D> {
    feed: F,
    datastore: D,
}

impl<F: NewsFeed, D: Datastore> NewsSync<F, D> {
    #[must_use]
    pub fn new(feed: F, datastore: D) -> Self {
        Self { feed, datastore }
    }

    /// Synchronizes every news table.
    ///
    /// Headlines and existing row identifiers are fetched for all tables in
    /// parallel; each table's rows are then written out sequentially in
    /// batches.
    ///
    /// # Errors
    ///
    /// Returns the first feed or datastore error; a failed table aborts the
    /// remainder of the run.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncReport> {
        let metas = try_join_all(NEWS_TABLES.iter().map(|&table| self.load_table(table))).await?;

        let mut report = SyncReport::default();
        for meta in metas {
            let summary = self.store_table(meta).await?;
            info!(
                table = %summary.table,
                inserted = summary.inserted,
                updated = summary.updated,
                "News table synchronized"
            );
            report.tables.push(summary);
        }
        Ok(report)
    }

    async fn load_table(&self, table: &'static str) -> Result<TableMeta> {
        // The first table is the uncategorized feed; every other table
        // doubles as its own category name.
        let category = if table == NEWS_TABLES[0] {
            None
        } else {
            Some(table)
        };

        let articles = self.feed.top_headlines(category).await?;
        let row_ids = self.datastore.row_ids(table).await?;
        debug!(
            table = %table,
            articles = articles.len(),
            existing_rows = row_ids.len(),
            "News table loaded"
        );
        Ok(TableMeta {
            table,
            articles,
            row_ids,
        })
    }

    /// Writes one table's articles in batches, pairing each article with an
    /// existing row identifier while they last and inserting the remainder.
    async fn store_table(&self, meta: TableMeta) -> Result<TableSummary> {
        let TableMeta {
            table,
            mut articles,
            row_ids,
        } = meta;
        articles.truncate(ARTICLE_LIMIT);

        let mut ids = row_ids.into_iter();
        let mut inserted = 0;
        let mut updated = 0;

        for batch in articles.chunks(DATASTORE_BATCH) {
            let mut writes: Vec<BoxFuture<'_, Result<()>>> = Vec::with_capacity(batch.len());
            for article in batch {
                let row = NewsRow::from(article.clone());
                match ids.next() {
                    Some(row_id) => {
                        updated += 1;
                        writes.push(Box::pin(async move {
                            self.datastore.update_row(table, &row_id, &row).await
                        }));
                    }
                    None => {
                        inserted += 1;
                        writes.push(Box::pin(async move {
                            self.datastore.insert_row(table, &row).await
                        }));
                    }
                }
            }
            try_join_all(writes).await?;
        }

        Ok(TableSummary {
            table,
            inserted,
            updated,
        })
    }
}

/// Reads the cached rows for one news table.
///
/// # Errors
///
/// Returns an error if the datastore query fails.
#[instrument(skip(datastore))]
pub async fn fetch_news(datastore: &dyn Datastore, table: &str) -> Result<Vec<NewsRow>> {
    let rows = datastore.fetch_rows(table).await?;
    debug!(table = %table, rows = rows.len(), "News rows fetched");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn article(n: usize) -> Article {
        Article {
            title: Some(format!("headline {n}")),
            url: Some(format!("https://example.com/{n}")),
        }
    }

    struct FixedFeed {
        articles: Vec<Article>,
        calls: Mutex<Vec<Option<String>>>,
        fail_category: Option<&'static str>,
    }

    impl FixedFeed {
        fn new(articles: Vec<Article>) -> Self {
            Self {
                articles,
                calls: Mutex::new(Vec::new()),
                fail_category: None,
            }
        }
    }

    #[async_trait]
    impl NewsFeed for FixedFeed {
        async fn top_headlines(&self, category: Option<&str>) -> Result<Vec<Article>> {
            self.calls
                .lock()
                .unwrap()
                .push(category.map(ToString::to_string));
            if self.fail_category.is_some() && category == self.fail_category {
                return Err(Error::NewsFeedError("feed unavailable".to_string()));
            }
            Ok(self.articles.clone())
        }
    }

    #[derive(Default)]
    struct MemoryDatastore {
        tables: Mutex<HashMap<String, Vec<(String, NewsRow)>>>,
        ops: Mutex<Vec<String>>,
        next_id: Mutex<u64>,
    }

    impl MemoryDatastore {
        fn with_rows(table: &str, rows: &[(&str, NewsRow)]) -> Self {
            let store = Self::default();
            store.tables.lock().unwrap().insert(
                table.to_string(),
                rows.iter()
                    .map(|(id, row)| ((*id).to_string(), row.clone()))
                    .collect(),
            );
            store
        }

        fn rows(&self, table: &str) -> Vec<(String, NewsRow)> {
            self.tables
                .lock()
                .unwrap()
                .get(table)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Datastore for MemoryDatastore {
        async fn row_ids(&self, table: &str) -> Result<Vec<String>> {
            Ok(self
                .rows(table)
                .into_iter()
                .map(|(id, _)| id)
                .collect())
        }

        async fn insert_row(&self, table: &str, row: &NewsRow) -> Result<()> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = next_id.to_string();
            drop(next_id);

            self.ops.lock().unwrap().push(format!("insert {table}"));
            self.tables
                .lock()
                .unwrap()
                .entry(table.to_string())
                .or_default()
                .push((id, row.clone()));
            Ok(())
        }

        async fn update_row(&self, table: &str, row_id: &str, row: &NewsRow) -> Result<()> {
            self.ops
                .lock()
                .unwrap()
                .push(format!("update {table} {row_id}"));
            let mut tables = self.tables.lock().unwrap();
            let rows = tables
                .get_mut(table)
                .ok_or_else(|| Error::DatastoreError(format!("no such table {table}")))?;
            let slot = rows
                .iter_mut()
                .find(|(id, _)| id == row_id)
                .ok_or_else(|| Error::DatastoreError(format!("no row {row_id} in {table}")))?;
            slot.1 = row.clone();
            Ok(())
        }

        async fn fetch_rows(&self, table: &str) -> Result<Vec<NewsRow>> {
            Ok(self.rows(table).into_iter().map(|(_, row)| row).collect())
        }
    }

    #[tokio::test]
    async fn test_sync_inserts_into_empty_tables() {
        let sync = NewsSync::new(
            FixedFeed::new(vec![article(1), article(2)]),
            MemoryDatastore::default(),
        );
        let report = sync.run().await.expect("sync should succeed");

        assert_eq!(report.tables.len(), NEWS_TABLES.len());
        for summary in &report.tables {
            assert_eq!(summary.inserted, 2);
            assert_eq!(summary.updated, 0);
        }
        assert_eq!(sync.datastore.rows("HEADLINES").len(), 2);
        assert_eq!(sync.datastore.rows("TECHNOLOGY").len(), 2);
    }

    #[tokio::test]
    async fn test_sync_caps_articles_per_table() {
        let articles: Vec<Article> = (0..20).map(article).collect();
        let sync = NewsSync::new(FixedFeed::new(articles), MemoryDatastore::default());
        let report = sync.run().await.expect("sync should succeed");

        for summary in &report.tables {
            assert_eq!(summary.inserted, ARTICLE_LIMIT);
        }
        assert_eq!(sync.datastore.rows("HEADLINES").len(), ARTICLE_LIMIT);
    }

    #[tokio::test]
    async fn test_sync_requests_one_uncategorized_feed_and_one_per_category() {
        let sync = NewsSync::new(FixedFeed::new(vec![article(1)]), MemoryDatastore::default());
        sync.run().await.expect("sync should succeed");

        let calls = sync.feed.calls.lock().unwrap().clone();
        let expected: Vec<Option<String>> = NEWS_TABLES
            .iter()
            .enumerate()
            .map(|(idx, table)| if idx == 0 { None } else { Some((*table).to_string()) })
            .collect();
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_sync_updates_existing_rows_then_inserts() {
        let existing: Vec<(&str, NewsRow)> = vec![
            ("r1", NewsRow::default()),
            ("r2", NewsRow::default()),
            ("r3", NewsRow::default()),
        ];
        let datastore = MemoryDatastore::with_rows("HEADLINES", &existing);
        let feed = FixedFeed::new((0..5).map(article).collect());

        let sync = NewsSync::new(feed, datastore);
        let report = sync.run().await.expect("sync should succeed");

        let headlines = report
            .tables
            .iter()
            .find(|summary| summary.table == "HEADLINES")
            .expect("headlines summary");
        assert_eq!(headlines.updated, 3);
        assert_eq!(headlines.inserted, 2);

        // The pre-existing rows now hold the first three articles.
        let rows = sync.datastore.rows("HEADLINES");
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].1.title, "headline 0");
        assert_eq!(rows[2].1.title, "headline 2");

        let ops = sync.datastore.ops.lock().unwrap().clone();
        let headline_ops: Vec<&String> =
            ops.iter().filter(|op| op.contains("HEADLINES")).collect();
        assert_eq!(headline_ops.len(), 5);
        assert!(headline_ops[0].starts_with("update"));
        assert!(headline_ops[2].starts_with("update"));
        assert!(headline_ops[3].starts_with("insert"));
    }

    #[tokio::test]
    async fn test_sync_batches_do_not_reorder_rows() {
        let sync = NewsSync::new(
            FixedFeed::new((0..12).map(article).collect()),
            MemoryDatastore::default(),
        );
        sync.run().await.expect("sync should succeed");

        let rows = sync.datastore.rows("SPORTS");
        let titles: Vec<&str> = rows.iter().map(|(_, row)| row.title.as_str()).collect();
        let expected: Vec<String> = (0..12).map(|n| format!("headline {n}")).collect();
        assert_eq!(titles, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sync_fails_when_a_feed_fetch_fails() {
        let mut feed = FixedFeed::new(vec![article(1)]);
        feed.fail_category = Some("SPORTS");

        let sync = NewsSync::new(feed, MemoryDatastore::default());
        let err = sync.run().await.expect_err("sync should fail");
        assert!(matches!(err, Error::NewsFeedError(_)));
    }

    #[tokio::test]
    async fn test_fetch_news_returns_cached_rows() {
        let datastore = MemoryDatastore::with_rows(
            "BUSINESS",
            &[(
                "r1",
                NewsRow {
                    title: "markets up".to_string(),
                    url: "https://example.com/markets".to_string(),
                },
            )],
        );

        let rows = fetch_news(&datastore, "BUSINESS")
            .await
            .expect("fetch should succeed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "markets up");
    }
}
