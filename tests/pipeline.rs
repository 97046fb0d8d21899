//! End-to-end pipeline tests against a throwaway SQLite database: seed the
//! read-model tables, run the query/assembly stages, and check the shapes
//! the handlers would serialize.

use std::time::{SystemTime, UNIX_EPOCH};

use pulsemetrics::cube::{signal_series, Cube, FlatCube};
use pulsemetrics::dates::DateRange;
use pulsemetrics::db::Database;
use pulsemetrics::query::{Dimension, GroupingSelection, QuerySpecBuilder, Rollup};
use pulsemetrics::taxonomy::SignalTaxonomy;

async fn test_db(tag: &str) -> Database {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("pulsemetrics_{}_{}.db", tag, nanos));
    Database::new(path.to_str().expect("temp path is valid utf-8"))
        .await
        .expect("failed to create test database")
}

async fn seed_count(db: &Database, published_at: &str, source: &str, category: &str, count: i64) {
    sqlx::query(
        "INSERT INTO article_counts_daily (published_at, article_source, article_category, article_count) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(published_at)
    .bind(source)
    .bind(category)
    .bind(count)
    .execute(db.pool())
    .await
    .expect("seed failed");
}

#[tokio::test]
async fn daily_counts_fill_and_merge() {
    let db = test_db("counts").await;
    let taxonomy = SignalTaxonomy::default();

    seed_count(&db, "2024-01-01 08:00:00", "reuters", "politics", 3).await;
    seed_count(&db, "2024-01-01 19:30:00", "reuters", "politics", 2).await;
    seed_count(&db, "2024-01-03 11:00:00", "ap", "politics", 7).await;

    let range = DateRange::resolve("2024-01-01", "2024-01-03").unwrap();
    let sources = vec!["reuters".to_string(), "ap".to_string()];
    let grouping = GroupingSelection {
        by_primary: true,
        by_secondary: false,
    };

    let spec = QuerySpecBuilder::new("article_counts_daily", "SUM(article_count)", &range, &taxonomy)
        .filter(Dimension::ArticleSource, &sources)
        .unwrap()
        .group_by(grouping, Dimension::ArticleSource, Dimension::ArticleCategory)
        .build();

    let rows = db.fetch_count_rows(&spec).await.unwrap();
    assert_eq!(rows.len(), 2);

    let mut cube = Cube::build_empty(&[sources.clone()], &range.buckets, &0.0);
    for row in &rows {
        assert!(cube.merge_row(row));
    }

    match cube.flatten() {
        FlatCube::Groups(nodes) => {
            assert_eq!(nodes[0].id, "ap");
            assert_eq!(nodes[0].cube, FlatCube::Series(vec![0.0, 0.0, 7.0]));
            assert_eq!(nodes[1].id, "reuters");
            // Same-day rows aggregate in the store, not in the cube.
            assert_eq!(nodes[1].cube, FlatCube::Series(vec![5.0, 0.0, 0.0]));
        }
        FlatCube::Series(_) => panic!("expected grouping by source"),
    }
}

#[tokio::test]
async fn signal_blobs_roll_up_per_type() {
    let db = test_db("signals").await;
    let taxonomy = SignalTaxonomy::default();

    for (signal_type, value) in [("101", 4.0), ("102", 1.5)] {
        sqlx::query(
            "INSERT INTO article_signals_daily \
             (published_at, article_source, article_category, signal_source, signal_type, value) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind("2024-02-01 09:00:00")
        .bind("reuters")
        .bind("politics")
        .bind("100")
        .bind(signal_type)
        .bind(value)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let range = DateRange::resolve("2024-02-01", "2024-02-02").unwrap();
    let selection = taxonomy.resolve(None, None);

    let spec = QuerySpecBuilder::new("article_signals_daily", "SUM(value)", &range, &taxonomy)
        .filter(Dimension::SignalSource, &selection.sources)
        .unwrap()
        .filter(Dimension::SignalType, &selection.types)
        .unwrap()
        .rollup(Rollup::SignalBlob)
        .build();

    let rows = db.fetch_blob_rows(&spec).await.unwrap();
    assert_eq!(rows.len(), 1);

    let mut cube = Cube::build_empty(&[], &range.buckets, &"{}".to_string());
    for row in &rows {
        assert!(cube.merge_row(row));
    }

    let blobs = match cube.flatten() {
        FlatCube::Series(series) => series,
        FlatCube::Groups(_) => panic!("expected an ungrouped cube"),
    };
    assert_eq!(blobs.len(), 2);

    let series = signal_series(&blobs, &selection.types);
    let s101 = series.iter().find(|s| s.id == "101").unwrap();
    assert_eq!(s101.data, vec![4.0, 0.0]);
    let s102 = series.iter().find(|s| s.id == "102").unwrap();
    assert_eq!(s102.data, vec![1.5, 0.0]);
    // Types with no rows at all still flatten to zero-filled series.
    let s201 = series.iter().find(|s| s.id == "201").unwrap();
    assert_eq!(s201.data, vec![0.0, 0.0]);
}

#[tokio::test]
async fn summed_rollup_collapses_signal_types() {
    let db = test_db("trend_rollup").await;
    let taxonomy = SignalTaxonomy::default();

    for (signal_type, value) in [("101", 4.0), ("102", 6.0)] {
        sqlx::query(
            "INSERT INTO tweet_signals_daily \
             (published_at, tweet_type, tweet_category, signal_source, signal_type, value) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind("2024-02-01 09:00:00")
        .bind("retweet")
        .bind("sports")
        .bind("100")
        .bind(signal_type)
        .bind(value)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let range = DateRange::resolve("2024-02-01", "2024-02-01").unwrap();
    let categories = vec!["sports".to_string()];
    let grouping = GroupingSelection {
        by_primary: false,
        by_secondary: true,
    };

    let spec = QuerySpecBuilder::new("tweet_signals_daily", "SUM(value)", &range, &taxonomy)
        .filter(Dimension::TweetCategory, &categories)
        .unwrap()
        .group_by(grouping, Dimension::TweetType, Dimension::TweetCategory)
        .rollup(Rollup::SignalSum)
        .build();

    let rows = db.fetch_count_rows(&spec).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].keys, vec!["sports".to_string()]);
    assert_eq!(rows[0].value, 10.0);
}

#[tokio::test]
async fn top_words_scores_and_cleans_up() {
    let db = test_db("topwords").await;

    // 2-day range; "budget" appears often enough to clear the floor,
    // "flurry" does not.
    for (published_at, word, count) in [
        ("2024-03-01 08:00:00", "budget", 5),
        ("2024-03-02 08:00:00", "budget", 4),
        ("2024-03-01 08:00:00", "flurry", 1),
    ] {
        sqlx::query(
            "INSERT INTO article_top_words_daily \
             (published_at, article_source, article_category, word, word_count) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(published_at)
        .bind("reuters")
        .bind("politics")
        .bind(word)
        .bind(count)
        .execute(db.pool())
        .await
        .unwrap();
    }

    sqlx::query("INSERT INTO article_document_frequencies (term, df) VALUES ('budget', 10)")
        .execute(db.pool())
        .await
        .unwrap();

    for id in 0..100 {
        sqlx::query("INSERT INTO articles (id, url) VALUES (?, ?)")
            .bind(id)
            .bind(format!("https://example.com/{}", id))
            .execute(db.pool())
            .await
            .unwrap();
    }

    let range = DateRange::resolve("2024-03-01", "2024-03-02").unwrap();
    let words = db.top_words(&range, &[], 100).await.unwrap();

    assert_eq!(words.len(), 1);
    assert_eq!(words[0].term, "budget");
    // tf = 9 / 2 distinct terms, score = tf * ln(100/10).
    assert!((words[0].score - 4.5 * (100.0f64 / 10.0).ln()).abs() < 1e-9);

    // The request-scoped scratch table must be gone.
    let leftovers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master \
         WHERE type = 'table' AND name LIKE 'term_frequencies_scratch_%'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn top_words_cleans_up_when_join_fails() {
    let db = test_db("topwords_fail").await;

    sqlx::query(
        "INSERT INTO article_top_words_daily \
         (published_at, article_source, article_category, word, word_count) \
         VALUES ('2024-03-01 08:00:00', 'reuters', 'politics', 'budget', 5)",
    )
    .execute(db.pool())
    .await
    .unwrap();

    // Break the join target so the pipeline fails after the scratch table
    // has been created.
    sqlx::query("DROP TABLE article_document_frequencies")
        .execute(db.pool())
        .await
        .unwrap();

    let range = DateRange::resolve("2024-03-01", "2024-03-01").unwrap();
    let result = db.top_words(&range, &[], 100).await;
    assert!(result.is_err());

    let leftovers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master \
         WHERE type = 'table' AND name LIKE 'term_frequencies_scratch_%'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn top_articles_rank_by_signal_value() {
    let db = test_db("ranking").await;

    for (id, url, headline) in [
        (1, "https://example.com/a", "A"),
        (2, "https://example.com/b", "B"),
    ] {
        sqlx::query("INSERT INTO articles (id, url, headline) VALUES (?, ?, ?)")
            .bind(id)
            .bind(url)
            .bind(headline)
            .execute(db.pool())
            .await
            .unwrap();
    }

    for (item_id, value) in [(1i64, 50.0), (2i64, 200.0)] {
        sqlx::query(
            "INSERT INTO article_rankings \
             (published_at, article_source, article_category, item_id, signal_type, signal_value) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind("2024-04-02 10:00:00")
        .bind("reuters")
        .bind("politics")
        .bind(item_id)
        .bind("101")
        .bind(value)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let range = DateRange::resolve("2024-04-01", "2024-04-03").unwrap();
    let ranked = db.fetch_top_articles(&range, &[], "101", 10).await.unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].article_id, 2);
    assert_eq!(ranked[0].signal_value, 200.0);
    assert_eq!(ranked[1].article_id, 1);
}

#[tokio::test]
async fn page_signals_group_by_type() {
    let db = test_db("pages").await;
    let taxonomy = SignalTaxonomy::default();

    for (url_id, signal_source, signal_type, value) in [
        ("abc123", "100", "101", 12.0),
        ("abc123", "200", "201", 3.0),
        ("def456", "100", "101", 1.0),
    ] {
        sqlx::query(
            "INSERT INTO page_signals (url_id, signal_source, signal_type, value) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(url_id)
        .bind(signal_source)
        .bind(signal_type)
        .bind(value)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let url_ids = vec!["abc123".to_string(), "def456".to_string()];
    let selection = taxonomy.resolve(None, None);
    let filters = vec![pulsemetrics::query::DimensionFilter::new(
        Dimension::SignalType,
        &selection.types,
        &taxonomy,
    )
    .unwrap()
    .unwrap()];

    let rows = db
        .fetch_page_signal_rows(&url_ids, &filters, false, true)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    let abc_101 = rows
        .iter()
        .find(|r| r.url_id == "abc123" && r.signal_type.as_deref() == Some("101"))
        .unwrap();
    assert_eq!(abc_101.value, 12.0);
}
