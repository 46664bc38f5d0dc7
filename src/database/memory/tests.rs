use super::*;
use crate::database::{MAX_UPSERT_BATCH, Metadata, Metric, TEXT_KEY, TYPE_KEY};

fn record(id: &str, vector: Vec<f32>, text: &str) -> IndexRecord {
    let mut metadata = Metadata::new();
    metadata.insert(TEXT_KEY.to_string(), text.to_string());
    metadata.insert(TYPE_KEY.to_string(), "faq".to_string());
    IndexRecord {
        id: id.to_string(),
        embedding: Embedding::new(vector).expect("valid vector"),
        metadata,
    }
}

fn vector(values: &[f32]) -> Embedding {
    Embedding::new(values.to_vec()).expect("valid vector")
}

async fn cosine_index() -> MemoryIndex {
    MemoryCatalog::new()
        .create(&IndexSpec::new("kit", 2, Metric::Cosine))
        .await
        .expect("index should be created")
}

#[tokio::test]
async fn query_orders_by_descending_score() {
    let index = cosine_index().await;
    index
        .upsert(&[
            record("far", vec![0.0, 1.0], "far away"),
            record("near", vec![1.0, 0.1], "close by"),
            record("mid", vec![1.0, 1.0], "somewhere"),
        ])
        .await
        .expect("upsert should succeed");

    let matches = index
        .query(&vector(&[1.0, 0.0]), 3)
        .await
        .expect("query should succeed");

    let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["near", "mid", "far"]);
    assert!(matches[0].score > matches[1].score);
    assert_eq!(matches[0].text(), Some("close by"));
}

#[tokio::test]
async fn query_returns_at_most_top_k() {
    let index = cosine_index().await;
    index
        .upsert(&[
            record("a", vec![1.0, 0.0], "a"),
            record("b", vec![0.0, 1.0], "b"),
        ])
        .await
        .expect("upsert should succeed");

    let matches = index
        .query(&vector(&[1.0, 0.0]), 1)
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 1);

    let matches = index
        .query(&vector(&[1.0, 0.0]), 10)
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 2);
}

#[tokio::test]
async fn ties_keep_insertion_order() {
    let index = cosine_index().await;
    index
        .upsert(&[
            record("first", vec![1.0, 0.0], "one"),
            record("second", vec![2.0, 0.0], "two"),
            record("third", vec![3.0, 0.0], "three"),
        ])
        .await
        .expect("upsert should succeed");

    for _ in 0..3 {
        let matches = index
            .query(&vector(&[1.0, 0.0]), 3)
            .await
            .expect("query should succeed");
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }
}

#[tokio::test]
async fn upsert_replaces_by_id() {
    let index = cosine_index().await;
    index
        .upsert(&[record("faq_0", vec![1.0, 0.0], "old text")])
        .await
        .expect("upsert should succeed");
    index
        .upsert(&[record("faq_0", vec![1.0, 0.0], "new text")])
        .await
        .expect("upsert should succeed");

    assert_eq!(index.count().await.expect("count should succeed"), 1);
    let matches = index
        .query(&vector(&[1.0, 0.0]), 5)
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].text(), Some("new text"));

    let fetched = index
        .fetch("faq_0")
        .await
        .expect("fetch should succeed")
        .expect("record should exist");
    assert_eq!(fetched.text(), Some("new text"));
}

#[tokio::test]
async fn upsert_rejects_wrong_dimension() {
    let index = cosine_index().await;
    let result = index
        .upsert(&[record("bad", vec![1.0, 0.0, 0.0], "three dims")])
        .await;

    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
    assert_eq!(index.count().await.expect("count should succeed"), 0);
}

#[tokio::test]
async fn upsert_rejects_oversized_batch() {
    let index = cosine_index().await;
    let records: Vec<IndexRecord> = (0..=MAX_UPSERT_BATCH)
        .map(|i| record(&format!("r{}", i), vec![1.0, 0.0], "x"))
        .collect();

    let result = index.upsert(&records).await;
    assert!(matches!(result, Err(RagError::InvalidRequest(_))));
}

#[tokio::test]
async fn query_rejects_zero_top_k() {
    let index = cosine_index().await;
    let result = index.query(&vector(&[1.0, 0.0]), 0).await;
    assert!(matches!(result, Err(RagError::InvalidRequest(_))));
}

#[tokio::test]
async fn catalog_lifecycle() {
    let catalog = MemoryCatalog::new();
    let spec = IndexSpec::new("kit", 2, Metric::Cosine);

    assert!(!catalog.exists("kit").await.expect("exists should succeed"));
    assert!(matches!(
        catalog.open("kit").await,
        Err(RagError::IndexNotFound(_))
    ));

    let index = catalog.create(&spec).await.expect("create should succeed");
    index
        .upsert(&[record("a", vec![1.0, 0.0], "a")])
        .await
        .expect("upsert should succeed");

    // Same spec again is a no-op that keeps the data
    let again = catalog.create(&spec).await.expect("create should succeed");
    assert_eq!(again.count().await.expect("count should succeed"), 1);
    assert_eq!(
        catalog.describe("kit").await.expect("describe should succeed"),
        Some(spec.clone())
    );

    // Differing dimension must be explicit
    let wider = IndexSpec::new("kit", 3, Metric::Cosine);
    assert!(matches!(
        catalog.create(&wider).await,
        Err(RagError::IndexConflict(_))
    ));

    let recreated = catalog
        .recreate(&wider)
        .await
        .expect("recreate should succeed");
    assert_eq!(recreated.count().await.expect("count should succeed"), 0);
    assert_eq!(recreated.spec().dimension, 3);

    assert!(catalog.delete("kit").await.expect("delete should succeed"));
    assert!(!catalog.delete("kit").await.expect("delete should succeed"));
}

#[tokio::test]
async fn dot_product_and_euclidean_rank_sensibly() {
    let catalog = MemoryCatalog::new();
    for metric in [Metric::DotProduct, Metric::Euclidean] {
        let index = catalog
            .create(&IndexSpec::new(metric.as_str(), 2, metric))
            .await
            .expect("create should succeed");
        index
            .upsert(&[
                record("close", vec![1.0, 0.0], "close"),
                record("opposite", vec![-1.0, 0.0], "opposite"),
            ])
            .await
            .expect("upsert should succeed");

        let matches = index
            .query(&vector(&[1.0, 0.0]), 2)
            .await
            .expect("query should succeed");
        assert_eq!(matches[0].id, "close", "metric {}", metric);
    }
}
