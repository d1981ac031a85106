//! Integration tests for the Lance-backed store.

use serde_json::json;
use vecfuse_vector::filter::Predicate;
use vecfuse_vector::{
    BackendStore, ClientConfig, Document, FusionOptions, LanceBackend, Metadata, SearchRequest,
    StoredRecord, VectorClient, VectorStoreError,
};

fn record(id: &str, vector: Vec<f32>, content: &str, ext: &str, language: &str) -> StoredRecord {
    let document = Document {
        id: id.to_string(),
        vector,
        content: content.to_string(),
        relative_path: format!("src/{id}{ext}"),
        start_line: 3,
        end_line: 40,
        file_extension: ext.to_string(),
        metadata: {
            let mut metadata = Metadata::new();
            metadata.insert("language".to_string(), json!(language));
            metadata
        },
    };
    StoredRecord::from(&document)
}

fn sorted_ids(hits: &[vecfuse_vector::StoredHit]) -> Vec<String> {
    let mut ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
    ids.sort();
    ids
}

async fn seeded(path: &std::path::Path) -> LanceBackend {
    let backend = LanceBackend::open(path).await.unwrap();
    backend.create_collection("code", 4).await.unwrap();
    backend
        .insert(
            "code",
            &[
                record(
                    "a",
                    vec![1.0, 0.0, 0.0, 0.0],
                    "parse the yaml config file",
                    ".rs",
                    "rust",
                ),
                record(
                    "b",
                    vec![0.0, 1.0, 0.0, 0.0],
                    "render the html template",
                    ".py",
                    "python",
                ),
                record(
                    "c",
                    vec![0.0, 0.0, 2.0, 0.0],
                    "notes about the release process",
                    ".md",
                    "markdown",
                ),
            ],
        )
        .await
        .unwrap();
    backend
}

#[tokio::test]
async fn test_collection_lifecycle() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = LanceBackend::open(temp_dir.path().join("store")).await.unwrap();

    assert!(backend.list_collections().await.unwrap().is_empty());
    backend.create_collection("zeta", 4).await.unwrap();
    backend.create_collection("code", 4).await.unwrap();
    backend.create_collection("code", 4).await.unwrap();
    assert!(backend.has_collection("code").await.unwrap());
    assert_eq!(
        backend.list_collections().await.unwrap(),
        vec!["code".to_string(), "zeta".to_string()]
    );

    backend.drop_collection("code").await.unwrap();
    backend.drop_collection("code").await.unwrap();
    assert!(!backend.has_collection("code").await.unwrap());
    assert_eq!(backend.list_collections().await.unwrap(), vec!["zeta".to_string()]);
}

#[tokio::test]
async fn test_query_round_trips_reserved_and_caller_metadata() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;

    let hits = backend.query("code", None, None).await.unwrap();
    assert_eq!(sorted_ids(&hits), vec!["a", "b", "c"]);

    let a = hits.iter().find(|h| h.id == "a").unwrap();
    assert_eq!(a.content, "parse the yaml config file");
    assert_eq!(a.metadata["relativePath"], json!("src/a.rs"));
    assert_eq!(a.metadata["startLine"], json!(3));
    assert_eq!(a.metadata["endLine"], json!(40));
    assert_eq!(a.metadata["fileExtension"], json!(".rs"));
    assert_eq!(a.metadata["language"], json!("rust"));
    assert!(a.raw_distance.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_query_pushdown_and_post_scan_filters() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;

    let by_extension = Predicate::new_in("fileExtension", [".rs", ".md"]);
    let hits = backend.query("code", Some(&by_extension), None).await.unwrap();
    assert_eq!(sorted_ids(&hits), vec!["a", "c"]);

    let by_language = Predicate::new_in("language", ["python"]);
    let hits = backend.query("code", Some(&by_language), None).await.unwrap();
    assert_eq!(sorted_ids(&hits), vec!["b"]);

    let by_line = Predicate::new_in("startLine", ["3"]);
    let hits = backend.query("code", Some(&by_line), Some(2)).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn test_dense_search_returns_cosine_distance() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;

    let hits = backend
        .search_dense("code", &[0.0, 0.0, 5.0, 0.0], 2, None, &Metadata::new())
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "c");
    assert!(hits[0].raw_distance.abs() < 1e-4);
    assert!((hits[1].raw_distance - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_dense_search_with_post_scan_filter() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;

    let predicate = Predicate::new_in("language", ["python"]);
    let hits = backend
        .search_dense(
            "code",
            &[1.0, 0.0, 0.0, 0.0],
            1,
            Some(&predicate),
            &Metadata::new(),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "b");
}

#[tokio::test]
async fn test_dense_search_rejects_wrong_dimension() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;
    let err = backend
        .search_dense("code", &[1.0, 0.0], 2, None, &Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VectorStoreError::InvalidDimension {
            expected: 4,
            actual: 2
        }
    ));
}

#[tokio::test]
async fn test_lexical_search_finds_matching_chunk() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;

    let hits = backend
        .search_lexical("code", "template", 5, None, &Metadata::new())
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "b");
    assert!(hits[0].raw_distance > 0.0 && hits[0].raw_distance <= 1.0);
}

#[tokio::test]
async fn test_lexical_search_on_empty_collection() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = LanceBackend::open(temp_dir.path()).await.unwrap();
    backend.create_collection("empty", 4).await.unwrap();
    let hits = backend
        .search_lexical("empty", "anything", 5, None, &Metadata::new())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_insert_upserts_by_id() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;

    backend
        .insert(
            "code",
            &[
                record("b", vec![0.0, 1.0, 0.0, 0.0], "render a jinja template", ".py", "python"),
                record("d", vec![0.0, 0.0, 0.0, 1.0], "new chunk", ".go", "go"),
            ],
        )
        .await
        .unwrap();

    let hits = backend.query("code", None, None).await.unwrap();
    assert_eq!(sorted_ids(&hits), vec!["a", "b", "c", "d"]);
    let b = hits.iter().find(|h| h.id == "b").unwrap();
    assert_eq!(b.content, "render a jinja template");
}

#[tokio::test]
async fn test_insert_rejects_wrong_dimension() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;
    let err = backend
        .insert("code", &[record("x", vec![1.0], "short", ".rs", "rust")])
        .await
        .unwrap_err();
    assert!(matches!(err, VectorStoreError::InvalidDimension { .. }));
}

#[tokio::test]
async fn test_delete_by_id() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = seeded(temp_dir.path()).await;
    backend
        .delete("code", &["a".to_string(), "ghost".to_string()])
        .await
        .unwrap();
    let hits = backend.query("code", None, None).await.unwrap();
    assert_eq!(sorted_ids(&hits), vec!["b", "c"]);
}

#[tokio::test]
async fn test_reopen_reads_persisted_rows() {
    let temp_dir = tempfile::tempdir().unwrap();
    drop(seeded(temp_dir.path()).await);

    let reopened = LanceBackend::open(temp_dir.path()).await.unwrap();
    let hits = reopened.query("code", None, None).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn test_missing_collection() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = LanceBackend::open(temp_dir.path()).await.unwrap();
    let err = backend.query("nowhere", None, None).await.unwrap_err();
    assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
}

#[tokio::test]
async fn test_client_hybrid_search_over_lance() {
    let temp_dir = tempfile::tempdir().unwrap();
    let client = VectorClient::new(ClientConfig::lance(temp_dir.path().join("db"), 4))
        .unwrap()
        .connect()
        .await
        .unwrap();
    client.create_collection("code").await.unwrap();
    client
        .insert(
            "code",
            &[
                Document {
                    id: "a".to_string(),
                    vector: vec![1.0, 0.0, 0.0, 0.0],
                    content: "parse the yaml config file".to_string(),
                    relative_path: "src/a.rs".to_string(),
                    file_extension: ".rs".to_string(),
                    ..Document::default()
                },
                Document {
                    id: "b".to_string(),
                    vector: vec![0.0, 1.0, 0.0, 0.0],
                    content: "render the html template".to_string(),
                    relative_path: "src/b.py".to_string(),
                    file_extension: ".py".to_string(),
                    ..Document::default()
                },
            ],
        )
        .await
        .unwrap();

    let requests = [
        SearchRequest::dense(vec![1.0, 0.0, 0.0, 0.0], 5),
        SearchRequest::lexical("config", 5),
    ];
    let options = FusionOptions::new(5).with_filter(r#"fileExtension in [".rs"]"#);
    let results = client
        .hybrid_search("code", &requests, &options)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.id, "a");
    assert_eq!(results[0].document.relative_path, "src/a.rs");
    assert!(results[0].score > 0.5 && results[0].score <= 1.0);
}

#[tokio::test]
async fn test_lexical_filter_keeps_lower_ranked_match() {
    let temp_dir = tempfile::tempdir().unwrap();
    let backend = LanceBackend::open(temp_dir.path()).await.unwrap();
    backend.create_collection("code", 4).await.unwrap();
    backend
        .insert(
            "code",
            &[
                record(
                    "py1",
                    vec![1.0, 0.0, 0.0, 0.0],
                    "template template template",
                    ".py",
                    "python",
                ),
                record(
                    "py2",
                    vec![0.0, 1.0, 0.0, 0.0],
                    "template template render",
                    ".py",
                    "python",
                ),
                record(
                    "rs1",
                    vec![0.0, 0.0, 1.0, 0.0],
                    "a long chunk that mentions the template once among many other words",
                    ".rs",
                    "rust",
                ),
            ],
        )
        .await
        .unwrap();

    let predicate = Predicate::new_in("fileExtension", [".rs"]);
    let hits = backend
        .search_lexical("code", "template", 2, Some(&predicate), &Metadata::new())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "rs1");
    assert_eq!(hits[0].metadata["fileExtension"], json!(".rs"));
}
