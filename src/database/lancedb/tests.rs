use super::*;

fn record(id: &str, vector: Vec<f32>, text: &str) -> IndexRecord {
    let mut metadata = Metadata::new();
    metadata.insert(crate::database::TEXT_KEY.to_string(), text.to_string());
    IndexRecord {
        id: id.to_string(),
        embedding: Embedding::new(vector).expect("valid vector"),
        metadata,
    }
}

#[test]
fn schema_round_trips_spec() {
    let spec = IndexSpec::new("kit", 4, Metric::Euclidean);
    let schema = create_schema(&spec).expect("dimension fits");

    assert_eq!(schema.fields().len(), 3);
    let (recovered, metric_recorded) =
        spec_from_schema("kit", &schema).expect("schema should describe the index");
    assert_eq!(recovered, spec);
    assert!(metric_recorded);
}

#[test]
fn oversized_dimension_is_rejected() {
    let spec = IndexSpec::new("huge", i32::MAX as usize + 1, Metric::Cosine);
    assert!(matches!(
        create_schema(&spec),
        Err(RagError::InvalidRequest(_))
    ));
    assert!(matches!(
        create_record_batch(&spec, &[]),
        Err(RagError::InvalidRequest(_))
    ));
}

#[test]
fn schema_without_metric_defaults_to_cosine() {
    let schema = Schema::new(vec![Field::new(
        VECTOR_COLUMN,
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), 8),
        false,
    )]);

    let (spec, metric_recorded) = spec_from_schema("legacy", &schema).expect("valid schema");
    assert_eq!(spec.dimension, 8);
    assert_eq!(spec.metric, Metric::Cosine);
    assert!(!metric_recorded);
}

#[test]
fn schema_without_vector_column_is_rejected() {
    let schema = Schema::new(vec![Field::new(ID_COLUMN, DataType::Utf8, false)]);
    assert!(matches!(
        spec_from_schema("broken", &schema),
        Err(RagError::IndexUnavailable(_))
    ));
}

#[test]
fn dedupe_keeps_last_occurrence() {
    let records = vec![
        record("a", vec![1.0, 0.0], "first a"),
        record("b", vec![0.0, 1.0], "b"),
        record("a", vec![1.0, 1.0], "second a"),
    ];

    let unique = dedupe_last(&records);
    let texts: Vec<_> = unique.iter().map(|r| r.text()).collect();
    assert_eq!(texts, [Some("b"), Some("second a")]);
}

#[test]
fn record_batch_converts_back_to_records() {
    let spec = IndexSpec::new("kit", 2, Metric::Cosine);
    let records = [
        record("faq_0", vec![0.5, 0.25], "SageMaker Canvas costs depend on usage."),
        record("faq_1", vec![1.0, -1.0], "It's quoted"),
    ];
    let refs: Vec<&IndexRecord> = records.iter().collect();

    let batch = create_record_batch(&spec, &refs).expect("batch should build");
    assert_eq!(batch.num_rows(), 2);

    let parsed = parse_record_batch(&batch).expect("batch should parse");
    assert_eq!(parsed, records);
}

#[test]
fn corrupt_metadata_is_reported() {
    assert!(matches!(
        parse_metadata("not json"),
        Err(RagError::IndexUnavailable(_))
    ));
}

#[test]
fn distances_become_similarities() {
    assert!((score_from_distance(Metric::Cosine, 0.25) - 0.75).abs() < 1e-6);
    assert!((score_from_distance(Metric::DotProduct, -2.0) - 3.0).abs() < 1e-6);
    assert_eq!(score_from_distance(Metric::Euclidean, 4.0), -4.0);

    // Smaller distance must always rank higher
    for metric in [Metric::Cosine, Metric::Euclidean, Metric::DotProduct] {
        assert!(score_from_distance(metric, 0.1) > score_from_distance(metric, 0.9));
    }
}

#[test]
fn literals_escape_quotes() {
    assert_eq!(quote_literal("faq_0"), "'faq_0'");
    assert_eq!(quote_literal("o'brien"), "'o''brien'");
}
