#[cfg(test)]
mod tests {
    use crate::{TEST_DATASET, TEST_PROJECT, fake::FakeWarehouse, test_config, test_storage};
    use chrono::NaiveDate;
    use connectors::{
        error::StorageError,
        warehouse::{
            job::JobPollPolicy,
            native::{DatasetRef, Mode, NativeField, NativeSchema, NativeTable, NativeType},
            storage::{Storage, WriteReport},
        },
    };
    use model::{
        core::{data_type::FieldType, value::Value},
        error::SchemaError,
        records::row::Row,
        schema::descriptor::{Descriptor, Field},
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use tracing_test::traced_test;

    fn dataset() -> DatasetRef {
        DatasetRef::new(TEST_PROJECT, TEST_DATASET)
    }

    fn people() -> Descriptor {
        Descriptor::from_json(json!({
            "fields": [
                {"name": "id", "type": "integer", "constraints": {"required": true}},
                {"name": "name", "type": "string"}
            ]
        }))
        .unwrap()
    }

    fn person(id: i64, name: &str) -> Row {
        vec![Value::Integer(id), Value::String(name.to_string())]
    }

    fn numbered(count: usize) -> Vec<Row> {
        (0..count).map(|i| person(i as i64, "x")).collect()
    }

    // Scenario: create a bucket, load two rows, read them back.
    // Expected Outcome: rows come back typed and sorted by the first column.
    #[traced_test]
    #[tokio::test]
    async fn test_create_write_read_round_trip() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");

        storage.create("people", people(), false).await.unwrap();
        let report = storage
            .write("people", vec![person(2, "b"), person(1, "a")])
            .await
            .unwrap();

        assert_eq!(report, WriteReport { rows: 2, jobs: 1 });
        assert_eq!(
            storage.read("people").await.unwrap(),
            vec![person(1, "a"), person(2, "b")]
        );
        assert!(logs_contain("Created table people"));
    }

    // Scenario: rows whose first column is nullable are loaded out of order.
    // Expected Outcome: read orders them by the first column's text with nulls last.
    #[traced_test]
    #[tokio::test]
    async fn test_read_sorts_nulls_last() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        let descriptor = Descriptor::new(vec![
            Field::new("name", FieldType::String),
            Field::new("id", FieldType::Integer),
        ]);
        let row = |name: Value, id: i64| vec![name, Value::Integer(id)];

        storage.create("named", descriptor, false).await.unwrap();
        storage
            .write(
                "named",
                vec![
                    row(Value::Null, 1),
                    row(Value::String("b".into()), 2),
                    row(Value::String("a".into()), 3),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            storage.read("named").await.unwrap(),
            vec![
                row(Value::String("a".into()), 3),
                row(Value::String("b".into()), 2),
                row(Value::Null, 1),
            ]
        );
    }

    // Scenario: a storage over a fresh client describes a bucket it did not create.
    // Expected Outcome: the descriptor is restored from the native schema; `constraints`
    // only appears on required fields.
    #[traced_test]
    #[tokio::test]
    async fn test_describe_restores_from_native_schema() {
        let warehouse = Arc::new(FakeWarehouse::new());
        test_storage(&warehouse, "")
            .create("people", people(), false)
            .await
            .unwrap();

        let mut fresh = test_storage(&warehouse, "");
        let restored = fresh.describe("people", None).await.unwrap();

        assert_eq!(
            restored.to_json(),
            json!({
                "fields": [
                    {"name": "id", "type": "integer", "constraints": {"required": true}},
                    {"name": "name", "type": "string"}
                ]
            })
        );
    }

    // Scenario: an array field is written as serialized text.
    // Expected Outcome: with the original descriptor forced, reading recovers the
    // structured value; without it the field describes as string.
    #[traced_test]
    #[tokio::test]
    async fn test_fallback_round_trip() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let original = Descriptor::new(vec![
            Field::new("tags", FieldType::Array),
            Field::new("meta", FieldType::Object),
        ]);

        let mut storage = test_storage(&warehouse, "");
        storage.create("docs", original.clone(), false).await.unwrap();
        storage
            .write(
                "docs",
                vec![vec![
                    Value::Json(json!([{"a": 1}])),
                    Value::Json(json!({"a": 1})),
                ]],
            )
            .await
            .unwrap();

        let mut fresh = test_storage(&warehouse, "");
        let described = fresh.describe("docs", None).await.unwrap();
        assert_eq!(described.fields[0].field_type, FieldType::String);
        assert_eq!(
            fresh.read("docs").await.unwrap(),
            vec![vec![
                Value::String(r#"[{"a":1}]"#.into()),
                Value::String(r#"{"a":1}"#.into()),
            ]]
        );

        fresh.describe("docs", Some(original)).await.unwrap();
        assert_eq!(
            fresh.read("docs").await.unwrap(),
            vec![vec![
                Value::Json(json!([{"a": 1}])),
                Value::Json(json!({"a": 1})),
            ]]
        );
    }

    // Scenario: forcing a descriptor with fallback fields onto a bucket that was
    // described from its native schema.
    // Expected Outcome: later writes serialize the fallback field instead of casting it.
    #[traced_test]
    #[tokio::test]
    async fn test_forced_descriptor_drives_fallbacks_on_write() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let original = Descriptor::new(vec![Field::new("point", FieldType::Geopoint)]);
        test_storage(&warehouse, "")
            .create("places", original.clone(), false)
            .await
            .unwrap();

        let mut fresh = test_storage(&warehouse, "");
        fresh.describe("places", Some(original)).await.unwrap();
        fresh
            .write(
                "places",
                vec![vec![Value::GeoPoint {
                    lon: 30.0,
                    lat: 50.5,
                }]],
            )
            .await
            .unwrap();

        assert_eq!(
            warehouse.stored_rows(&dataset(), "places"),
            vec![vec![Some("30, 50.5".to_string())]]
        );
        assert_eq!(
            fresh.read("places").await.unwrap(),
            vec![vec![Value::GeoPoint {
                lon: 30.0,
                lat: 50.5
            }]]
        );
    }

    // Scenario: temporal, boolean, number and year values through a load and a read.
    // Expected Outcome: values survive the trip, including the warehouse's own
    // datetime text form.
    #[traced_test]
    #[tokio::test]
    async fn test_typed_values_round_trip() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        let descriptor = Descriptor::new(vec![
            Field::new("on", FieldType::Date),
            Field::new("at", FieldType::Datetime),
            Field::new("ok", FieldType::Boolean),
            Field::new("score", FieldType::Number),
            Field::new("founded", FieldType::Year),
        ]);

        let date = NaiveDate::from_ymd_opt(2017, 1, 24).unwrap();
        let datetime = date.and_hms_opt(10, 30, 0).unwrap();

        storage.create("events", descriptor, false).await.unwrap();
        storage
            .write(
                "events",
                vec![vec![
                    Value::String("2017-01-24".into()),
                    Value::Datetime(datetime),
                    Value::String("TRUE".into()),
                    Value::String("1.5".into()),
                    Value::Integer(2017),
                ]],
            )
            .await
            .unwrap();

        assert_eq!(
            warehouse.stored_rows(&dataset(), "events"),
            vec![vec![
                Some("2017-01-24".to_string()),
                Some("2017-01-24T10:30:00".to_string()),
                Some("true".to_string()),
                Some("1.5".to_string()),
                Some("2017".to_string()),
            ]]
        );

        let rows = storage.read("events").await.unwrap();
        assert_eq!(rows[0][0], Value::Date(date));
        assert_eq!(rows[0][1], Value::Datetime(datetime));
        assert_eq!(rows[0][2], Value::Boolean(true));
        assert_eq!(rows[0][3].to_string(), "1.5");
        assert_eq!(rows[0][4], Value::Year(2017));
    }

    // Scenario: writes of exactly one chunk and of one chunk plus a row.
    // Expected Outcome: one job for 10,000 rows; two jobs (10,000 and 1) for 10,001.
    #[traced_test]
    #[tokio::test]
    async fn test_chunk_boundary() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("exact", people(), false).await.unwrap();
        storage.create("over", people(), false).await.unwrap();

        let exact = storage.write("exact", numbered(10_000)).await.unwrap();
        assert_eq!(exact, WriteReport { rows: 10_000, jobs: 1 });
        assert_eq!(warehouse.load_jobs(), vec![10_000]);

        let over = storage.write("over", numbered(10_001)).await.unwrap();
        assert_eq!(over, WriteReport { rows: 10_001, jobs: 2 });
        assert_eq!(warehouse.load_jobs(), vec![10_000, 10_000, 1]);
        assert_eq!(warehouse.stored_rows(&dataset(), "over").len(), 10_001);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_configured_chunk_size() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage =
            Storage::new(warehouse.clone(), test_config("").with_chunk_size(2)).unwrap();
        storage.create("people", people(), false).await.unwrap();

        let report = storage.write("people", numbered(5)).await.unwrap();

        assert_eq!(report, WriteReport { rows: 5, jobs: 3 });
        assert_eq!(warehouse.load_jobs(), vec![2, 2, 1]);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_empty_write_submits_nothing() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("people", people(), false).await.unwrap();

        let report = storage.write("people", Vec::<Row>::new()).await.unwrap();

        assert_eq!(report, WriteReport::default());
        assert!(warehouse.load_jobs().is_empty());
    }

    // Scenario: two storages share a dataset with different prefixes.
    // Expected Outcome: neither sees the other's buckets, and unprefixed tables
    // are hidden from both.
    #[traced_test]
    #[tokio::test]
    async fn test_prefix_isolation() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut first = test_storage(&warehouse, "first_");
        let mut second = test_storage(&warehouse, "second_");
        warehouse.put_table(
            &dataset(),
            NativeTable {
                name: "unrelated".into(),
                schema: NativeSchema { fields: Vec::new() },
            },
        );

        first.create("people", people(), false).await.unwrap();
        second.create("orders", people(), false).await.unwrap();

        assert_eq!(first.buckets().await.unwrap(), ["people".to_string()]);
        assert_eq!(second.buckets().await.unwrap(), ["orders".to_string()]);
        assert!(!first.check("orders").await.unwrap());
        assert_eq!(
            warehouse.table_names(&dataset()),
            vec!["unrelated", "first_people", "second_orders"]
        );
    }

    // Scenario: deleting a bucket that does not exist.
    // Expected Outcome: an error without `ignore`; with it, a no-op.
    #[traced_test]
    #[tokio::test]
    async fn test_delete_missing_bucket() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("people", people(), false).await.unwrap();

        assert!(matches!(
            storage.delete("missing", false).await,
            Err(StorageError::BucketNotFound(bucket)) if bucket == "missing"
        ));

        storage.delete("missing", true).await.unwrap();
        assert_eq!(storage.buckets().await.unwrap(), ["people".to_string()]);
    }

    // Scenario: a batch delete with `ignore` names a missing bucket in the middle.
    // Expected Outcome: the missing bucket is skipped and the rest are deleted.
    #[traced_test]
    #[tokio::test]
    async fn test_delete_many_ignore_continues() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage
            .create_many([("a", people()), ("b", people()), ("c", people())], false)
            .await
            .unwrap();

        storage.delete_many(["a", "missing", "c"], true).await.unwrap();

        assert_eq!(storage.buckets().await.unwrap(), ["b".to_string()]);
        assert!(logs_contain("Deleted table c"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_delete_all_only_touches_own_prefix() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut mine = test_storage(&warehouse, "mine_");
        let mut theirs = test_storage(&warehouse, "theirs_");
        mine.create_many([("a", people()), ("b", people())], false)
            .await
            .unwrap();
        theirs.create("c", people(), false).await.unwrap();

        mine.delete_all(false).await.unwrap();

        assert!(mine.buckets().await.unwrap().is_empty());
        assert_eq!(warehouse.table_names(&dataset()), vec!["theirs_c"]);
        assert!(mine.describe("a", None).await.is_err());
    }

    // Scenario: creating a bucket that already exists, with and without `force`.
    // Expected Outcome: an error without force; with force the table is replaced.
    #[traced_test]
    #[tokio::test]
    async fn test_create_existing_bucket() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("people", people(), false).await.unwrap();
        storage.write("people", vec![person(1, "a")]).await.unwrap();

        assert!(matches!(
            storage.create("people", people(), false).await,
            Err(StorageError::BucketExists(bucket)) if bucket == "people"
        ));

        let replacement = Descriptor::new(vec![Field::new("label", FieldType::String)]);
        storage.create("people", replacement.clone(), true).await.unwrap();

        assert!(warehouse.stored_rows(&dataset(), "people").is_empty());
        assert_eq!(storage.describe("people", None).await.unwrap(), replacement);
        assert_eq!(
            warehouse.schema(&dataset(), "people").unwrap().fields,
            vec![NativeField {
                name: "label".into(),
                field_type: NativeType::String,
                mode: Mode::Nullable,
            }]
        );
    }

    // Scenario: the second bucket of a batch create already exists.
    // Expected Outcome: the first bucket stays created; the third is never attempted.
    #[traced_test]
    #[tokio::test]
    async fn test_create_many_is_not_transactional() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("b", people(), false).await.unwrap();

        let result = storage
            .create_many([("a", people()), ("b", people()), ("c", people())], false)
            .await;

        assert!(matches!(result, Err(StorageError::BucketExists(bucket)) if bucket == "b"));
        let mut buckets = storage.buckets().await.unwrap().to_vec();
        buckets.sort();
        assert_eq!(buckets, vec!["a", "b"]);
    }

    // Scenario: one descriptor in a batch is invalid.
    // Expected Outcome: nothing is created.
    #[traced_test]
    #[tokio::test]
    async fn test_create_many_validates_before_creating() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        let clashing = Descriptor::new(vec![
            Field::new("first name", FieldType::String),
            Field::new("First-Name", FieldType::String),
        ]);

        let result = storage
            .create_many([("a", people()), ("b", clashing)], false)
            .await;

        assert!(matches!(result, Err(StorageError::DuplicateColumn { .. })));
        assert!(warehouse.table_names(&dataset()).is_empty());

        let empty = storage.create("c", Descriptor::new(Vec::new()), false).await;
        assert!(matches!(
            empty,
            Err(StorageError::Schema(SchemaError::InvalidDescriptor(_)))
        ));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_unknown_bucket_is_not_found() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");

        assert!(matches!(
            storage.write("ghost", vec![person(1, "a")]).await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(matches!(
            storage.read("ghost").await,
            Err(StorageError::BucketNotFound(_))
        ));
        assert!(matches!(
            storage.describe("ghost", None).await,
            Err(StorageError::BucketNotFound(_))
        ));
    }

    // Scenario: rows that do not fit the descriptor.
    // Expected Outcome: the write fails before anything is submitted.
    #[traced_test]
    #[tokio::test]
    async fn test_invalid_rows_are_rejected_before_loading() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("people", people(), false).await.unwrap();

        assert!(matches!(
            storage.write("people", vec![vec![Value::Integer(1)]]).await,
            Err(StorageError::Schema(SchemaError::RowLength {
                expected: 2,
                actual: 1
            }))
        ));
        assert!(matches!(
            storage
                .write("people", vec![vec![Value::Null, "a".into()]])
                .await,
            Err(StorageError::Schema(SchemaError::RequiredMissing { .. }))
        ));
        assert!(matches!(
            storage
                .write("people", vec![vec!["one".into(), "a".into()]])
                .await,
            Err(StorageError::Schema(SchemaError::Cast { .. }))
        ));
        assert!(warehouse.load_jobs().is_empty());
    }

    // Scenario: the warehouse reports errors for a load job.
    // Expected Outcome: the write fails with every message joined by newlines and
    // chunks loaded before the failure stay loaded.
    #[traced_test]
    #[tokio::test]
    async fn test_load_job_errors_surface() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage =
            Storage::new(warehouse.clone(), test_config("").with_chunk_size(2)).unwrap();
        storage.create("people", people(), false).await.unwrap();

        storage.write("people", numbered(2)).await.unwrap();
        warehouse.fail_next_job(&["Too many errors", "Quota exceeded"]);

        let result = storage.write("people", numbered(4)).await;

        assert!(matches!(
            result,
            Err(StorageError::LoadJob(message)) if message == "Too many errors\nQuota exceeded"
        ));
        assert_eq!(warehouse.load_jobs(), vec![2, 2]);
        assert_eq!(warehouse.stored_rows(&dataset(), "people").len(), 2);
        assert!(logs_contain("finished with 2 error(s)"));
    }

    // Scenario: a job stays running for a few polls.
    // Expected Outcome: the storage keeps polling until it is done.
    #[traced_test]
    #[tokio::test]
    async fn test_pending_job_is_polled_until_done() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let mut storage = test_storage(&warehouse, "");
        storage.create("people", people(), false).await.unwrap();
        warehouse.set_pending_polls(3);

        storage.write("people", vec![person(1, "a")]).await.unwrap();

        assert_eq!(warehouse.polls(), 4);
        assert_eq!(storage.read("people").await.unwrap(), vec![person(1, "a")]);
    }

    // Scenario: a job never finishes under a bounded poll policy.
    // Expected Outcome: the write fails with a timeout naming the job.
    #[traced_test]
    #[tokio::test]
    async fn test_bounded_poll_times_out() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let policy = JobPollPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(4),
            Some(Duration::from_millis(20)),
        );
        let mut storage =
            Storage::new(warehouse.clone(), test_config("").with_poll(policy)).unwrap();
        storage.create("people", people(), false).await.unwrap();
        warehouse.set_pending_polls(usize::MAX);

        let result = storage.write("people", vec![person(1, "a")]).await;

        assert!(matches!(
            result,
            Err(StorageError::LoadJobTimeout { job, .. }) if job.job_id == "job_1"
        ));
        assert!(warehouse.polls() > 1);
        assert!(warehouse.stored_rows(&dataset(), "people").is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_describe_rejects_unsupported_native_columns() {
        let warehouse = Arc::new(FakeWarehouse::new());
        warehouse.put_table(
            &dataset(),
            NativeTable {
                name: "ledger".into(),
                schema: NativeSchema {
                    fields: vec![NativeField {
                        name: "amount".into(),
                        field_type: NativeType::Numeric,
                        mode: Mode::Nullable,
                    }],
                },
            },
        );

        let mut storage = test_storage(&warehouse, "");
        assert!(storage.check("ledger").await.unwrap());
        assert!(matches!(
            storage.describe("ledger", None).await,
            Err(StorageError::UnsupportedType(name)) if name == "NUMERIC"
        ));
    }

    #[test]
    fn test_storage_display() {
        let warehouse = Arc::new(FakeWarehouse::new());
        let storage = test_storage(&warehouse, "prefix_");
        assert_eq!(storage.to_string(), "Storage <project-dataset>");
    }
}
