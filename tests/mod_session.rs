use bson::{Document, doc};
use nexusquery::client::{Client, DocumentStore};
use nexusquery::config::ClientConfig;
use nexusquery::errors::DbError;
use nexusquery::query::{DeleteReport, Filter, UpdateReport, pipe_unwind};
use nexusquery::session::{QueryParams, QuerySet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Aggregate(String, Vec<Document>),
    Insert(String, Vec<Document>),
    Update(String, Document, Document),
    Delete(String, Document),
}

#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<Call>>,
    rows: Vec<Document>,
    delay: Option<Duration>,
}

impl RecordingStore {
    fn with_rows(rows: Vec<Document>) -> Self {
        Self { rows, ..Self::default() }
    }

    fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    async fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocumentStore for RecordingStore {
    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DbError> {
        self.record(Call::Aggregate(collection.to_string(), pipeline)).await;
        Ok(self.rows.clone())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64, DbError> {
        let n = documents.len() as u64;
        self.record(Call::Insert(collection.to_string(), documents)).await;
        Ok(n)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateReport, DbError> {
        self.record(Call::Update(collection.to_string(), filter, update)).await;
        Ok(UpdateReport { matched: 2, modified: 1 })
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<DeleteReport, DbError> {
        self.record(Call::Delete(collection.to_string(), filter)).await;
        Ok(DeleteReport { deleted: 3 })
    }
}

#[test]
fn pipeline_order_is_fixed() {
    let set = QuerySet::new()
        .sort("age", "desc")
        .limit(10)
        .skip(5)
        .filter(Filter::gt("age", 30))
        .table("users");
    assert_eq!(
        set.build_pipeline().unwrap(),
        vec![
            doc! {"$match": {"age": {"$gt": 30}}},
            doc! {"$skip": 5_i64},
            doc! {"$limit": 10_i64},
            doc! {"$sort": {"age": -1}},
        ]
    );
}

#[test]
fn pipeline_without_filter_matches_everything() {
    let set = QuerySet::new().limit(1);
    assert_eq!(set.build_pipeline().unwrap(), vec![doc! {"$match": {}}, doc! {"$limit": 1_i64}]);
}

#[test]
fn explicit_pipe_replaces_filter() {
    let set = QuerySet::new()
        .filter(Filter::eq("a", 1))
        .pipe(vec![pipe_unwind("$tags", false)])
        .sort("a", "asc");
    assert_eq!(
        set.build_pipeline().unwrap(),
        vec![
            doc! {"$unwind": {"path": "$tags", "preserveNullAndEmptyArrays": false}},
            doc! {"$sort": {"a": 1}},
        ]
    );
}

#[test]
fn reset_keeps_only_timeout() {
    let mut set = QuerySet::new()
        .table("users")
        .filter(Filter::eq("a", 1))
        .limit(3)
        .timeout(Duration::from_secs(5));
    set.reset();
    assert_eq!(set.table_name(), "");
    assert_eq!(set.timeout_duration(), Duration::from_secs(5));
    assert_eq!(set.build_pipeline().unwrap(), vec![doc! {"$match": {}}]);
}

#[test]
fn from_params_treats_zero_as_unset() {
    let params = QueryParams {
        table_name: "users".into(),
        filter: Some(Filter::eq("a", 1)),
        sort_field: "a".into(),
        sort_by: "ASC".into(),
        limit: 2,
        ..QueryParams::default()
    };
    let set = QuerySet::from_params(params);
    assert_eq!(set.table_name(), "users");
    assert_eq!(set.timeout_duration(), Duration::from_secs(30));
    assert_eq!(
        set.build_pipeline().unwrap(),
        vec![doc! {"$match": {"a": {"$eq": 1}}}, doc! {"$limit": 2_i64}, doc! {"$sort": {"a": 1}}]
    );
}

#[test]
fn build_data_delegates_to_normalizer() {
    #[derive(Serialize)]
    struct User {
        id: String,
        age: u32,
    }
    let set = QuerySet::new();
    let user = User { id: "507f191e810c19729de860ea".into(), age: 41 };
    let without_id = set.build_data(&user, false).unwrap().into_documents().unwrap();
    assert_eq!(without_id, vec![doc! {"age": 41_i64}]);
    let with_id = set.build_data(&user, true).unwrap().into_documents().unwrap();
    assert!(with_id[0].get_object_id("_id").is_ok());
}

#[tokio::test]
async fn find_dispatches_compiled_pipeline() {
    let client = Client::new(ClientConfig::default(), RecordingStore::with_rows(vec![doc! {"n": 1}]));
    let session = client.collection("users").filter(Filter::eq("n", 1)).limit(5);
    let rows = session.find().await.unwrap();
    assert_eq!(rows, vec![doc! {"n": 1}]);
}

#[tokio::test]
async fn find_one_forces_single_row() {
    let store = RecordingStore::with_rows(vec![doc! {"n": 1}, doc! {"n": 2}]);
    let client = Client::new(ClientConfig::default(), store);
    let first = client.collection("users").find_one().await.unwrap();
    assert_eq!(first, Some(doc! {"n": 1}));
}

#[tokio::test]
async fn writes_record_normalized_payloads() {
    let store = std::sync::Arc::new(RecordingStore::default());
    let client = Client::new(ClientConfig::default(), SharedStore(store.clone()));
    let session = client.collection("users").filter(Filter::eq("name", "ann"));

    let mut rec = BTreeMap::new();
    rec.insert("ID", "507f191e810c19729de860ea");
    rec.insert("name", "ann");
    assert_eq!(session.insert(&rec).await.unwrap(), 1);

    let rows = [BTreeMap::from([("name", "a")]), BTreeMap::from([("name", "b")])];
    assert_eq!(session.insert_many(&rows).await.unwrap(), 2);

    let report = session.update(&BTreeMap::from([("age", 42)])).await.unwrap();
    assert_eq!(report, UpdateReport { matched: 2, modified: 1 });
    assert_eq!(session.delete().await.unwrap(), DeleteReport { deleted: 3 });

    let calls = store.calls();
    assert_eq!(calls[0], Call::Insert("users".into(), vec![doc! {"name": "ann"}]));
    assert_eq!(
        calls[1],
        Call::Insert("users".into(), vec![doc! {"name": "a"}, doc! {"name": "b"}])
    );
    assert_eq!(
        calls[2],
        Call::Update(
            "users".into(),
            doc! {"name": {"$eq": "ann"}},
            doc! {"$set": {"age": 42_i64}}
        )
    );
    assert_eq!(calls[3], Call::Delete("users".into(), doc! {"name": {"$eq": "ann"}}));
}

#[tokio::test]
async fn update_rejects_sequences() {
    let client = Client::new(ClientConfig::default(), RecordingStore::default());
    let err = client.collection("users").update(&[1, 2]).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput(_)));
}

#[tokio::test]
async fn empty_insert_is_rejected_before_dispatch() {
    let store = std::sync::Arc::new(RecordingStore::default());
    let client = Client::new(ClientConfig::default(), SharedStore(store.clone()));
    let err = client.collection("users").insert(&BTreeMap::<String, i32>::new()).await.unwrap_err();
    assert!(matches!(err, DbError::EmptyDocument));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn missing_collection_is_a_query_error() {
    let client = Client::new(ClientConfig::default(), RecordingStore::default());
    let err = client.query(QueryParams::default()).find().await.unwrap_err();
    assert!(matches!(err, DbError::QueryError(_)));
}

#[tokio::test]
async fn compile_errors_surface_from_find() {
    let client = Client::new(ClientConfig::default(), RecordingStore::default());
    let err = client.collection("users").filter(Filter::or(vec![])).find().await.unwrap_err();
    assert!(matches!(err, DbError::Compile(_)));
}

#[tokio::test]
async fn slow_store_hits_deadline() {
    let client = Client::new(ClientConfig::default(), RecordingStore::slow(Duration::from_secs(60)));
    let err = client
        .collection("users")
        .timeout(Duration::from_millis(250))
        .find()
        .await
        .unwrap_err();
    match err {
        DbError::Timeout { collection, after_ms } => {
            assert_eq!(collection, "users");
            assert_eq!(after_ms, 250);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn query_params_zero_timeout_uses_config() {
    let cfg = ClientConfig { timeout_secs: 7, ..ClientConfig::default() };
    let client = Client::new(cfg, RecordingStore::default());
    let params = QueryParams { table_name: "t".into(), timeout_secs: 0, ..QueryParams::default() };
    let session = client.query(params);
    assert_eq!(session.query_set().timeout_duration(), Duration::from_secs(7));
}

#[tokio::test]
async fn default_query_params_use_config_timeout() {
    let cfg = ClientConfig { timeout_secs: 9, ..ClientConfig::default() };
    let client = Client::new(cfg, RecordingStore::default());
    let session = client.query(QueryParams { table_name: "t".into(), ..QueryParams::default() });
    assert_eq!(session.query_set().timeout_duration(), Duration::from_secs(9));
}

#[test]
fn explicit_params_timeout_is_kept() {
    let params = QueryParams { timeout_secs: 4, ..QueryParams::default() };
    assert_eq!(QuerySet::from_params(params).timeout_duration(), Duration::from_secs(4));
}

struct SharedStore(std::sync::Arc<RecordingStore>);

impl DocumentStore for SharedStore {
    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DbError> {
        self.0.aggregate(collection, pipeline).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64, DbError> {
        self.0.insert_many(collection, documents).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateReport, DbError> {
        self.0.update_many(collection, filter, update).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<DeleteReport, DbError> {
        self.0.delete_many(collection, filter).await
    }
}
