//! End-to-end tests: ingest DDL + database files, then answer questions

use nl2sql_ddl::DdlParser;
use nl2sql_engine::{
    build_prompt, AskOutcome, Assistant, EngineError, Ingestor, QueryOutcome, SemanticRetriever, SQL_MARKER,
};
use nl2sql_model::{HashingEmbedder, IntentResponse, MockIntentGenerator, MockSqlGenerator, ModelError};
use nl2sql_store::{DatabaseFile, MetadataStore, StoreError};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

const HR_DDL: &str = "
CREATE TABLE employee_attendance (employee_id INTEGER, date DATE, status TEXT);
";

const SHOP_DDL: &str = "
CREATE TABLE inventory (
    item_id INTEGER,
    item_name TEXT,
    quantity INTEGER,
    restock_date DATE
);
";

const PAYROLL_DDL: &str = "
CREATE TABLE payroll (employee_id INTEGER, amount REAL);
";

fn intents() -> MockIntentGenerator {
    MockIntentGenerator::builder()
        .with_intents(
            "employee_attendance",
            IntentResponse::new("Logs the daily attendance status of company employees.")
                .with_column("employee_id", "Unique identifier for the employee.")
                .with_column("date", "The calendar date of the attendance record.")
                .with_column("status", "Attendance status for the day (e.g., Present, Absent, Sick)."),
        )
        .with_intents(
            "inventory",
            IntentResponse::new("Tracks the stock levels and restocking schedules of items in a warehouse.")
                .with_column("item_id", "Unique identifier for each inventory item.")
                .with_column("item_name", "Name or label of the item.")
                .with_column("quantity", "Number of units currently in stock.")
                .with_column("restock_date", "Date when the item is expected to be restocked."),
        )
        .build()
}

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
    store: Arc<MetadataStore>,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = MetadataStore::open(root.join("metadata_store.db")).unwrap();
        store.initialize().unwrap();
        Self {
            _dir: dir,
            root,
            store: Arc::new(store),
        }
    }

    fn uploads(&self) -> PathBuf {
        self.root.join("uploaded_dbs")
    }

    fn source(&self, name: &str, ddl: &str, seed: &str) -> (PathBuf, PathBuf) {
        let sources = self.root.join("sources");
        std::fs::create_dir_all(&sources).unwrap();

        let ddl_path = sources.join(format!("{}.sql", name));
        std::fs::write(&ddl_path, ddl).unwrap();

        let db_path = sources.join(format!("{}.db", name));
        if db_path.exists() {
            std::fs::remove_file(&db_path).unwrap();
        }
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(ddl).unwrap();
        conn.execute_batch(seed).unwrap();

        (ddl_path, db_path)
    }

    async fn ingest_both(&self, generator: &MockIntentGenerator) {
        let ingestor = Ingestor::new(DdlParser::sqlite(), Arc::new(generator.clone()), self.uploads());

        let (ddl, db) = self.source(
            "hr",
            HR_DDL,
            "INSERT INTO employee_attendance VALUES (1, '2024-05-01', 'Present'), (2, '2024-05-01', 'Absent'), (3, '2024-05-01', 'Present');",
        );
        ingestor.ingest(&self.store, &ddl, &db).await.unwrap();

        let (ddl, db) = self.source("shop", SHOP_DDL, "INSERT INTO inventory VALUES (1, 'Widget', 0, '2024-06-01');");
        ingestor.ingest(&self.store, &ddl, &db).await.unwrap();
    }

    /// Attendance rows in the uploaded hr.db, or the query error
    fn uploaded_attendance_count(&self) -> Result<serde_json::Value, String> {
        let db = DatabaseFile::open(self.uploads().join("hr.db")).map_err(|e| e.to_string())?;
        db.query("SELECT COUNT(*) FROM employee_attendance")
            .map(|rows| rows.rows[0][0].clone())
            .map_err(|e| e.to_string())
    }

    fn uploads_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.uploads())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn assistant(&self, sql: &MockSqlGenerator) -> Assistant {
        Assistant::new(
            Arc::clone(&self.store),
            Arc::new(HashingEmbedder::new(512).unwrap()),
            Arc::new(sql.clone()),
            self.uploads(),
        )
    }
}

#[tokio::test]
async fn ingestion_fills_the_store() {
    let ws = Workspace::new();
    let generator = intents();
    ws.ingest_both(&generator).await;

    assert_eq!(generator.calls().await, vec!["employee_attendance", "inventory"]);
    assert_eq!(
        ws.store.list_databases().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["hr.db", "shop.db"]
    );
    assert_eq!(ws.store.row_count().unwrap(), 7);
    assert!(ws.uploads().join("hr.db").is_file());
    assert!(ws.uploads().join("shop.db").is_file());

    let columns = ws.store.columns_for("hr.db", &["employee_attendance"]).unwrap();
    let names: Vec<_> = columns["employee_attendance"].iter().map(|c| c.column_name.as_str()).collect();
    assert_eq!(names, vec!["employee_id", "date", "status"]);
}

#[tokio::test]
async fn reingesting_replaces_rows_unless_appending() {
    let ws = Workspace::new();
    let generator = intents();
    ws.ingest_both(&generator).await;
    ws.ingest_both(&generator).await;
    assert_eq!(ws.store.row_count().unwrap(), 7);

    let (ddl, db) = ws.source("hr", HR_DDL, "");
    let appender = Ingestor::new(DdlParser::sqlite(), Arc::new(generator.clone()), ws.uploads()).with_append(true);
    let report = appender.ingest(&ws.store, &ddl, &db).await.unwrap();

    assert_eq!(report.replaced_rows, 0);
    assert_eq!(ws.store.row_count().unwrap(), 10);
}

#[tokio::test]
async fn failed_enrichment_keeps_previous_rows() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let failing = MockIntentGenerator::builder()
        .with_failure("employee_attendance", ModelError::Network("connection refused".to_string()))
        .build();
    let (ddl, db) = ws.source("hr", HR_DDL, "");
    let ingestor = Ingestor::new(DdlParser::sqlite(), Arc::new(failing), ws.uploads());

    assert!(ingestor.ingest(&ws.store, &ddl, &db).await.is_err());
    assert_eq!(ws.store.records("hr.db").unwrap().len(), 3);
}

#[tokio::test]
async fn failed_reingest_keeps_previous_upload() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let failing = MockIntentGenerator::builder()
        .with_failure("payroll", ModelError::Network("connection refused".to_string()))
        .build();
    let (ddl, db) = ws.source("hr", PAYROLL_DDL, "");
    let ingestor = Ingestor::new(DdlParser::sqlite(), Arc::new(failing), ws.uploads());

    assert!(ingestor.ingest(&ws.store, &ddl, &db).await.is_err());
    assert_eq!(ws.store.list_tables("hr.db").unwrap(), vec!["employee_attendance"]);
    assert_eq!(ws.uploaded_attendance_count(), Ok(serde_json::json!(3)));
    assert_eq!(ws.uploads_entries(), vec!["hr.db", "shop.db"]);
}

#[tokio::test]
async fn failed_metadata_write_keeps_previous_rows_and_upload() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    // Reject payroll rows from a second connection to the same store file
    rusqlite::Connection::open(ws.root.join("metadata_store.db"))
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_payroll BEFORE INSERT ON metadata
             WHEN NEW.column_name = 'amount'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

    let (ddl, db) = ws.source("hr", PAYROLL_DDL, "");
    let ingestor = Ingestor::new(DdlParser::sqlite(), Arc::new(intents()), ws.uploads());

    let result = ingestor.ingest(&ws.store, &ddl, &db).await;
    assert!(matches!(result, Err(EngineError::Store(StoreError::Sqlite(_)))), "got {result:?}");
    assert_eq!(ws.store.records("hr.db").unwrap().len(), 3);
    assert_eq!(ws.store.list_tables("hr.db").unwrap(), vec!["employee_attendance"]);
    assert_eq!(ws.uploaded_attendance_count(), Ok(serde_json::json!(3)));
    assert_eq!(ws.uploads_entries(), vec!["hr.db", "shop.db"]);
}

#[tokio::test]
async fn successful_reingest_replaces_rows_and_upload() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let (ddl, db) = ws.source("hr", PAYROLL_DDL, "INSERT INTO payroll VALUES (1, 4200.0);");
    let ingestor = Ingestor::new(DdlParser::sqlite(), Arc::new(intents()), ws.uploads());
    let report = ingestor.ingest(&ws.store, &ddl, &db).await.unwrap();

    assert_eq!(report.replaced_rows, 3);
    assert_eq!(report.database_path, ws.uploads().join("hr.db"));
    assert_eq!(ws.store.list_tables("hr.db").unwrap(), vec!["payroll"]);
    assert!(ws.uploaded_attendance_count().unwrap_err().contains("no such table"));
    assert_eq!(ws.uploads_entries(), vec!["hr.db", "shop.db"]);
}

#[tokio::test]
async fn attendance_question_picks_attendance_table() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let retriever = SemanticRetriever::new(Arc::new(HashingEmbedder::new(512).unwrap()));
    let top = retriever
        .top_tables(&ws.store, "how many employees were present yesterday", 1)
        .await
        .unwrap();

    assert_eq!(top, vec![("hr.db".to_string(), "employee_attendance".to_string())]);
}

#[tokio::test]
async fn ask_runs_generated_sql() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let sql = MockSqlGenerator::new(
        "```sql\nSELECT COUNT(*) AS present FROM employee_attendance WHERE status = 'Present'\n```",
    );
    let assistant = ws.assistant(&sql).with_top_k(1);

    let AskOutcome::Answered(answer) = assistant
        .ask("how many employees were present yesterday", None)
        .await
        .unwrap()
    else {
        panic!("expected an answer");
    };

    assert_eq!(answer.prepared.context.db_id, "hr.db");
    assert_eq!(answer.sql, "SELECT COUNT(*) AS present FROM employee_attendance WHERE status = 'Present'");
    match &answer.outcome {
        QueryOutcome::Rows(rows) => {
            assert_eq!(rows.columns, vec!["present"]);
            assert_eq!(rows.rows, vec![vec![serde_json::json!(2)]]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let prompts = sql.prompts().await;
    assert_eq!(prompts.len(), 1);
    assert_eq!(
        prompts[0],
        "### Database: hr.db\n\
         \n\
         ### Table Schema: employee_attendance - Logs the daily attendance status of company employees.\n\
         - employee_id (INTEGER): Unique identifier for the employee.\n\
         - date (DATE): The calendar date of the attendance record.\n\
         - status (TEXT): Attendance status for the day (e.g., Present, Absent, Sick).\n\
         \n\
         ### Question: how many employees were present yesterday\n\
         ### SQL:"
    );
}

#[tokio::test]
async fn bad_sql_becomes_a_message() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let sql = MockSqlGenerator::new("SELECT salary FROM employee_attendance");
    let assistant = ws.assistant(&sql);

    let AskOutcome::Answered(answer) = assistant.ask("employee attendance", Some("hr.db")).await.unwrap() else {
        panic!("expected an answer");
    };
    match answer.outcome {
        QueryOutcome::Failed(message) => {
            assert!(message.starts_with("Error executing SQL: "));
            assert!(message.contains("salary"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn database_filter_limits_context() {
    let ws = Workspace::new();
    ws.ingest_both(&intents()).await;

    let assistant = ws.assistant(&MockSqlGenerator::new("SELECT 1"));
    let prepared = assistant
        .prepare("how many employees were present yesterday", Some("shop.db"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(prepared.context.db_id, "shop.db");
    assert_eq!(prepared.context.table_names(), vec!["inventory"]);
    assert!(prepared.prompt.ends_with(SQL_MARKER));
    assert_eq!(
        prepared.prompt,
        build_prompt(&prepared.question, "shop.db", &prepared.context.tables, true)
    );
}
