// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! SQLite provenance store.
//!
//! One table per persisted entity. Iteration vectors are stored in their text
//! form (`[0,1]`) and timestamps as RFC 3339 strings; results that must be in
//! iteration order are sorted after decoding since text order is not numeric.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::errors::storage::Result;
use crate::errors::StorageError;
use crate::lineage::{DependencyRecord, LineageQuery, LookupTable};
use crate::observability::messages::storage::StoreOpened;
use crate::observability::messages::StructuredLog;
use crate::schema::{
    Collection, DataBinding, DataflowInvocation, Datalink, Port, PortBinding, PortDirection,
    PortRef, Processor, ProcessorEnactment, ValueKind, Workflow, WorkflowRun, WriteBatch,
    WriteIntent, WriteMode,
};
use crate::traits::ProvenanceStore;

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        StorageError::Database(error.to_string())
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS workflow (
        id TEXT PRIMARY KEY,
        parent_id TEXT,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS processor (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        workflow_id TEXT NOT NULL,
        first_activity TEXT NOT NULL,
        nested_workflow_id TEXT,
        top_level INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_processor_workflow ON processor(workflow_id, name)",
    "CREATE TABLE IF NOT EXISTS port (
        id TEXT PRIMARY KEY,
        processor_id TEXT,
        processor_name TEXT NOT NULL,
        workflow_id TEXT NOT NULL,
        name TEXT NOT NULL,
        direction TEXT CHECK( direction IN ('input','output') ) NOT NULL,
        declared_depth INTEGER NOT NULL,
        resolved_depth INTEGER,
        iteration_strategy_order INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_port_owner ON port(workflow_id, processor_name, name)",
    "CREATE TABLE IF NOT EXISTS datalink (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        source_port_id TEXT NOT NULL,
        sink_port_id TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_datalink_workflow ON datalink(workflow_id)",
    "CREATE TABLE IF NOT EXISTS workflow_run (
        run_id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        structure TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS dataflow_invocation (
        invocation_id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        run_id TEXT NOT NULL,
        parent_enactment_id TEXT,
        started TEXT NOT NULL,
        ended TEXT,
        input_bindings_id TEXT,
        output_bindings_id TEXT,
        completed INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_invocation_run ON dataflow_invocation(run_id)",
    "CREATE TABLE IF NOT EXISTS processor_enactment (
        enactment_id TEXT NOT NULL,
        processor_id TEXT,
        processor_name TEXT NOT NULL,
        run_id TEXT NOT NULL,
        process_identifier TEXT NOT NULL,
        iteration TEXT NOT NULL,
        parent_enactment_id TEXT,
        started TEXT NOT NULL,
        ended TEXT,
        input_bindings_id TEXT,
        output_bindings_id TEXT,
        PRIMARY KEY (run_id, process_identifier)
    )",
    "CREATE TABLE IF NOT EXISTS data_binding (
        binding_group_id TEXT NOT NULL,
        port_id TEXT NOT NULL,
        run_id TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (binding_group_id, port_id)
    )",
    "CREATE TABLE IF NOT EXISTS port_binding (
        run_id TEXT NOT NULL,
        workflow_id TEXT NOT NULL,
        processor_name TEXT NOT NULL,
        port_name TEXT NOT NULL,
        is_input INTEGER NOT NULL,
        iteration TEXT NOT NULL,
        port_id TEXT,
        value TEXT,
        kind TEXT NOT NULL,
        collection_id TEXT,
        position INTEGER NOT NULL,
        PRIMARY KEY (run_id, workflow_id, processor_name, port_name, is_input, iteration)
    )",
    "CREATE TABLE IF NOT EXISTS collection (
        run_id TEXT NOT NULL,
        workflow_id TEXT NOT NULL,
        processor_name TEXT NOT NULL,
        port_name TEXT NOT NULL,
        is_input INTEGER NOT NULL,
        iteration TEXT NOT NULL,
        collection_id TEXT NOT NULL,
        parent_collection_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (run_id, workflow_id, processor_name, port_name, is_input, iteration)
    )",
];

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            table,
            message: format!("bad timestamp '{}': {}", value, e),
        })
}

fn parse_optional_timestamp(
    table: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(table, &v)).transpose()
}

pub struct SqliteStore {
    pool: SqlitePool,
    db_path: String,
}

impl SqliteStore {
    /// Opens (creating if missing) the database file at `db_path`.
    pub async fn open(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let db_path = db_path.as_ref().to_string_lossy().to_string();

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool, db_path };
        store.initialize().await?;
        Ok(store)
    }

    /// A private in-memory database on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .journal_mode(SqliteJournalMode::Memory);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self {
            pool,
            db_path: ":memory:".to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        StoreOpened {
            backend: "sqlite",
            location: &self.db_path,
        }
        .log();
        Ok(())
    }

    async fn apply_intent(tx: &mut Transaction<'_, Sqlite>, intent: WriteIntent) -> Result<()> {
        match intent {
            WriteIntent::Workflow(workflow) => {
                sqlx::query("INSERT OR IGNORE INTO workflow (id, parent_id, name) VALUES (?, ?, ?)")
                    .bind(workflow.id)
                    .bind(workflow.parent_id)
                    .bind(workflow.name)
                    .execute(&mut **tx)
                    .await?;
            }
            WriteIntent::Processor(processor) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO processor
                        (id, name, workflow_id, first_activity, nested_workflow_id, top_level)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(processor.id)
                .bind(processor.name)
                .bind(processor.workflow_id)
                .bind(processor.first_activity)
                .bind(processor.nested_workflow_id)
                .bind(processor.top_level)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::Port(port) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO port
                        (id, processor_id, processor_name, workflow_id, name, direction,
                         declared_depth, resolved_depth, iteration_strategy_order)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(port.id)
                .bind(port.processor_id)
                .bind(port.processor_name)
                .bind(port.workflow_id)
                .bind(port.name)
                .bind(port.direction.as_str())
                .bind(port.declared_depth)
                .bind(port.resolved_depth)
                .bind(port.iteration_strategy_order)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::Datalink(link) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO datalink (id, workflow_id, source_port_id, sink_port_id)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(link.id)
                .bind(link.workflow_id)
                .bind(link.source_port_id)
                .bind(link.sink_port_id)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::Run(run) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO workflow_run (run_id, workflow_id, timestamp, structure)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(run.run_id)
                .bind(run.workflow_id)
                .bind(timestamp(&run.timestamp))
                .bind(serde_json::to_string(&run.structure)?)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::Invocation(invocation) => {
                sqlx::query(
                    "INSERT INTO dataflow_invocation
                        (invocation_id, workflow_id, run_id, parent_enactment_id, started, ended,
                         input_bindings_id, output_bindings_id, completed)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(invocation_id) DO UPDATE SET
                        workflow_id = excluded.workflow_id,
                        parent_enactment_id = excluded.parent_enactment_id,
                        started = excluded.started,
                        ended = excluded.ended,
                        input_bindings_id = excluded.input_bindings_id,
                        output_bindings_id = excluded.output_bindings_id,
                        completed = excluded.completed",
                )
                .bind(invocation.invocation_id)
                .bind(invocation.workflow_id)
                .bind(invocation.run_id)
                .bind(invocation.parent_enactment_id)
                .bind(timestamp(&invocation.started))
                .bind(invocation.ended.as_ref().map(timestamp))
                .bind(invocation.input_bindings_id)
                .bind(invocation.output_bindings_id)
                .bind(invocation.completed)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::CompleteInvocation {
                invocation_id,
                ended,
                input_bindings_id,
                output_bindings_id,
            } => {
                sqlx::query(
                    "UPDATE dataflow_invocation SET
                        ended = ?,
                        completed = 1,
                        input_bindings_id = COALESCE(?, input_bindings_id),
                        output_bindings_id = COALESCE(?, output_bindings_id)
                     WHERE invocation_id = ?",
                )
                .bind(timestamp(&ended))
                .bind(input_bindings_id)
                .bind(output_bindings_id)
                .bind(invocation_id)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::Enactment(enactment) => {
                sqlx::query(
                    "INSERT INTO processor_enactment
                        (enactment_id, processor_id, processor_name, run_id, process_identifier,
                         iteration, parent_enactment_id, started, ended,
                         input_bindings_id, output_bindings_id)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(run_id, process_identifier) DO UPDATE SET
                        enactment_id = excluded.enactment_id,
                        processor_id = excluded.processor_id,
                        processor_name = excluded.processor_name,
                        iteration = excluded.iteration,
                        parent_enactment_id = excluded.parent_enactment_id,
                        started = excluded.started,
                        ended = excluded.ended,
                        input_bindings_id = excluded.input_bindings_id,
                        output_bindings_id = excluded.output_bindings_id",
                )
                .bind(enactment.enactment_id)
                .bind(enactment.processor_id)
                .bind(enactment.processor_name)
                .bind(enactment.run_id)
                .bind(enactment.process_identifier)
                .bind(enactment.iteration.to_string())
                .bind(enactment.parent_enactment_id)
                .bind(timestamp(&enactment.started))
                .bind(enactment.ended.as_ref().map(timestamp))
                .bind(enactment.input_bindings_id)
                .bind(enactment.output_bindings_id)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::DataBinding(binding) => {
                sqlx::query(
                    "INSERT OR REPLACE INTO data_binding (binding_group_id, port_id, run_id, value)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(binding.binding_group_id)
                .bind(binding.port_id)
                .bind(binding.run_id)
                .bind(binding.value)
                .execute(&mut **tx)
                .await?;
            }
            WriteIntent::PortBinding { binding, mode } => {
                let verb = match mode {
                    WriteMode::Upsert => "INSERT OR REPLACE",
                    WriteMode::KeepExisting => "INSERT OR IGNORE",
                };
                let sql = format!(
                    "{} INTO port_binding
                        (run_id, workflow_id, processor_name, port_name, is_input, iteration,
                         port_id, value, kind, collection_id, position)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    verb
                );
                sqlx::query(&sql)
                    .bind(binding.run_id)
                    .bind(binding.workflow_id)
                    .bind(binding.processor_name)
                    .bind(binding.port_name)
                    .bind(binding.is_input)
                    .bind(binding.iteration.to_string())
                    .bind(binding.port_id)
                    .bind(binding.value)
                    .bind(binding.kind.as_str())
                    .bind(binding.collection_id)
                    .bind(binding.position)
                    .execute(&mut **tx)
                    .await?;
            }
            WriteIntent::Collection { collection, mode } => {
                let verb = match mode {
                    WriteMode::Upsert => "INSERT OR REPLACE",
                    WriteMode::KeepExisting => "INSERT OR IGNORE",
                };
                let sql = format!(
                    "{} INTO collection
                        (run_id, workflow_id, processor_name, port_name, is_input, iteration,
                         collection_id, parent_collection_id, position)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    verb
                );
                sqlx::query(&sql)
                    .bind(collection.run_id)
                    .bind(collection.workflow_id)
                    .bind(collection.processor_name)
                    .bind(collection.port_name)
                    .bind(collection.is_input)
                    .bind(collection.iteration.to_string())
                    .bind(collection.collection_id)
                    .bind(collection.parent_collection_id)
                    .bind(collection.position)
                    .execute(&mut **tx)
                    .await?;
            }
            WriteIntent::ResolvedDepth { port_id, depth } => {
                sqlx::query(
                    "UPDATE port SET resolved_depth = MAX(?, declared_depth) WHERE id = ?",
                )
                .bind(depth)
                .bind(port_id)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    fn row_to_workflow(row: &SqliteRow) -> Result<Workflow> {
        Ok(Workflow {
            id: row.try_get("id")?,
            parent_id: row.try_get("parent_id")?,
            name: row.try_get("name")?,
        })
    }

    fn row_to_processor(row: &SqliteRow) -> Result<Processor> {
        Ok(Processor {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            workflow_id: row.try_get("workflow_id")?,
            first_activity: row.try_get("first_activity")?,
            nested_workflow_id: row.try_get("nested_workflow_id")?,
            top_level: row.try_get("top_level")?,
        })
    }

    fn row_to_port(row: &SqliteRow) -> Result<Port> {
        let direction: String = row.try_get("direction")?;
        Ok(Port {
            id: row.try_get("id")?,
            processor_id: row.try_get("processor_id")?,
            processor_name: row.try_get("processor_name")?,
            workflow_id: row.try_get("workflow_id")?,
            name: row.try_get("name")?,
            direction: direction.parse()?,
            declared_depth: row.try_get("declared_depth")?,
            resolved_depth: row.try_get("resolved_depth")?,
            iteration_strategy_order: row.try_get("iteration_strategy_order")?,
        })
    }

    fn row_to_datalink(row: &SqliteRow) -> Result<Datalink> {
        Ok(Datalink {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            source_port_id: row.try_get("source_port_id")?,
            sink_port_id: row.try_get("sink_port_id")?,
        })
    }

    fn row_to_run(row: &SqliteRow) -> Result<WorkflowRun> {
        let timestamp: String = row.try_get("timestamp")?;
        let structure: String = row.try_get("structure")?;
        Ok(WorkflowRun {
            run_id: row.try_get("run_id")?,
            workflow_id: row.try_get("workflow_id")?,
            timestamp: parse_timestamp("workflow_run", &timestamp)?,
            structure: serde_json::from_str(&structure)?,
        })
    }

    fn row_to_invocation(row: &SqliteRow) -> Result<DataflowInvocation> {
        let started: String = row.try_get("started")?;
        Ok(DataflowInvocation {
            invocation_id: row.try_get("invocation_id")?,
            workflow_id: row.try_get("workflow_id")?,
            run_id: row.try_get("run_id")?,
            parent_enactment_id: row.try_get("parent_enactment_id")?,
            started: parse_timestamp("dataflow_invocation", &started)?,
            ended: parse_optional_timestamp("dataflow_invocation", row.try_get("ended")?)?,
            input_bindings_id: row.try_get("input_bindings_id")?,
            output_bindings_id: row.try_get("output_bindings_id")?,
            completed: row.try_get("completed")?,
        })
    }

    fn row_to_enactment(row: &SqliteRow) -> Result<ProcessorEnactment> {
        let started: String = row.try_get("started")?;
        let iteration: String = row.try_get("iteration")?;
        Ok(ProcessorEnactment {
            enactment_id: row.try_get("enactment_id")?,
            processor_id: row.try_get("processor_id")?,
            processor_name: row.try_get("processor_name")?,
            run_id: row.try_get("run_id")?,
            process_identifier: row.try_get("process_identifier")?,
            iteration: iteration.parse()?,
            parent_enactment_id: row.try_get("parent_enactment_id")?,
            started: parse_timestamp("processor_enactment", &started)?,
            ended: parse_optional_timestamp("processor_enactment", row.try_get("ended")?)?,
            input_bindings_id: row.try_get("input_bindings_id")?,
            output_bindings_id: row.try_get("output_bindings_id")?,
        })
    }

    fn row_to_data_binding(row: &SqliteRow) -> Result<DataBinding> {
        Ok(DataBinding {
            binding_group_id: row.try_get("binding_group_id")?,
            port_id: row.try_get("port_id")?,
            run_id: row.try_get("run_id")?,
            value: row.try_get("value")?,
        })
    }

    fn row_to_port_binding(row: &SqliteRow) -> Result<PortBinding> {
        let iteration: String = row.try_get("iteration")?;
        let kind: String = row.try_get("kind")?;
        Ok(PortBinding {
            workflow_id: row.try_get("workflow_id")?,
            processor_name: row.try_get("processor_name")?,
            port_name: row.try_get("port_name")?,
            port_id: row.try_get("port_id")?,
            is_input: row.try_get("is_input")?,
            run_id: row.try_get("run_id")?,
            iteration: iteration.parse()?,
            value: row.try_get("value")?,
            kind: kind.parse::<ValueKind>()?,
            collection_id: row.try_get("collection_id")?,
            position: row.try_get("position")?,
        })
    }

    fn row_to_collection(row: &SqliteRow) -> Result<Collection> {
        let iteration: String = row.try_get("iteration")?;
        Ok(Collection {
            collection_id: row.try_get("collection_id")?,
            parent_collection_id: row.try_get("parent_collection_id")?,
            workflow_id: row.try_get("workflow_id")?,
            processor_name: row.try_get("processor_name")?,
            port_name: row.try_get("port_name")?,
            is_input: row.try_get("is_input")?,
            run_id: row.try_get("run_id")?,
            iteration: iteration.parse()?,
            position: row.try_get("position")?,
        })
    }
}

#[async_trait]
impl ProvenanceStore for SqliteStore {
    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let size = batch.len();
        let mut tx = self.pool.begin().await?;
        for intent in batch {
            Self::apply_intent(&mut tx, intent).await?;
        }
        tx.commit().await?;
        debug!(intents = size, "applied write batch");
        Ok(())
    }

    async fn workflow(&self, workflow_id: &str) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT id, parent_id, name FROM workflow WHERE id = ?")
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_workflow).transpose()
    }

    async fn workflow_tree(&self, top_workflow_id: &str) -> Result<Vec<Workflow>> {
        let rows = sqlx::query(
            "WITH RECURSIVE tree(id, parent_id, name, level) AS (
                SELECT id, parent_id, name, 0 FROM workflow WHERE id = ?
                UNION
                SELECT w.id, w.parent_id, w.name, tree.level + 1
                FROM workflow w JOIN tree ON w.parent_id = tree.id
             )
             SELECT id, parent_id, name FROM tree ORDER BY level, id",
        )
        .bind(top_workflow_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_workflow).collect()
    }

    async fn processors(&self, workflow_id: &str) -> Result<Vec<Processor>> {
        let rows = sqlx::query("SELECT * FROM processor WHERE workflow_id = ? ORDER BY name")
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_processor).collect()
    }

    async fn find_processor(&self, workflow_id: &str, name: &str) -> Result<Option<Processor>> {
        let row = sqlx::query("SELECT * FROM processor WHERE workflow_id = ? AND name = ? LIMIT 1")
            .bind(workflow_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_processor).transpose()
    }

    async fn ports(&self, workflow_id: &str) -> Result<Vec<Port>> {
        let rows = sqlx::query(
            "SELECT * FROM port WHERE workflow_id = ?
             ORDER BY processor_name, direction, iteration_strategy_order, name",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_port).collect()
    }

    async fn datalinks(&self, workflow_id: &str) -> Result<Vec<Datalink>> {
        let rows = sqlx::query("SELECT * FROM datalink WHERE workflow_id = ? ORDER BY id")
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_datalink).collect()
    }

    async fn find_ports(
        &self,
        workflow_id: &str,
        processor_name: &str,
        port_name: &str,
        direction: PortDirection,
    ) -> Result<Vec<Port>> {
        let rows = sqlx::query(
            "SELECT * FROM port
             WHERE workflow_id = ? AND processor_name = ? AND name = ? AND direction = ?
             ORDER BY processor_id IS NULL, id",
        )
        .bind(workflow_id)
        .bind(processor_name)
        .bind(port_name)
        .bind(direction.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_port).collect()
    }

    async fn run(&self, run_id: &str) -> Result<Option<WorkflowRun>> {
        let row = sqlx::query("SELECT * FROM workflow_run WHERE run_id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_run).transpose()
    }

    async fn runs(&self, workflow_id: Option<&str>) -> Result<Vec<WorkflowRun>> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_run WHERE (? IS NULL OR workflow_id = ?)
             ORDER BY timestamp, run_id",
        )
        .bind(workflow_id)
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_run).collect()
    }

    async fn invocations(&self, run_id: &str) -> Result<Vec<DataflowInvocation>> {
        let rows = sqlx::query(
            "SELECT * FROM dataflow_invocation WHERE run_id = ? ORDER BY started, invocation_id",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_invocation).collect()
    }

    async fn enactment_by_process(
        &self,
        run_id: &str,
        process_identifier: &str,
    ) -> Result<Option<ProcessorEnactment>> {
        let row = sqlx::query(
            "SELECT * FROM processor_enactment WHERE run_id = ? AND process_identifier = ?",
        )
        .bind(run_id)
        .bind(process_identifier)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_enactment).transpose()
    }

    async fn enactments(&self, run_id: &str) -> Result<Vec<ProcessorEnactment>> {
        let rows = sqlx::query(
            "SELECT * FROM processor_enactment WHERE run_id = ?
             ORDER BY started, process_identifier",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_enactment).collect()
    }

    async fn data_bindings(&self, binding_group_id: &str) -> Result<Vec<DataBinding>> {
        let rows =
            sqlx::query("SELECT * FROM data_binding WHERE binding_group_id = ? ORDER BY port_id")
                .bind(binding_group_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(Self::row_to_data_binding).collect()
    }

    async fn port_bindings(&self, run_id: &str, port: &PortRef) -> Result<Vec<PortBinding>> {
        let rows = sqlx::query(
            "SELECT * FROM port_binding
             WHERE run_id = ? AND workflow_id = ? AND processor_name = ? AND port_name = ?
               AND is_input = ?",
        )
        .bind(run_id)
        .bind(&port.workflow_id)
        .bind(&port.processor_name)
        .bind(&port.port_name)
        .bind(port.is_input())
        .fetch_all(&self.pool)
        .await?;
        let mut bindings = rows
            .iter()
            .map(Self::row_to_port_binding)
            .collect::<Result<Vec<_>>>()?;
        bindings.sort_by(|a, b| a.iteration.cmp(&b.iteration));
        Ok(bindings)
    }

    async fn collections(&self, run_id: &str, port: &PortRef) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT * FROM collection
             WHERE run_id = ? AND workflow_id = ? AND processor_name = ? AND port_name = ?
               AND is_input = ?",
        )
        .bind(run_id)
        .bind(&port.workflow_id)
        .bind(&port.processor_name)
        .bind(&port.port_name)
        .bind(port.is_input())
        .fetch_all(&self.pool)
        .await?;
        let mut collections = rows
            .iter()
            .map(Self::row_to_collection)
            .collect::<Result<Vec<_>>>()?;
        collections.sort_by(|a, b| a.iteration.cmp(&b.iteration));
        Ok(collections)
    }

    async fn lookup(&self, query: &LineageQuery) -> Result<Vec<DependencyRecord>> {
        let iteration = query.iteration.to_string();
        let mut records = match query.table {
            LookupTable::Collection => {
                let rows = sqlx::query(
                    "SELECT * FROM collection
                     WHERE run_id = ? AND workflow_id = ? AND processor_name = ?
                       AND port_name = ? AND is_input = ? AND iteration = ?",
                )
                .bind(&query.run_id)
                .bind(&query.port.workflow_id)
                .bind(&query.port.processor_name)
                .bind(&query.port.port_name)
                .bind(query.port.is_input())
                .bind(&iteration)
                .fetch_all(&self.pool)
                .await?;
                rows.iter()
                    .map(|row| Self::row_to_collection(row).map(|c| DependencyRecord::from(&c)))
                    .collect::<Result<Vec<_>>>()?
            }
            LookupTable::PortBinding => {
                let rows = sqlx::query(
                    "SELECT * FROM port_binding
                     WHERE run_id = ? AND workflow_id = ? AND processor_name = ?
                       AND port_name = ? AND is_input = ? AND (? = '[]' OR iteration = ?)",
                )
                .bind(&query.run_id)
                .bind(&query.port.workflow_id)
                .bind(&query.port.processor_name)
                .bind(&query.port.port_name)
                .bind(query.port.is_input())
                .bind(&iteration)
                .bind(&iteration)
                .fetch_all(&self.pool)
                .await?;
                rows.iter()
                    .map(|row| Self::row_to_port_binding(row).map(|b| DependencyRecord::from(&b)))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        records.sort_by(|a, b| (&a.iteration, &a.value).cmp(&(&b.iteration, &b.value)));
        Ok(records)
    }

    async fn delete_run(&self, run_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "workflow_run",
            "dataflow_invocation",
            "processor_enactment",
            "data_binding",
            "port_binding",
            "collection",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE run_id = ?", table))
                .bind(run_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
