
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore, rank_results};
use crate::{LoreError, Result};

const TABLE_NAME: &str = "embeddings";

/// Vector store persisted with LanceDB
pub struct LanceStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl std::fmt::Debug for LanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceStore")
            .field("table_name", &self.table_name)
            .field("vector_dimension", &self.vector_dimension)
            .finish_non_exhaustive()
    }
}

fn db_error<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> LoreError + '_ {
    move |e| LoreError::Database(format!("{context}: {e}"))
}

impl LanceStore {
    /// Open (or create) the store in the given directory
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        debug!("Opening LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            LoreError::Database(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(db_error("Failed to connect to LanceDB"))?;

        let mut store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension: None,
        };

        if let Some(table) = store.open_table().await? {
            store.vector_dimension = Some(detect_vector_dimension(&table).await?);
            info!(
                "Opened vector store with {}-dimensional embeddings",
                store.vector_dimension.unwrap_or_default()
            );
        } else {
            debug!("Embeddings table does not exist yet");
        }

        Ok(store)
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(db_error("Failed to list tables"))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(db_error("Failed to open table"))
    }

    async fn create_table(&self, vector_dim: usize) -> Result<Table> {
        info!("Creating embeddings table with {} dimensions", vector_dim);
        self.connection
            .create_empty_table(&self.table_name, create_schema(vector_dim))
            .execute()
            .await
            .map_err(db_error("Failed to create table"))
    }
}

/// Read the vector column width from an existing table
async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(db_error("Failed to get table schema"))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            LoreError::Database("Could not find vector column or determine dimension".to_string())
        })
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("snippet_id", DataType::Utf8, false),
        Field::new("page_title", DataType::Utf8, false),
        Field::new("page_url", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("token_count", DataType::UInt32, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("embedding_model", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
    let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }

    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        vector_dim as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| LoreError::Database(format!("Failed to create vector array: {e}")))?;

    let mut ids = Vec::with_capacity(records.len());
    let mut chunk_ids = Vec::with_capacity(records.len());
    let mut snippet_ids = Vec::with_capacity(records.len());
    let mut page_titles = Vec::with_capacity(records.len());
    let mut page_urls = Vec::with_capacity(records.len());
    let mut contents = Vec::with_capacity(records.len());
    let mut token_counts = Vec::with_capacity(records.len());
    let mut chunk_indices = Vec::with_capacity(records.len());
    let mut models = Vec::with_capacity(records.len());
    let mut created_ats = Vec::with_capacity(records.len());

    for record in records {
        ids.push(record.id.as_str());
        chunk_ids.push(record.metadata.chunk_id.as_str());
        snippet_ids.push(record.metadata.snippet_id.as_str());
        page_titles.push(record.metadata.page_title.as_str());
        page_urls.push(record.metadata.page_url.as_str());
        contents.push(record.metadata.content.as_str());
        token_counts.push(record.metadata.token_count);
        chunk_indices.push(record.metadata.chunk_index);
        models.push(record.metadata.embedding_model.as_str());
        created_ats.push(record.metadata.created_at.as_str());
    }

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(chunk_ids)),
        Arc::new(StringArray::from(snippet_ids)),
        Arc::new(StringArray::from(page_titles)),
        Arc::new(StringArray::from(page_urls)),
        Arc::new(StringArray::from(contents)),
        Arc::new(UInt32Array::from(token_counts)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(models)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| LoreError::Database(format!("Failed to create record batch: {e}")))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LoreError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| LoreError::Database(format!("Invalid {name} column type")))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let chunk_ids = column::<StringArray>(batch, "chunk_id")?;
    let snippet_ids = column::<StringArray>(batch, "snippet_id")?;
    let page_titles = column::<StringArray>(batch, "page_title")?;
    let page_urls = column::<StringArray>(batch, "page_url")?;
    let contents = column::<StringArray>(batch, "content")?;
    let token_counts = column::<UInt32Array>(batch, "token_count")?;
    let chunk_indices = column::<UInt32Array>(batch, "chunk_index")?;
    let models = column::<StringArray>(batch, "embedding_model")?;
    let created_ats = column::<StringArray>(batch, "created_at")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| {
            let distance = distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                chunk_metadata: ChunkMetadata {
                    chunk_id: chunk_ids.value(row).to_string(),
                    snippet_id: snippet_ids.value(row).to_string(),
                    page_title: page_titles.value(row).to_string(),
                    page_url: page_urls.value(row).to_string(),
                    content: contents.value(row).to_string(),
                    token_count: token_counts.value(row),
                    chunk_index: chunk_indices.value(row),
                    embedding_model: models.value(row).to_string(),
                    created_at: created_ats.value(row).to_string(),
                },
                similarity_score: 1.0 - distance,
                distance,
            }
        })
        .collect();

    Ok(results)
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn upsert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };

        let vector_dim = self.vector_dimension.unwrap_or(first.vector.len());
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(LoreError::DimensionMismatch {
                expected: vector_dim,
                actual: bad.vector.len(),
            });
        }

        let table = match self.open_table().await? {
            Some(table) => table,
            None => self.create_table(vector_dim).await?,
        };
        self.vector_dimension = Some(vector_dim);

        let batch = create_record_batch(&records, vector_dim)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(db_error("Failed to upsert embeddings"))?;

        debug!("Upserted {} embeddings", records.len());
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.vector_dimension.filter(|d| *d != query_vector.len()) {
            return Err(LoreError::DimensionMismatch {
                expected,
                actual: query_vector.len(),
            });
        }

        let mut stream = table
            .vector_search(query_vector)
            .map_err(db_error("Failed to create vector search"))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(db_error("Failed to execute search"))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(db_error("Failed to read result stream"))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        rank_results(&mut results);
        results.truncate(limit);
        debug!("Found {} search results", results.len());
        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))?;
        Ok(count as u64)
    }

    async fn clear(&mut self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping embeddings table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(db_error("Failed to drop table"))?;
        }
        self.vector_dimension = None;
        Ok(())
    }

    fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn embedding_models(&self) -> Result<BTreeSet<String>> {
        let Some(table) = self.open_table().await? else {
            return Ok(BTreeSet::new());
        };

        let mut stream = table
            .query()
            .select(Select::columns(&["embedding_model"]))
            .execute()
            .await
            .map_err(db_error("Failed to query embedding models"))?;

        let mut models = BTreeSet::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(db_error("Failed to read model stream"))?
        {
            let column = column::<StringArray>(&batch, "embedding_model")?;
            models.extend((0..batch.num_rows()).map(|row| column.value(row).to_string()));
        }

        Ok(models)
    }
}
