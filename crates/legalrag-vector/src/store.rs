use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use legalrag_core::config::{validate_collection_name, PREVIOUS_SUFFIX, STAGING_SUFFIX};
use legalrag_core::traits::Embedder;
use legalrag_core::types::{Chunk, ChunkId, ChunkMetadata, DraftChunk, ScoredChunk};
use legalrag_core::{Error, Result};

use crate::schema::build_chunk_schema;
use crate::table::{delete_meta, get_meta, open_db, set_meta, table_exists};

pub use legalrag_core::config::META_TABLE;

/// A persistent, named collection of embedded chunks.
///
/// Writers are serialized by an async mutex; each `add` is one table
/// append, so readers see either none or all of a batch.
pub struct VectorStore {
    db: Connection,
    root: PathBuf,
    collection: String,
    embedder: Arc<dyn Embedder>,
    write_lock: Mutex<()>,
}

impl VectorStore {
    /// Open (or lazily create) `collection` under `root`.
    ///
    /// Fails with `EmbedderMismatch` or `DimensionMismatch` when the
    /// collection was built by a different embedder, and with
    /// `InvalidConfig` for reserved names such as the meta table.
    pub async fn open(root: &Path, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        validate_collection_name(collection)?;
        Self::open_unchecked(root, collection, embedder).await
    }

    async fn open_unchecked(root: &Path, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let db = open_db(&root.to_string_lossy()).await?;
        let store = Self {
            db,
            root: root.to_path_buf(),
            collection: collection.to_string(),
            embedder,
            write_lock: Mutex::new(()),
        };
        store.check_embedder().await?;
        info!(root = %root.display(), collection, embedder = store.embedder.embedder_id(), "vector store opened");
        Ok(store)
    }

    pub fn collection(&self) -> &str { &self.collection }

    pub fn root(&self) -> &Path { &self.root }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    /// Embed and persist `drafts` in one batch, returning the new ids in
    /// input order. Whitespace-only chunks are dropped. Nothing is written
    /// unless every chunk got a vector of the right dimension.
    pub async fn add(&self, drafts: &[DraftChunk]) -> Result<Vec<ChunkId>> {
        let drafts: Vec<&DraftChunk> = drafts.iter().filter(|d| !d.text.trim().is_empty()).collect();
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = drafts.iter().map(|d| d.text.trim().to_string()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingCountMismatch { texts: texts.len(), vectors: vectors.len() });
        }
        let dim = self.embedder.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
        }

        let ids: Vec<ChunkId> = texts.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let batch = chunks_to_record_batch(&ids, &texts, &drafts, vectors, dim)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

        let _guard = self.write_lock.lock().await;
        if table_exists(&self.db, &self.collection).await? {
            let table = self.db.open_table(&self.collection).execute().await.map_err(Error::store)?;
            table.add(reader).execute().await.map_err(Error::store)?;
        } else {
            self.db.create_table(&self.collection, reader).execute().await.map_err(Error::store)?;
            self.record_embedder().await?;
        }
        info!(collection = %self.collection, added = ids.len(), "chunks added");
        Ok(ids)
    }

    /// Up to `k` nearest chunks by cosine distance, nearest first.
    pub async fn query_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let dim = self.embedder.dim();
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        if k == 0 || !table_exists(&self.db, &self.collection).await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.collection).execute().await.map_err(Error::store)?;
        let mut stream = table
            .vector_search(query.to_vec())
            .map_err(Error::store)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(Error::store)?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            hits.extend(scored_chunks_from_batch(&batch)?);
        }
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        debug!(collection = %self.collection, k, hits = hits.len(), "vector query");
        Ok(hits)
    }

    pub async fn count(&self) -> Result<usize> {
        if !table_exists(&self.db, &self.collection).await? {
            return Ok(0);
        }
        let table = self.db.open_table(&self.collection).execute().await.map_err(Error::store)?;
        table.count_rows(None).await.map_err(Error::store)
    }

    /// blake3 hashes of every stored chunk text.
    pub async fn content_hashes(&self) -> Result<HashSet<String>> {
        let mut hashes = HashSet::new();
        if !table_exists(&self.db, &self.collection).await? {
            return Ok(hashes);
        }
        let table = self.db.open_table(&self.collection).execute().await.map_err(Error::store)?;
        let mut stream = table
            .query()
            .select(Select::columns(&["content_hash"]))
            .execute()
            .await
            .map_err(Error::store)?;
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let col = string_column(&batch, "content_hash")?;
            hashes.extend((0..batch.num_rows()).map(|i| col.value(i).to_string()));
        }
        Ok(hashes)
    }

    /// Drop every chunk and the recorded embedder of this collection.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let table_dir = self.table_dir();
        if table_dir.exists() {
            std::fs::remove_dir_all(&table_dir)?;
        }
        self.delete_embedder_record().await?;
        info!(collection = %self.collection, "collection reset");
        Ok(())
    }

    /// An empty staging collection next to this one, built with the same
    /// embedder. Leftovers of an earlier failed rebuild are discarded.
    pub async fn staging(&self) -> Result<VectorStore> {
        let name = format!("{}{STAGING_SUFFIX}", self.collection);
        let leftover = self.root.join(format!("{name}.lance"));
        if leftover.exists() {
            std::fs::remove_dir_all(&leftover)?;
        }
        let keys = [format!("embedder_id:{name}"), format!("dim:{name}")];
        delete_meta(&self.db, META_TABLE, &[keys[0].as_str(), keys[1].as_str()]).await?;
        Self::open_unchecked(&self.root, &name, Arc::clone(&self.embedder)).await
    }

    /// Replace this collection's contents with `staging`'s.
    ///
    /// The live table is moved aside, the staged table renamed into place,
    /// and only then the old table deleted. If the rename fails the old
    /// table is moved back.
    pub async fn replace_with(&self, staging: VectorStore) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let live = self.table_dir();
        let staged = staging.table_dir();
        let previous = self.root.join(format!("{}{PREVIOUS_SUFFIX}.lance", self.collection));

        if previous.exists() {
            std::fs::remove_dir_all(&previous)?;
        }
        let had_live = live.exists();
        if had_live {
            std::fs::rename(&live, &previous)?;
        }
        if staged.exists() {
            if let Err(e) = std::fs::rename(&staged, &live) {
                if had_live {
                    std::fs::rename(&previous, &live)?;
                }
                return Err(e.into());
            }
            self.record_embedder().await?;
        } else {
            // The rebuild stored nothing: the collection ends up empty.
            self.delete_embedder_record().await?;
        }
        if had_live {
            std::fs::remove_dir_all(&previous)?;
        }
        staging.delete_embedder_record().await?;
        info!(collection = %self.collection, "collection replaced by rebuild");
        Ok(())
    }

    fn table_dir(&self) -> PathBuf {
        self.root.join(format!("{}.lance", self.collection))
    }

    async fn delete_embedder_record(&self) -> Result<()> {
        let keys = [self.meta_key("embedder_id"), self.meta_key("dim")];
        delete_meta(&self.db, META_TABLE, &[keys[0].as_str(), keys[1].as_str()]).await
    }

    fn meta_key(&self, field: &str) -> String {
        format!("{field}:{}", self.collection)
    }

    async fn check_embedder(&self) -> Result<()> {
        if let Some(stored) = get_meta(&self.db, META_TABLE, &self.meta_key("embedder_id")).await? {
            if stored != self.embedder.embedder_id() {
                return Err(Error::EmbedderMismatch {
                    collection: self.collection.clone(),
                    stored,
                    requested: self.embedder.embedder_id().to_string(),
                });
            }
        }
        if let Some(stored) = get_meta(&self.db, META_TABLE, &self.meta_key("dim")).await? {
            let expected: usize = stored.parse().map_err(|_| Error::Store(format!("invalid stored dim '{stored}'")))?;
            if expected != self.embedder.dim() {
                return Err(Error::DimensionMismatch { expected, actual: self.embedder.dim() });
            }
        }
        Ok(())
    }

    async fn record_embedder(&self) -> Result<()> {
        set_meta(&self.db, META_TABLE, &self.meta_key("embedder_id"), self.embedder.embedder_id()).await?;
        set_meta(&self.db, META_TABLE, &self.meta_key("dim"), &self.embedder.dim().to_string()).await
    }
}

/// Hex blake3 digest of stored chunk text.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn chunks_to_record_batch(
    ids: &[ChunkId],
    texts: &[String],
    drafts: &[&DraftChunk],
    vectors: Vec<Vec<f32>>,
    dim: usize,
) -> Result<RecordBatch> {
    let schema = build_chunk_schema(dim)?;
    let to_i32 = |v: usize| i32::try_from(v).map_err(|_| Error::Store(format!("value {v} out of range")));

    let mut pages = Vec::with_capacity(drafts.len());
    let mut chunk_indices = Vec::with_capacity(drafts.len());
    for d in drafts {
        pages.push(d.metadata.page.map(|p| to_i32(p as usize)).transpose()?);
        chunk_indices.push(to_i32(d.metadata.chunk_index)?);
    }
    let sources: Vec<&str> = drafts.iter().map(|d| d.metadata.source.as_str()).collect();
    let hashes: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
    let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids.to_vec())),
            Arc::new(StringArray::from(texts.to_vec())),
            Arc::new(StringArray::from(sources)),
            Arc::new(Int32Array::from(pages)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(StringArray::from(hashes)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, to_i32(dim)?)),
        ],
    )
    .map_err(Error::store)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Store(format!("{name} column missing")))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::Store(format!("{name} column missing")))
}

fn scored_chunks_from_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let pages = int_column(batch, "page")?;
    let chunk_indices = int_column(batch, "chunk_index")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::Store("_distance column missing".into()))?;

    Ok((0..batch.num_rows())
        .map(|i| ScoredChunk {
            chunk: Chunk {
                id: ids.value(i).to_string(),
                text: texts.value(i).to_string(),
                metadata: ChunkMetadata {
                    source: sources.value(i).to_string(),
                    page: if pages.is_null(i) { None } else { u32::try_from(pages.value(i)).ok() },
                    chunk_index: usize::try_from(chunk_indices.value(i)).unwrap_or(0),
                },
            },
            distance: distances.value(i),
        })
        .collect())
}
