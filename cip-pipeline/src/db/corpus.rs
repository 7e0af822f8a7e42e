//! Brand corpus storage
//!
//! Embeddings are stored as JSON arrays; the corpus is small enough that
//! retrieval loads every chunk and ranks in memory.

use sqlx::{Row, SqlitePool};

use cip_common::time::{now, to_db_string};
use cip_common::{Error, Result};

use crate::utils::retry_on_lock;

/// One stored corpus chunk
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusChunk {
    /// Source document (file name)
    pub document: String,
    pub chunk_index: usize,
    pub content: String,
    pub topic: String,
    pub technical_level: String,
    pub embedding: Vec<f32>,
}

/// Number of stored chunks
pub async fn count_chunks(pool: &SqlitePool) -> Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM brand_corpus")
        .fetch_one(pool)
        .await?;
    Ok(count.max(0) as usize)
}

/// Insert chunks in one transaction; existing (document, chunk_index) rows are kept
pub async fn insert_chunks(pool: &SqlitePool, chunks: &[CorpusChunk], max_wait_ms: u64) -> Result<usize> {
    let created_at = to_db_string(&now());
    let embeddings: Vec<String> = chunks
        .iter()
        .map(|chunk| {
            serde_json::to_string(&chunk.embedding)
                .map_err(|e| Error::Internal(format!("Failed to serialize embedding: {}", e)))
        })
        .collect::<Result<_>>()?;

    retry_on_lock("insert_corpus_chunks", max_wait_ms, || async {
        let mut tx = pool.begin().await?;
        let mut inserted = 0u64;

        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO brand_corpus (
                    document, chunk_index, content, topic, technical_level, embedding, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.document)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(&chunk.topic)
            .bind(&chunk.technical_level)
            .bind(embedding)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted as usize)
    })
    .await
}

/// Every stored chunk
pub async fn load_chunks(pool: &SqlitePool) -> Result<Vec<CorpusChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT document, chunk_index, content, topic, technical_level, embedding
        FROM brand_corpus
        ORDER BY document ASC, chunk_index ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let embedding: String = row.get("embedding");
            let chunk_index: i64 = row.get("chunk_index");
            Ok(CorpusChunk {
                document: row.get("document"),
                chunk_index: chunk_index.max(0) as usize,
                content: row.get("content"),
                topic: row.get("topic"),
                technical_level: row.get("technical_level"),
                embedding: serde_json::from_str(&embedding)
                    .map_err(|e| Error::Internal(format!("Failed to deserialize embedding: {}", e)))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cip_common::db::init_memory_database;

    fn chunk(document: &str, index: usize) -> CorpusChunk {
        CorpusChunk {
            document: document.to_string(),
            chunk_index: index,
            content: format!("{} chunk {}", document, index),
            topic: "dmarc".to_string(),
            technical_level: "intermediate".to_string(),
            embedding: vec![0.6, 0.8],
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_chunk() {
        let pool = init_memory_database().await.unwrap();
        let chunks = vec![chunk("guide.md", 0), chunk("guide.md", 1)];

        assert_eq!(insert_chunks(&pool, &chunks, 1000).await.unwrap(), 2);
        assert_eq!(insert_chunks(&pool, &chunks, 1000).await.unwrap(), 0);
        assert_eq!(count_chunks(&pool).await.unwrap(), 2);

        let loaded = load_chunks(&pool).await.unwrap();
        assert_eq!(loaded, chunks);
    }
}
