use crate::database::DbError;
use crate::database::photo::{NewPhoto, Photo, PhotoMatch};
use pgvector::Vector;
use sqlx::{Executor, Postgres};

pub struct PhotoStore;

impl PhotoStore {
    pub async fn insert(
        executor: impl Executor<'_, Database = Postgres>,
        photo: &NewPhoto,
    ) -> Result<Photo, DbError> {
        Ok(sqlx::query_as::<_, Photo>(
            r"
            INSERT INTO photo (url, storage_key, original_url, original_storage_key, status, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, url, storage_key, original_url, original_storage_key, status, width, height, created_at
            ",
        )
        .bind(&photo.url)
        .bind(&photo.storage_key)
        .bind(&photo.original_url)
        .bind(&photo.original_storage_key)
        .bind(photo.status)
        .bind(photo.width)
        .bind(photo.height)
        .fetch_one(executor)
        .await?)
    }

    pub async fn find_by_id(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: i64,
    ) -> Result<Option<Photo>, DbError> {
        Ok(sqlx::query_as::<_, Photo>(
            r"
            SELECT id, url, storage_key, original_url, original_storage_key, status, width, height, created_at
            FROM photo
            WHERE id = $1
            ",
        )
        .bind(photo_id)
        .fetch_optional(executor)
        .await?)
    }

    /// All completed event photos, newest first.
    pub async fn list_completed(
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<Vec<Photo>, DbError> {
        Ok(sqlx::query_as::<_, Photo>(
            r"
            SELECT id, url, storage_key, original_url, original_storage_key, status, width, height, created_at
            FROM photo
            WHERE status = 'COMPLETED'
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(executor)
        .await?)
    }

    /// Deletes a photo; its faces go with it through `ON DELETE CASCADE`.
    pub async fn delete(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: i64,
    ) -> Result<Option<Photo>, DbError> {
        Ok(sqlx::query_as::<_, Photo>(
            r"
            DELETE FROM photo
            WHERE id = $1
            RETURNING id, url, storage_key, original_url, original_storage_key, status, width, height, created_at
            ",
        )
        .bind(photo_id)
        .fetch_optional(executor)
        .await?)
    }

    /// Completed photos containing a face strictly within `max_distance`, ranked by
    /// their closest face.
    pub async fn matching(
        executor: impl Executor<'_, Database = Postgres>,
        embedding: &Vector,
        max_distance: f32,
        limit: usize,
    ) -> Result<Vec<PhotoMatch>, DbError> {
        Ok(sqlx::query_as::<_, PhotoMatch>(
            r"
            SELECT p.id, p.url, p.storage_key, p.original_url, p.original_storage_key,
                   p.status, p.width, p.height, p.created_at,
                   m.distance
            FROM (
                SELECT f.photo_id, MIN(f.embedding <-> $1)::real AS distance
                FROM face f
                WHERE f.embedding <-> $1 < $2
                GROUP BY f.photo_id
            ) m
            JOIN photo p ON p.id = m.photo_id
            WHERE p.status = 'COMPLETED'
            ORDER BY m.distance, p.id
            LIMIT $3
            ",
        )
        .bind(embedding)
        .bind(f64::from(max_distance))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(executor)
        .await?)
    }
}
