use crate::database::DbError;
use crate::database::face::{Face, FaceRow, NewFace};
use pgvector::Vector;
use sqlx::{Executor, Postgres};

fn into_faces(rows: Vec<FaceRow>) -> Result<Vec<Face>, DbError> {
    let mut faces = rows
        .into_iter()
        .map(Face::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    faces.sort_by_key(|f| f.id);
    Ok(faces)
}

pub struct FaceStore;

impl FaceStore {
    /// Inserts one face of `photo_id` and returns it with its new id.
    pub async fn insert(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: i64,
        face: &NewFace,
    ) -> Result<Face, DbError> {
        let row = sqlx::query_as::<_, FaceRow>(
            r"
            INSERT INTO face (photo_id, person_id, x1, y1, x2, y2, confidence, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, photo_id, person_id, x1, y1, x2, y2, confidence, embedding, created_at
            ",
        )
        .bind(photo_id)
        .bind(face.person_id)
        .bind(face.bounding_box.x1)
        .bind(face.bounding_box.y1)
        .bind(face.bounding_box.x2)
        .bind(face.bounding_box.y2)
        .bind(face.confidence)
        .bind(Vector::from(face.embedding.as_slice().to_vec()))
        .fetch_one(executor)
        .await?;
        row.try_into()
    }

    pub async fn find_by_id(
        executor: impl Executor<'_, Database = Postgres>,
        face_id: i64,
    ) -> Result<Option<Face>, DbError> {
        sqlx::query_as::<_, FaceRow>(
            r"
            SELECT id, photo_id, person_id, x1, y1, x2, y2, confidence, embedding, created_at
            FROM face
            WHERE id = $1
            ",
        )
        .bind(face_id)
        .fetch_optional(executor)
        .await?
        .map(Face::try_from)
        .transpose()
    }

    /// Same as [`FaceStore::find_by_id`] but row-locks the face until the transaction ends.
    pub async fn find_by_id_for_update(
        executor: impl Executor<'_, Database = Postgres>,
        face_id: i64,
    ) -> Result<Option<Face>, DbError> {
        sqlx::query_as::<_, FaceRow>(
            r"
            SELECT id, photo_id, person_id, x1, y1, x2, y2, confidence, embedding, created_at
            FROM face
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(face_id)
        .fetch_optional(executor)
        .await?
        .map(Face::try_from)
        .transpose()
    }

    pub async fn for_photo(
        executor: impl Executor<'_, Database = Postgres>,
        photo_id: i64,
    ) -> Result<Vec<Face>, DbError> {
        let rows = sqlx::query_as::<_, FaceRow>(
            r"
            SELECT id, photo_id, person_id, x1, y1, x2, y2, confidence, embedding, created_at
            FROM face
            WHERE photo_id = $1
            ORDER BY id
            ",
        )
        .bind(photo_id)
        .fetch_all(executor)
        .await?;
        into_faces(rows)
    }

    pub async fn set_person(
        executor: impl Executor<'_, Database = Postgres>,
        face_id: i64,
        person_id: i64,
    ) -> Result<Face, DbError> {
        sqlx::query_as::<_, FaceRow>(
            r"
            UPDATE face
            SET person_id = $1
            WHERE id = $2
            RETURNING id, photo_id, person_id, x1, y1, x2, y2, confidence, embedding, created_at
            ",
        )
        .bind(person_id)
        .bind(face_id)
        .fetch_one(executor)
        .await?
        .try_into()
    }

    /// Links every unlabeled face (other than `source_face_id`) strictly within
    /// `max_distance` of `embedding` to `person_id`.
    ///
    /// The `person_id IS NULL` guard is re-evaluated against the latest row version
    /// when a concurrent transaction got there first, so a face is never claimed twice
    /// and labeled faces are never reassigned.
    pub async fn claim_unlabeled_near(
        executor: impl Executor<'_, Database = Postgres>,
        person_id: i64,
        embedding: &Vector,
        source_face_id: i64,
        max_distance: f32,
    ) -> Result<Vec<Face>, DbError> {
        let rows = sqlx::query_as::<_, FaceRow>(
            r"
            UPDATE face
            SET person_id = $1
            WHERE person_id IS NULL
              AND id <> $2
              AND embedding <-> $3 < $4
            RETURNING id, photo_id, person_id, x1, y1, x2, y2, confidence, embedding, created_at
            ",
        )
        .bind(person_id)
        .bind(source_face_id)
        .bind(embedding)
        .bind(f64::from(max_distance))
        .fetch_all(executor)
        .await?;
        into_faces(rows)
    }
}
