use crate::database::DbError;
use crate::database::face::PersonMatch;
use crate::database::person::{NewGuest, Person, PersonTarget};
use pgvector::Vector;
use sqlx::postgres::PgQueryResult;
use sqlx::{Executor, FromRow, PgConnection, Postgres};

#[derive(FromRow)]
struct PersonDistanceRow {
    #[sqlx(flatten)]
    person: Person,
    distance: f32,
}

pub struct PersonStore;

impl PersonStore {
    //================================================================================
    // Roster
    //================================================================================

    /// Inserts a guest or updates the one with the same contact handle.
    pub async fn upsert_guest(
        executor: impl Executor<'_, Database = Postgres>,
        guest: &NewGuest,
    ) -> Result<Person, DbError> {
        Ok(sqlx::query_as::<_, Person>(
            r"
            INSERT INTO person (name, contact_handle, seat_label)
            VALUES ($1, $2, $3)
            ON CONFLICT (contact_handle) DO UPDATE
                SET name       = EXCLUDED.name,
                    seat_label = COALESCE(EXCLUDED.seat_label, person.seat_label),
                    updated_at = now()
            RETURNING id, name, contact_handle, seat_label, created_at, updated_at
            ",
        )
        .bind(&guest.name)
        .bind(guest.contact.as_str())
        .bind(&guest.seat_label)
        .fetch_one(executor)
        .await?)
    }

    /// Finds the person with exactly this display name or creates one.
    ///
    /// Takes a transaction-scoped advisory lock on the name so two concurrent
    /// namings can't both create it.
    pub async fn find_or_create_by_name(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<Person, DbError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        let mut existing = sqlx::query_as::<_, Person>(
            r"
            SELECT id, name, contact_handle, seat_label, created_at, updated_at
            FROM person
            WHERE name = $1
            ORDER BY id
            LIMIT 2
            ",
        )
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;

        match existing.len() {
            0 => Ok(sqlx::query_as::<_, Person>(
                r"
                INSERT INTO person (name)
                VALUES ($1)
                RETURNING id, name, contact_handle, seat_label, created_at, updated_at
                ",
            )
            .bind(name)
            .fetch_one(&mut *conn)
            .await?),
            1 => Ok(existing.remove(0)),
            _ => Err(DbError::AmbiguousName(name.to_owned())),
        }
    }

    pub async fn resolve(conn: &mut PgConnection, target: &PersonTarget) -> Result<Person, DbError> {
        match target {
            PersonTarget::Named(name) => Self::find_or_create_by_name(conn, name).await,
            PersonTarget::Guest(guest) => Self::upsert_guest(&mut *conn, guest).await,
        }
    }

    pub async fn delete(
        executor: impl Executor<'_, Database = Postgres>,
        person_id: i64,
    ) -> Result<PgQueryResult, DbError> {
        Ok(sqlx::query("DELETE FROM person WHERE id = $1")
            .bind(person_id)
            .execute(executor)
            .await?)
    }

    //================================================================================
    // Find / Get Methods
    //================================================================================

    pub async fn list(
        executor: impl Executor<'_, Database = Postgres>,
    ) -> Result<Vec<Person>, DbError> {
        Ok(sqlx::query_as::<_, Person>(
            r"
            SELECT id, name, contact_handle, seat_label, created_at, updated_at
            FROM person
            ORDER BY name NULLS LAST, id
            ",
        )
        .fetch_all(executor)
        .await?)
    }

    pub async fn find_by_ids(
        executor: impl Executor<'_, Database = Postgres>,
        person_ids: &[i64],
    ) -> Result<Vec<Person>, DbError> {
        Ok(sqlx::query_as::<_, Person>(
            r"
            SELECT id, name, contact_handle, seat_label, created_at, updated_at
            FROM person
            WHERE id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(person_ids)
        .fetch_all(executor)
        .await?)
    }

    /// Person of the closest labeled face strictly within `max_distance`.
    pub async fn nearest(
        executor: impl Executor<'_, Database = Postgres>,
        embedding: &Vector,
        max_distance: f32,
    ) -> Result<Option<PersonMatch>, DbError> {
        let row = sqlx::query_as::<_, PersonDistanceRow>(
            r"
            SELECT p.id, p.name, p.contact_handle, p.seat_label, p.created_at, p.updated_at,
                   (f.embedding <-> $1)::real AS distance
            FROM face f
            JOIN person p ON p.id = f.person_id
            WHERE f.embedding <-> $1 < $2
            ORDER BY f.embedding <-> $1, f.id
            LIMIT 1
            ",
        )
        .bind(embedding)
        .bind(f64::from(max_distance))
        .fetch_optional(executor)
        .await?;

        Ok(row.map(|r| PersonMatch {
            person: r.person,
            distance: r.distance,
        }))
    }
}
