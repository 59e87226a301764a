//! Client and project repository
//!
//! Clients and projects are owned by other parts of the business; billing
//! reads them to take client snapshots. The write methods exist for seeding
//! and for keeping the live client profile up to date.

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Repository for clients and their projects
#[derive(Debug, Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a client profile
    pub async fn upsert_client(&self, client: &ClientRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO clients (client_id, full_name, address, phone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (client_id) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                updated_at = now()
            "#,
        )
        .bind(client.client_id)
        .bind(&client.full_name)
        .bind(&client.address)
        .bind(&client.phone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a project for an existing client
    pub async fn insert_project(&self, project: &ProjectRow) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO projects (project_id, client_id, name) VALUES ($1, $2, $3)")
            .bind(project.project_id)
            .bind(project.client_id)
            .bind(&project.name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Changes the live address of a client
    pub async fn update_client_address(&self, client_id: Uuid, address: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE clients SET address = $2, updated_at = now() WHERE client_id = $1")
            .bind(client_id)
            .bind(address)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Client", client_id));
        }
        Ok(())
    }

    /// Loads a project joined with its client's current profile
    pub async fn find_with_client(&self, project_id: Uuid) -> Result<Option<ProjectWithClientRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ProjectWithClientRow>(
            r#"
            SELECT
                p.project_id,
                p.name AS project_name,
                c.client_id,
                c.full_name,
                c.address,
                c.phone
            FROM projects p
            JOIN clients c ON c.client_id = p.client_id
            WHERE p.project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

/// Database row of a client
#[derive(Debug, Clone, FromRow)]
pub struct ClientRow {
    pub client_id: Uuid,
    pub full_name: String,
    pub address: String,
    pub phone: String,
}

/// Database row of a project
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
}

/// A project joined with its client
#[derive(Debug, Clone, FromRow)]
pub struct ProjectWithClientRow {
    pub project_id: Uuid,
    pub project_name: String,
    pub client_id: Uuid,
    pub full_name: String,
    pub address: String,
    pub phone: String,
}
