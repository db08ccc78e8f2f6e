//! PostgreSQL dialplan store backed by sqlx
//!
//! Schema (created by [`PostgresDialplanStore::migrate`]):
//!
//! ```sql
//! inbound_routes(phone_number PK, tenant_id, active_dialplan_id,
//!                off_hours_dialplan_id, failsafe_dialplan_id,
//!                is_maintenance_mode, default_language_code)
//! dialplans(id PK, tenant_id, description, action, action_data JSONB)
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};

use super::{reserved_plans, tenant_filter, DialplanStore};
use crate::config::{DialplanConfig, ResolutionConfig};
use crate::{Plan, Result, RoutingRecord};

const ROUTE_COLUMNS: &str = "phone_number, tenant_id, active_dialplan_id, off_hours_dialplan_id, \
     failsafe_dialplan_id, is_maintenance_mode, default_language_code";

const PLAN_COLUMNS: &str = "id, tenant_id, description, action, action_data";

/// PostgreSQL store
#[derive(Clone)]
pub struct PostgresDialplanStore {
    pool: PgPool,
}

impl PostgresDialplanStore {
    /// Connect using the pool settings from the service configuration
    pub async fn connect(config: &DialplanConfig) -> Result<Self> {
        info!("🗄️ Connecting to dialplan database");

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(config.database_connect_timeout())
            .max_lifetime(Duration::from_secs(3600))
            .idle_timeout(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await?;

        let store = Self { pool };
        store.health_check().await?;

        info!("✅ Dialplan database connection established");
        Ok(store)
    }

    /// Create tables if needed and seed the reserved plans
    pub async fn migrate(&self, resolution: &ResolutionConfig) -> Result<()> {
        debug!("📋 Ensuring dialplan schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dialplans (
                id TEXT PRIMARY KEY,
                tenant_id TEXT,
                description TEXT,
                action TEXT,
                action_data JSONB
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS inbound_routes (
                phone_number TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                active_dialplan_id TEXT,
                off_hours_dialplan_id TEXT,
                failsafe_dialplan_id TEXT,
                is_maintenance_mode BOOLEAN NOT NULL DEFAULT FALSE,
                default_language_code TEXT NOT NULL DEFAULT 'tr'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_inbound_routes_tenant ON inbound_routes (tenant_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_dialplans_tenant ON dialplans (tenant_id)")
            .execute(&self.pool)
            .await?;

        for plan in reserved_plans(resolution) {
            let seeded = sqlx::query(
                "INSERT INTO dialplans (id, tenant_id, description, action, action_data) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
            )
            .bind(&plan.id)
            .bind(&plan.tenant_id)
            .bind(&plan.description)
            .bind(&plan.action)
            .bind(Json(&plan.action_parameters))
            .execute(&self.pool)
            .await?;

            if seeded.rows_affected() > 0 {
                info!(plan_id = %plan.id, "🌱 Seeded reserved dialplan");
            }
        }

        debug!("✅ Dialplan schema ready");
        Ok(())
    }

    fn route_from_row(row: &PgRow) -> Result<RoutingRecord> {
        let mut route = RoutingRecord {
            phone_number: row.try_get("phone_number")?,
            tenant_id: row.try_get("tenant_id")?,
            active_plan_id: row.try_get("active_dialplan_id")?,
            off_hours_plan_id: row.try_get("off_hours_dialplan_id")?,
            failsafe_plan_id: row.try_get("failsafe_dialplan_id")?,
            is_maintenance_mode: row.try_get("is_maintenance_mode")?,
            default_language_code: row.try_get("default_language_code")?,
        };
        route.normalize_plan_refs();
        Ok(route)
    }

    fn plan_from_row(row: &PgRow) -> Result<Plan> {
        let tenant_id: Option<String> = row.try_get("tenant_id")?;
        let description: Option<String> = row.try_get("description")?;
        let action: Option<String> = row.try_get("action")?;
        let action_data: Option<serde_json::Value> = row.try_get("action_data")?;

        Ok(Plan {
            id: row.try_get("id")?,
            tenant_id: tenant_id.unwrap_or_default(),
            description: description.unwrap_or_default(),
            action: action.unwrap_or_default(),
            action_parameters: action_parameters_from_json(action_data),
        })
    }
}

/// Decode `action_data` leniently: anything that is not a JSON object yields
/// no parameters, non-string values are kept in their JSON text form.
fn action_parameters_from_json(value: Option<serde_json::Value>) -> BTreeMap<String, String> {
    match value {
        Some(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[async_trait]
impl DialplanStore for PostgresDialplanStore {
    async fn find_route(&self, phone_number: &str) -> Result<Option<RoutingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inbound_routes WHERE phone_number = $1",
            ROUTE_COLUMNS
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::route_from_row).transpose()
    }

    async fn create_route(&self, route: &RoutingRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO inbound_routes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            ROUTE_COLUMNS
        ))
        .bind(&route.phone_number)
        .bind(&route.tenant_id)
        .bind(&route.active_plan_id)
        .bind(&route.off_hours_plan_id)
        .bind(&route.failsafe_plan_id)
        .bind(route.is_maintenance_mode)
        .bind(&route.default_language_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_route_if_absent(&self, route: &RoutingRecord) -> Result<RoutingRecord> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO inbound_routes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (phone_number) DO NOTHING",
            ROUTE_COLUMNS
        ))
        .bind(&route.phone_number)
        .bind(&route.tenant_id)
        .bind(&route.active_plan_id)
        .bind(&route.off_hours_plan_id)
        .bind(&route.failsafe_plan_id)
        .bind(route.is_maintenance_mode)
        .bind(&route.default_language_code)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            return Ok(route.clone());
        }

        // Lost the race; hand back whatever the winner stored
        self.find_route(&route.phone_number)
            .await?
            .ok_or_else(|| crate::DialplanError::internal(format!(
                "inbound route {} vanished after conflicting insert",
                route.phone_number
            )))
    }

    async fn update_route(&self, route: &RoutingRecord) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE inbound_routes SET tenant_id = $2, active_dialplan_id = $3, off_hours_dialplan_id = $4, \
             failsafe_dialplan_id = $5, is_maintenance_mode = $6, default_language_code = $7 \
             WHERE phone_number = $1",
        )
        .bind(&route.phone_number)
        .bind(&route.tenant_id)
        .bind(&route.active_plan_id)
        .bind(&route.off_hours_plan_id)
        .bind(&route.failsafe_plan_id)
        .bind(route.is_maintenance_mode)
        .bind(&route.default_language_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_route(&self, phone_number: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM inbound_routes WHERE phone_number = $1")
            .bind(phone_number)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_routes(&self, tenant_id: Option<&str>, limit: u32, offset: u32) -> Result<Vec<RoutingRecord>> {
        let rows = match tenant_filter(tenant_id) {
            Some(tenant) => {
                sqlx::query(&format!(
                    "SELECT {} FROM inbound_routes WHERE tenant_id = $1 ORDER BY phone_number LIMIT $2 OFFSET $3",
                    ROUTE_COLUMNS
                ))
                .bind(tenant)
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM inbound_routes ORDER BY phone_number LIMIT $1 OFFSET $2",
                    ROUTE_COLUMNS
                ))
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::route_from_row).collect()
    }

    async fn count_routes(&self, tenant_id: Option<&str>) -> Result<u64> {
        let count: i64 = match tenant_filter(tenant_id) {
            Some(tenant) => {
                sqlx::query_scalar("SELECT count(*) FROM inbound_routes WHERE tenant_id = $1")
                    .bind(tenant)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT count(*) FROM inbound_routes")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }

    async fn find_plan(&self, id: &str) -> Result<Option<Plan>> {
        let row = sqlx::query(&format!("SELECT {} FROM dialplans WHERE id = $1", PLAN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::plan_from_row).transpose()
    }

    async fn create_plan(&self, plan: &Plan) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO dialplans ({}) VALUES ($1, $2, $3, $4, $5)",
            PLAN_COLUMNS
        ))
        .bind(&plan.id)
        .bind(&plan.tenant_id)
        .bind(&plan.description)
        .bind(&plan.action)
        .bind(Json(&plan.action_parameters))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_plan(&self, plan: &Plan) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE dialplans SET tenant_id = $2, description = $3, action = $4, action_data = $5 WHERE id = $1",
        )
        .bind(&plan.id)
        .bind(&plan.tenant_id)
        .bind(&plan.description)
        .bind(&plan.action)
        .bind(Json(&plan.action_parameters))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_plan(&self, id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dialplans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_plans(&self, tenant_id: Option<&str>, limit: u32, offset: u32) -> Result<Vec<Plan>> {
        let rows = match tenant_filter(tenant_id) {
            Some(tenant) => {
                sqlx::query(&format!(
                    "SELECT {} FROM dialplans WHERE tenant_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
                    PLAN_COLUMNS
                ))
                .bind(tenant)
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM dialplans ORDER BY id LIMIT $1 OFFSET $2", PLAN_COLUMNS))
                    .bind(i64::from(limit))
                    .bind(i64::from(offset))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(Self::plan_from_row).collect()
    }

    async fn count_plans(&self, tenant_id: Option<&str>) -> Result<u64> {
        let count: i64 = match tenant_filter(tenant_id) {
            Some(tenant) => {
                sqlx::query_scalar("SELECT count(*) FROM dialplans WHERE tenant_id = $1")
                    .bind(tenant)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT count(*) FROM dialplans")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_data_decoding() {
        let params = action_parameters_from_json(Some(json!({
            "announcement_id": "ANNOUNCE_WELCOME",
            "timeout": 30,
        })));
        assert_eq!(params.get("announcement_id").map(String::as_str), Some("ANNOUNCE_WELCOME"));
        assert_eq!(params.get("timeout").map(String::as_str), Some("30"));

        assert!(action_parameters_from_json(Some(json!(["not", "a", "map"]))).is_empty());
        assert!(action_parameters_from_json(None).is_empty());
    }
}
