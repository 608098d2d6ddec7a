//! # Catalog Repository
//!
//! Loads presets and resources into an immutable [`CatalogSnapshot`].
//!
//! ## Snapshot Loading
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  load_snapshot("brochure")                              │
//! │                                                                         │
//! │  BEGIN (one read transaction, consistent view)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  presets + preset_custom_fields + stages + stage_variants               │
//! │       │                                                                 │
//! │       │  queue = every resource a stage variant points at               │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │  while let Some(ref) = queue.pop_front()                        │    │
//! │  │     resources + resource_variants (+ detail_components)         │    │
//! │  │     push every component ref not seen yet                       │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT → CatalogSnapshot (never touches the DB again)                  │
//! │                                                                         │
//! │  A referenced resource that does not exist is left out of the           │
//! │  snapshot. The engine reports it as UNKNOWN_RESOURCE with the stage.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{parse_decimal, parse_optional_decimal};
use crate::error::{DbError, DbResult};
use printcost_core::catalog::{
    CustomFieldDef, DetailComponent, FieldType, FormulaSpec, MatchCriteria, Preset, Resource,
    ResourceKind, ResourceRef, ResourceVariant, Stage, StageVariant, VariantCost,
};
use printcost_core::validation::{validate_preset, validate_resource};
use printcost_core::{CatalogSnapshot, Currency, FieldValue, Money};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PresetRow {
    id: String,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomFieldRow {
    code: String,
    name: String,
    field_type: FieldType,
    required: bool,
    default_value: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct StageRow {
    id: String,
    name: String,
    formula_kind: String,
    coefficient: Option<String>,
    constant: Option<String>,
    field_code: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct StageVariantRow {
    stage_id: String,
    id: String,
    name: String,
    criteria: String,
    resource_kind: ResourceKind,
    resource_id: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ResourceRow {
    kind: ResourceKind,
    id: String,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ResourceVariantRow {
    id: String,
    name: String,
    criteria: String,
    price_amount: Option<String>,
    price_currency: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ComponentRow {
    variant_id: String,
    component_kind: ResourceKind,
    component_id: String,
    quantity: String,
}

fn parse_criteria(raw: &str) -> DbResult<MatchCriteria> {
    serde_json::from_str(raw).map_err(|e| DbError::invalid_data("criteria", e))
}

fn to_json<T: serde::Serialize>(column: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::invalid_data(column, e))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads and the seed/test write helpers.
///
/// ## Usage
/// ```rust,ignore
/// let repo = CatalogRepository::new(pool);
/// let snapshot = repo.load_snapshot("flyer").await?;
/// let breakdown = engine.calculate(&snapshot, &ctx)?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Loads a preset and every resource reachable from it.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - No preset with this id
    /// * `DbError::InvalidData` - A stored decimal, currency or JSON column is corrupt
    pub async fn load_snapshot(&self, preset_id: &str) -> DbResult<CatalogSnapshot> {
        let mut tx = self.pool.begin().await?;

        let preset = fetch_preset(&mut tx, preset_id)
            .await?
            .ok_or_else(|| DbError::not_found("Preset", preset_id))?;

        let mut seen: HashSet<ResourceRef> = HashSet::new();
        let mut queue: VecDeque<ResourceRef> = preset.referenced_resources().into();
        let mut resources = Vec::new();

        while let Some(reference) = queue.pop_front() {
            if !seen.insert(reference.clone()) {
                continue;
            }

            let Some(resource) = fetch_resource(&mut tx, &reference).await? else {
                debug!(preset_id = %preset_id, resource = %reference, "Referenced resource missing");
                continue;
            };

            for variant in &resource.variants {
                if let VariantCost::Components { components } = &variant.cost {
                    queue.extend(
                        components
                            .iter()
                            .filter(|c| !seen.contains(&c.resource))
                            .map(|c| c.resource.clone()),
                    );
                }
            }
            resources.push(resource);
        }

        tx.commit().await?;

        debug!(
            preset_id = %preset_id,
            stages = preset.stages.len(),
            resources = resources.len(),
            "Catalog snapshot loaded"
        );

        Ok(CatalogSnapshot::new(preset, resources))
    }

    /// Gets a preset with its stages and custom field declarations.
    pub async fn get_preset(&self, preset_id: &str) -> DbResult<Option<Preset>> {
        let mut conn = self.pool.acquire().await?;
        fetch_preset(&mut conn, preset_id).await
    }

    /// Gets a resource with its variants.
    pub async fn get_resource(&self, reference: &ResourceRef) -> DbResult<Option<Resource>> {
        let mut conn = self.pool.acquire().await?;
        fetch_resource(&mut conn, reference).await
    }

    /// Inserts a preset with all its stages, variants and field declarations.
    ///
    /// Stage variants may point at resources that do not exist yet.
    pub async fn insert_preset(&self, preset: &Preset) -> DbResult<()> {
        validate_preset(preset)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO presets (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&preset.id)
            .bind(&preset.name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for (position, field) in preset.custom_fields.iter().enumerate() {
            let default_value = field
                .default
                .as_ref()
                .map(|v| to_json("default_value", v))
                .transpose()?;

            sqlx::query(
                r#"
                INSERT INTO preset_custom_fields
                    (preset_id, code, name, field_type, required, default_value, position)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&preset.id)
            .bind(&field.code)
            .bind(&field.name)
            .bind(field.field_type)
            .bind(field.required)
            .bind(default_value)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (position, stage) in preset.stages.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO stages
                    (preset_id, id, name, position, formula_kind, coefficient, constant, field_code)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&preset.id)
            .bind(&stage.id)
            .bind(&stage.name)
            .bind(position as i64)
            .bind(&stage.formula.kind)
            .bind(stage.formula.coefficient.map(|d| d.to_string()))
            .bind(stage.formula.constant.map(|d| d.to_string()))
            .bind(&stage.formula.field)
            .execute(&mut *tx)
            .await?;

            for (variant_position, variant) in stage.variants.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO stage_variants
                        (preset_id, stage_id, id, name, position, criteria, resource_kind, resource_id)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&preset.id)
                .bind(&stage.id)
                .bind(&variant.id)
                .bind(&variant.name)
                .bind(variant_position as i64)
                .bind(to_json("criteria", &variant.criteria)?)
                .bind(variant.resource.kind)
                .bind(&variant.resource.id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(preset_id = %preset.id, stages = preset.stages.len(), "Preset inserted");
        Ok(())
    }

    /// Inserts a resource with its variants (and detail components).
    pub async fn insert_resource(&self, resource: &Resource) -> DbResult<()> {
        validate_resource(resource)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO resources (kind, id, name) VALUES (?, ?, ?)")
            .bind(resource.kind)
            .bind(&resource.id)
            .bind(&resource.name)
            .execute(&mut *tx)
            .await?;

        for (position, variant) in resource.variants.iter().enumerate() {
            let (amount, currency) = match &variant.cost {
                VariantCost::Unit { price } => (
                    Some(price.amount().to_string()),
                    Some(price.currency().code().to_string()),
                ),
                VariantCost::Components { .. } => (None, None),
            };

            sqlx::query(
                r#"
                INSERT INTO resource_variants
                    (resource_kind, resource_id, id, name, position, criteria, price_amount, price_currency)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(resource.kind)
            .bind(&resource.id)
            .bind(&variant.id)
            .bind(&variant.name)
            .bind(position as i64)
            .bind(to_json("criteria", &variant.criteria)?)
            .bind(amount)
            .bind(currency)
            .execute(&mut *tx)
            .await?;

            if let VariantCost::Components { components } = &variant.cost {
                for (component_position, component) in components.iter().enumerate() {
                    sqlx::query(
                        r#"
                        INSERT INTO detail_components
                            (resource_kind, resource_id, variant_id, position,
                             component_kind, component_id, quantity)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(resource.kind)
                    .bind(&resource.id)
                    .bind(&variant.id)
                    .bind(component_position as i64)
                    .bind(component.resource.kind)
                    .bind(&component.resource.id)
                    .bind(component.quantity.to_string())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        info!(resource = %resource.reference(), variants = resource.variants.len(), "Resource inserted");
        Ok(())
    }
}

// =============================================================================
// Row Assembly
// =============================================================================

async fn fetch_preset(conn: &mut SqliteConnection, preset_id: &str) -> DbResult<Option<Preset>> {
    let Some(row) = sqlx::query_as::<_, PresetRow>("SELECT id, name FROM presets WHERE id = ?")
        .bind(preset_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let field_rows = sqlx::query_as::<_, CustomFieldRow>(
        r#"
        SELECT code, name, field_type, required, default_value
        FROM preset_custom_fields
        WHERE preset_id = ?
        ORDER BY position
        "#,
    )
    .bind(preset_id)
    .fetch_all(&mut *conn)
    .await?;

    let stage_rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, name, formula_kind, coefficient, constant, field_code
        FROM stages
        WHERE preset_id = ?
        ORDER BY position
        "#,
    )
    .bind(preset_id)
    .fetch_all(&mut *conn)
    .await?;

    let variant_rows = sqlx::query_as::<_, StageVariantRow>(
        r#"
        SELECT stage_id, id, name, criteria, resource_kind, resource_id
        FROM stage_variants
        WHERE preset_id = ?
        ORDER BY stage_id, position
        "#,
    )
    .bind(preset_id)
    .fetch_all(&mut *conn)
    .await?;

    let custom_fields = field_rows
        .into_iter()
        .map(|r| {
            let default = r
                .default_value
                .as_deref()
                .map(serde_json::from_str::<FieldValue>)
                .transpose()
                .map_err(|e| DbError::invalid_data("default_value", e))?;
            Ok(CustomFieldDef {
                code: r.code,
                name: r.name,
                field_type: r.field_type,
                required: r.required,
                default,
            })
        })
        .collect::<DbResult<Vec<_>>>()?;

    let mut stages = stage_rows
        .into_iter()
        .map(|r| {
            Ok(Stage {
                formula: FormulaSpec {
                    kind: r.formula_kind,
                    coefficient: parse_optional_decimal("coefficient", r.coefficient.as_deref())?,
                    constant: parse_optional_decimal("constant", r.constant.as_deref())?,
                    field: r.field_code,
                },
                id: r.id,
                name: r.name,
                variants: Vec::new(),
            })
        })
        .collect::<DbResult<Vec<_>>>()?;

    for r in variant_rows {
        let criteria = parse_criteria(&r.criteria)?;
        if let Some(stage) = stages.iter_mut().find(|s| s.id == r.stage_id) {
            stage.variants.push(StageVariant {
                id: r.id,
                name: r.name,
                criteria,
                resource: ResourceRef::new(r.resource_kind, r.resource_id),
            });
        }
    }

    Ok(Some(Preset {
        id: row.id,
        name: row.name,
        stages,
        custom_fields,
    }))
}

async fn fetch_resource(
    conn: &mut SqliteConnection,
    reference: &ResourceRef,
) -> DbResult<Option<Resource>> {
    let Some(row) =
        sqlx::query_as::<_, ResourceRow>("SELECT kind, id, name FROM resources WHERE kind = ? AND id = ?")
            .bind(reference.kind)
            .bind(&reference.id)
            .fetch_optional(&mut *conn)
            .await?
    else {
        return Ok(None);
    };

    let variant_rows = sqlx::query_as::<_, ResourceVariantRow>(
        r#"
        SELECT id, name, criteria, price_amount, price_currency
        FROM resource_variants
        WHERE resource_kind = ? AND resource_id = ?
        ORDER BY position
        "#,
    )
    .bind(reference.kind)
    .bind(&reference.id)
    .fetch_all(&mut *conn)
    .await?;

    let component_rows = if row.kind == ResourceKind::Detail {
        sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT variant_id, component_kind, component_id, quantity
            FROM detail_components
            WHERE resource_kind = ? AND resource_id = ?
            ORDER BY variant_id, position
            "#,
        )
        .bind(reference.kind)
        .bind(&reference.id)
        .fetch_all(&mut *conn)
        .await?
    } else {
        Vec::new()
    };

    let mut variants = Vec::with_capacity(variant_rows.len());
    for r in variant_rows {
        let cost = if row.kind == ResourceKind::Detail {
            let components = component_rows
                .iter()
                .filter(|c| c.variant_id == r.id)
                .map(|c| {
                    Ok(DetailComponent {
                        resource: ResourceRef::new(c.component_kind, c.component_id.clone()),
                        quantity: parse_decimal("quantity", &c.quantity)?,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?;
            VariantCost::Components { components }
        } else {
            VariantCost::Unit {
                price: unit_price(&r)?,
            }
        };

        variants.push(ResourceVariant {
            criteria: parse_criteria(&r.criteria)?,
            id: r.id,
            name: r.name,
            cost,
        });
    }

    Ok(Some(Resource {
        id: row.id,
        kind: row.kind,
        name: row.name,
        variants,
    }))
}

fn unit_price(row: &ResourceVariantRow) -> DbResult<Money> {
    let amount: Decimal = match row.price_amount.as_deref() {
        Some(raw) => parse_decimal("price_amount", raw)?,
        None => return Err(DbError::invalid_data("price_amount", format!("missing for variant {}", row.id))),
    };
    let currency: Currency = match row.price_currency.as_deref() {
        Some(code) => code
            .parse()
            .map_err(|e| DbError::invalid_data("price_currency", e))?,
        None => return Err(DbError::invalid_data("price_currency", format!("missing for variant {}", row.id))),
    };
    Ok(Money::new(amount, currency))
}

// =============================================================================
// Tests
// =============================================================================
