use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::custody::Role;
use crate::error::{FarmChainError, FarmChainResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> FarmChainResult<DbPool> {
    // connect_lazy_with returns the pool immediately. It does not validate connection.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> FarmChainResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| FarmChainError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Disable);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> FarmChainResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database ready");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub location: Option<String>,
    pub role: String,
    pub farmer_id: Option<String>,
    pub distributor_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl User {
    pub fn role(&self) -> FarmChainResult<Role> {
        self.role
            .parse()
            .map_err(|_| FarmChainError::Internal(format!("Unknown role in users table: {}", self.role)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: i32,
    #[serde(skip_serializing)]
    pub user_id: i32,

    // Origin block, written by the owner only.
    pub name: String,
    pub crop_type: Option<String>,
    pub harvest_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub soil_type: Option<String>,
    pub pesticides_used: Option<String>,
    pub image_url: Option<String>,

    // Farmer custody block, stamped from the creator's profile.
    pub farmer_id: Option<String>,
    pub farmer_name: Option<String>,
    pub farmer_location: Option<String>,

    // Distributor custody block.
    pub distributor_id: Option<String>,
    pub distributor_name: Option<String>,
    pub distributor_location: Option<String>,
    pub distributor_received_date: Option<NaiveDate>,
    pub sent_to_retailer: Option<String>,
    pub retailer_location: Option<String>,

    // Retailer custody block.
    pub retailer_name: Option<String>,
    pub retailer_received_date: Option<NaiveDate>,
    pub received_from_distributor: Option<String>,
    pub distributor_location_retailer: Option<String>,

    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerPurchase {
    pub id: i32,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub crop_name: String,
    pub crop_type: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchased_from: Option<String>,
    pub retailer_location: Option<String>,
    pub farmer_id: Option<String>,
    pub farmer_name: Option<String>,
    pub distributor_id: Option<String>,
    pub distributor_name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

// ---- Identity registry lookups ----

const USER_COLUMNS: &str = "id, email, password_hash, name, location, role, farmer_id, distributor_id, created_at, updated_at";

pub async fn find_user_by_id(pool: &DbPool, id: i32) -> FarmChainResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_email(pool: &DbPool, email: &str) -> FarmChainResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Looks up a farmer by code. Filters on role so a numerically identical
/// distributor code can never match.
pub async fn find_farmer_by_code(pool: &DbPool, code: &str) -> FarmChainResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE farmer_id = $1 AND role = 'FARMER'"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_distributor_by_code(pool: &DbPool, code: &str) -> FarmChainResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE distributor_id = $1 AND role = 'DISTRIBUTOR'"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn email_exists(pool: &DbPool, email: &str) -> FarmChainResult<bool> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn insert_user(
    pool: &DbPool,
    email: &str,
    password_hash: &str,
    name: &str,
    location: Option<&str>,
    role: Role,
    farmer_id: Option<&str>,
    distributor_id: Option<&str>,
) -> FarmChainResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password_hash, name, location, role, farmer_id, distributor_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(location)
    .bind(role.as_str())
    .bind(farmer_id)
    .bind(distributor_id)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

// ---- Record store ----

const CROP_COLUMNS: &str = "id, user_id, name, crop_type, harvest_date, expiry_date, soil_type, \
    pesticides_used, image_url, farmer_id, farmer_name, farmer_location, distributor_id, \
    distributor_name, distributor_location, distributor_received_date, sent_to_retailer, \
    retailer_location, retailer_name, retailer_received_date, received_from_distributor, \
    distributor_location_retailer, created_at, updated_at";

pub async fn find_crop_by_id(pool: &DbPool, id: i32) -> FarmChainResult<Option<Crop>> {
    let crop = sqlx::query_as::<_, Crop>(&format!(
        "SELECT {CROP_COLUMNS} FROM crops WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(crop)
}

pub async fn find_crops_by_owner(pool: &DbPool, user_id: i32) -> FarmChainResult<Vec<Crop>> {
    let crops = sqlx::query_as::<_, Crop>(&format!(
        "SELECT {CROP_COLUMNS} FROM crops WHERE user_id = $1 ORDER BY id ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(crops)
}

pub async fn find_crops_by_farmer_code(pool: &DbPool, code: &str) -> FarmChainResult<Vec<Crop>> {
    let crops = sqlx::query_as::<_, Crop>(&format!(
        "SELECT {CROP_COLUMNS} FROM crops WHERE farmer_id = $1 ORDER BY id ASC"
    ))
    .bind(code)
    .fetch_all(pool)
    .await?;
    Ok(crops)
}

pub async fn find_crops_by_distributor_code(
    pool: &DbPool,
    code: &str,
) -> FarmChainResult<Vec<Crop>> {
    let crops = sqlx::query_as::<_, Crop>(&format!(
        "SELECT {CROP_COLUMNS} FROM crops WHERE distributor_id = $1 ORDER BY id ASC"
    ))
    .bind(code)
    .fetch_all(pool)
    .await?;
    Ok(crops)
}

/// First save: the store assigns the id and both timestamps.
pub async fn insert_crop(pool: &DbPool, crop: &Crop) -> FarmChainResult<Crop> {
    let saved = sqlx::query_as::<_, Crop>(&format!(
        "INSERT INTO crops (user_id, name, crop_type, harvest_date, expiry_date, soil_type, \
            pesticides_used, image_url, farmer_id, farmer_name, farmer_location, distributor_id, \
            distributor_name, distributor_location, distributor_received_date, sent_to_retailer, \
            retailer_location, retailer_name, retailer_received_date, received_from_distributor, \
            distributor_location_retailer) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21) \
         RETURNING {CROP_COLUMNS}"
    ))
    .bind(crop.user_id)
    .bind(&crop.name)
    .bind(&crop.crop_type)
    .bind(crop.harvest_date)
    .bind(crop.expiry_date)
    .bind(&crop.soil_type)
    .bind(&crop.pesticides_used)
    .bind(&crop.image_url)
    .bind(&crop.farmer_id)
    .bind(&crop.farmer_name)
    .bind(&crop.farmer_location)
    .bind(&crop.distributor_id)
    .bind(&crop.distributor_name)
    .bind(&crop.distributor_location)
    .bind(crop.distributor_received_date)
    .bind(&crop.sent_to_retailer)
    .bind(&crop.retailer_location)
    .bind(&crop.retailer_name)
    .bind(crop.retailer_received_date)
    .bind(&crop.received_from_distributor)
    .bind(&crop.distributor_location_retailer)
    .fetch_one(pool)
    .await?;
    Ok(saved)
}

/// Every later save: the store refreshes updated_at, created_at is untouched.
pub async fn update_crop(pool: &DbPool, crop: &Crop) -> FarmChainResult<Crop> {
    let saved = sqlx::query_as::<_, Crop>(&format!(
        "UPDATE crops SET name = $2, crop_type = $3, harvest_date = $4, expiry_date = $5, \
            soil_type = $6, pesticides_used = $7, image_url = $8, farmer_id = $9, \
            farmer_name = $10, farmer_location = $11, distributor_id = $12, \
            distributor_name = $13, distributor_location = $14, distributor_received_date = $15, \
            sent_to_retailer = $16, retailer_location = $17, retailer_name = $18, \
            retailer_received_date = $19, received_from_distributor = $20, \
            distributor_location_retailer = $21, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {CROP_COLUMNS}"
    ))
    .bind(crop.id)
    .bind(&crop.name)
    .bind(&crop.crop_type)
    .bind(crop.harvest_date)
    .bind(crop.expiry_date)
    .bind(&crop.soil_type)
    .bind(&crop.pesticides_used)
    .bind(&crop.image_url)
    .bind(&crop.farmer_id)
    .bind(&crop.farmer_name)
    .bind(&crop.farmer_location)
    .bind(&crop.distributor_id)
    .bind(&crop.distributor_name)
    .bind(&crop.distributor_location)
    .bind(crop.distributor_received_date)
    .bind(&crop.sent_to_retailer)
    .bind(&crop.retailer_location)
    .bind(&crop.retailer_name)
    .bind(crop.retailer_received_date)
    .bind(&crop.received_from_distributor)
    .bind(&crop.distributor_location_retailer)
    .fetch_one(pool)
    .await?;
    Ok(saved)
}

/// Hard delete. Returns whether a row was removed so callers can map a miss
/// to NotFound. Purchase receipts hold copied values and are not touched.
pub async fn delete_crop_by_id(pool: &DbPool, id: i32) -> FarmChainResult<bool> {
    let result = sqlx::query("DELETE FROM crops WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---- Consumer purchase receipts ----

const PURCHASE_COLUMNS: &str = "id, user_id, crop_name, crop_type, purchase_date, purchased_from, \
    retailer_location, farmer_id, farmer_name, distributor_id, distributor_name, created_at, updated_at";

pub async fn find_purchases_by_user(
    pool: &DbPool,
    user_id: i32,
) -> FarmChainResult<Vec<ConsumerPurchase>> {
    let purchases = sqlx::query_as::<_, ConsumerPurchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM consumer_purchases WHERE user_id = $1 ORDER BY id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(purchases)
}

pub async fn insert_purchase(
    pool: &DbPool,
    purchase: &ConsumerPurchase,
) -> FarmChainResult<ConsumerPurchase> {
    let saved = sqlx::query_as::<_, ConsumerPurchase>(&format!(
        "INSERT INTO consumer_purchases (user_id, crop_name, crop_type, purchase_date, \
            purchased_from, retailer_location, farmer_id, farmer_name, distributor_id, \
            distributor_name) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {PURCHASE_COLUMNS}"
    ))
    .bind(purchase.user_id)
    .bind(&purchase.crop_name)
    .bind(&purchase.crop_type)
    .bind(purchase.purchase_date)
    .bind(&purchase.purchased_from)
    .bind(&purchase.retailer_location)
    .bind(&purchase.farmer_id)
    .bind(&purchase.farmer_name)
    .bind(&purchase.distributor_id)
    .bind(&purchase.distributor_name)
    .fetch_one(pool)
    .await?;
    Ok(saved)
}
