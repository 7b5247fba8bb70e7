#[cfg(test)]
mod tests {
    use axum::extract::{Json, Path, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Extension;

    use crate::commands::auth::{signup, SignupRequest};
    use crate::commands::crops::{create_crop, delete_crop, scan_crop, update_crop};
    use crate::commands::purchases::{create_purchase, get_user_purchases, PurchaseInput};
    use crate::custody::{CropInput, Role};
    use crate::db::{self, DbPool, User};
    use crate::error::FarmChainError;
    use crate::middleware::auth::Claims;
    use crate::state::AppState;

    async fn setup_test_db() -> DbPool {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::init_pool(&database_url)
            .await
            .expect("Failed to create pool");
        db::init_database(&pool).await.expect("Migrations failed");
        pool
    }

    fn claims_for(user: &User) -> Claims {
        Claims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role.clone(),
            exp: usize::MAX,
        }
    }

    async fn register(pool: &DbPool, tag: &str, role: &str) -> User {
        let email = format!(
            "{}-{}@integration.test",
            tag,
            chrono::Utc::now().timestamp_micros()
        );
        let state = AppState { pool: pool.clone() };
        signup(
            State(state),
            Json(SignupRequest {
                email: email.clone(),
                password: "secret123".to_string(),
                name: tag.to_string(),
                location: Some(format!("{} street", tag)),
                role: role.to_string(),
            }),
        )
        .await
        .expect("signup failed");

        db::find_user_by_email(pool, &email)
            .await
            .expect("lookup failed")
            .expect("registered user missing")
    }

    async fn cleanup(pool: &DbPool, crop_ids: &[i32], user_ids: &[i32]) {
        for id in crop_ids {
            let _ = sqlx::query("DELETE FROM crops WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await;
        }
        for id in user_ids {
            let _ = sqlx::query("DELETE FROM consumer_purchases WHERE user_id = $1")
                .bind(id)
                .execute(pool)
                .await;
            let _ = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await;
        }
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_integration() {
        let pool = setup_test_db().await;
        let user = register(&pool, "dup-check", "CONSUMER").await;

        let state = AppState { pool: pool.clone() };
        let second = signup(
            State(state),
            Json(SignupRequest {
                email: user.email.clone(),
                password: "another".to_string(),
                name: "imposter".to_string(),
                location: None,
                role: "FARMER".to_string(),
            }),
        )
        .await;

        assert!(matches!(second, Err(FarmChainError::DuplicateEmail)));

        // The first account remains queryable.
        let still_there = db::find_user_by_email(&pool, &user.email)
            .await
            .expect("lookup failed")
            .expect("first account vanished");
        assert_eq!(still_there.name, "dup-check");

        cleanup(&pool, &[], &[user.id]).await;
    }

    #[tokio::test]
    async fn test_role_code_assignment_integration() {
        let pool = setup_test_db().await;
        let farmer = register(&pool, "code-farmer", "FARMER").await;
        let consumer = register(&pool, "code-consumer", "CONSUMER").await;

        let code = farmer.farmer_id.clone().expect("farmer got no code");
        assert_eq!(code.len(), 3);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(farmer.distributor_id.is_none());
        assert!(consumer.farmer_id.is_none());
        assert!(consumer.distributor_id.is_none());

        // Exact-role lookup: the code resolves in the farmer partition only.
        let by_code = db::find_farmer_by_code(&pool, &code)
            .await
            .expect("lookup failed")
            .expect("farmer not found by code");
        assert_eq!(by_code.id, farmer.id);
        assert!(db::find_distributor_by_code(&pool, &code)
            .await
            .expect("lookup failed")
            .is_none());

        cleanup(&pool, &[], &[farmer.id, consumer.id]).await;
    }

    #[tokio::test]
    async fn test_crop_chain_integration() {
        let pool = setup_test_db().await;
        let alice = register(&pool, "alice", "FARMER").await;
        let bob = register(&pool, "bob", "DISTRIBUTOR").await;
        let carol = register(&pool, "carol", "RETAILER").await;

        let farmer_code = alice.farmer_id.clone().unwrap();

        // Farmer creates the crop; identity fields come from the profile
        // even though the payload claims otherwise.
        let created = create_crop(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&alice)),
            Json(CropInput {
                name: Some("Tomato".to_string()),
                crop_type: Some("Vegetable".to_string()),
                harvest_date: Some("2024-01-01".to_string()),
                expiry_date: Some("2024-02-01".to_string()),
                farmer_name: Some("mallory".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("create failed")
        .0;

        assert_eq!(created.farmer_id.as_deref(), Some(farmer_code.as_str()));
        assert_eq!(created.farmer_name.as_deref(), Some("alice"));

        let listed = db::find_crops_by_farmer_code(&pool, &farmer_code)
            .await
            .expect("by-code lookup failed");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        // Distributor annotates a crop it does not own.
        let after_bob = update_crop(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&bob)),
            Path(created.id),
            Json(CropInput {
                distributor_received_date: Some("2024-01-05".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("distributor update failed")
        .0;

        assert_eq!(after_bob.farmer_name.as_deref(), Some("alice"));
        assert_eq!(
            after_bob.distributor_id.as_deref(),
            bob.distributor_id.as_deref()
        );
        assert_eq!(after_bob.distributor_name.as_deref(), Some("bob"));

        // Retailer completes the chain; earlier blocks stay put.
        let after_carol = update_crop(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&carol)),
            Path(created.id),
            Json(CropInput {
                retailer_received_date: Some("2024-01-10".to_string()),
                received_from_distributor: Some("bob".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("retailer update failed")
        .0;

        assert_eq!(after_carol.farmer_name.as_deref(), Some("alice"));
        assert_eq!(after_carol.distributor_name.as_deref(), Some("bob"));
        assert_eq!(after_carol.retailer_name.as_deref(), Some("carol"));
        assert_eq!(
            after_carol.received_from_distributor.as_deref(),
            Some("bob")
        );

        // The public scan reports the inferred chain position.
        let scanned = scan_crop(
            State(AppState { pool: pool.clone() }),
            Path(created.id),
        )
        .await
        .expect("scan failed")
        .0;
        assert_eq!(scanned.stage, "AT_RETAILER");
        assert_eq!(scanned.crop.farmer_name.as_deref(), Some("alice"));

        cleanup(&pool, &[created.id], &[alice.id, bob.id, carol.id]).await;
    }

    #[tokio::test]
    async fn test_consumer_purchase_integration() {
        let pool = setup_test_db().await;
        let dan = register(&pool, "dan-consumer", "CONSUMER").await;
        let other = register(&pool, "other-consumer", "CONSUMER").await;

        // Malformed purchase dates are rejected before anything is stored.
        let bad = create_purchase(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&dan)),
            Json(PurchaseInput {
                crop_name: "Tomato".to_string(),
                purchase_date: Some("01/15/2024".to_string()),
                ..Default::default()
            }),
        )
        .await;
        assert!(matches!(bad, Err(FarmChainError::Validation(_))));

        let saved = create_purchase(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&dan)),
            Json(PurchaseInput {
                crop_name: "Tomato".to_string(),
                crop_type: Some("Vegetable".to_string()),
                purchase_date: Some("2024-01-15".to_string()),
                purchased_from: Some("Carol's Greens".to_string()),
                farmer_name: Some("alice".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("purchase failed")
        .0;

        assert_eq!(saved.user_id, dan.id);
        assert_eq!(saved.crop_name, "Tomato");
        assert_eq!(
            saved.purchase_date,
            Some(chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );

        // Receipts are owner-scoped: dan sees his, the other consumer none.
        let dans = get_user_purchases(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&dan)),
        )
        .await
        .expect("list failed")
        .0;
        assert_eq!(dans.len(), 1);
        assert_eq!(dans[0].id, saved.id);

        let others = get_user_purchases(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&other)),
        )
        .await
        .expect("list failed")
        .0;
        assert!(others.is_empty());

        cleanup(&pool, &[], &[dan.id, other.id]).await;
    }

    #[tokio::test]
    async fn test_unique_race_surfaces_as_client_error_integration() {
        let pool = setup_test_db().await;
        let user = register(&pool, "race-check", "CONSUMER").await;

        // A duplicate that slips past the pre-check hits the unique index;
        // the response must be the business error, not a 500.
        let err = db::insert_user(
            &pool,
            &user.email,
            "hash",
            "copy",
            None,
            Role::Consumer,
            None,
            None,
        )
        .await
        .expect_err("duplicate insert must fail");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        // Same for a code collision inside one partition.
        let farmer = register(&pool, "race-farmer", "FARMER").await;
        let code = farmer.farmer_id.clone().unwrap();
        let email2 = format!(
            "race-farmer2-{}@integration.test",
            chrono::Utc::now().timestamp_micros()
        );
        let err = db::insert_user(
            &pool,
            &email2,
            "hash",
            "copy",
            None,
            Role::Farmer,
            Some(&code),
            None,
        )
        .await
        .expect_err("code collision must fail");
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        cleanup(&pool, &[], &[user.id, farmer.id]).await;
    }

    #[tokio::test]
    async fn test_delete_is_owner_only_integration() {
        let pool = setup_test_db().await;
        let alice = register(&pool, "owner", "FARMER").await;
        let bob = register(&pool, "intruder", "DISTRIBUTOR").await;

        let created = create_crop(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&alice)),
            Json(CropInput {
                name: Some("Carrot".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("create failed")
        .0;

        let denied = delete_crop(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&bob)),
            Path(created.id),
        )
        .await;
        assert!(matches!(denied, Err(FarmChainError::Forbidden(_))));

        // The record is intact after the denied delete.
        assert!(db::find_crop_by_id(&pool, created.id)
            .await
            .expect("lookup failed")
            .is_some());

        let allowed = delete_crop(
            State(AppState { pool: pool.clone() }),
            Extension(claims_for(&alice)),
            Path(created.id),
        )
        .await;
        assert!(allowed.is_ok());
        assert!(db::find_crop_by_id(&pool, created.id)
            .await
            .expect("lookup failed")
            .is_none());

        cleanup(&pool, &[], &[alice.id, bob.id]).await;
    }
}
