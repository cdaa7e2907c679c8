//! services/api/src/bin/api.rs

use api_lib::{
    adapters::db::DbAdapter,
    config::Config,
    error::ApiError,
    web::{
        attendance::submit_attendance_handler,
        auth::{hash_password, login_handler, logout_handler},
        invoices::{
            invoice_document_handler, list_invoices_handler, list_receipts_handler,
            pay_invoice_handler, pay_receipt_handler, receipt_document_handler,
            run_sweep_handler,
        },
        middleware::require_auth,
        rest::{create_user_handler, dashboard_handler, list_users_handler, me_handler, ApiDoc},
        state::AppState,
        students::{
            create_student_handler, get_student_handler, list_students_handler,
            update_student_handler,
        },
        tutors::{
            create_tutor_handler, get_tutor_handler, list_tutors_handler, update_tutor_handler,
        },
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuition_center_core::permissions::Role;
use tuition_center_core::ports::{DatabaseService, NewUserAccount, PortError};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Bootstrap the Admin Account ---
    if let Some(password) = config.bootstrap_admin_password.as_deref() {
        match db_adapter.get_user_by_username("admin").await {
            Ok(_) => info!("Admin account already exists, skipping bootstrap."),
            Err(PortError::NotFound(_)) => {
                let hashed_password =
                    hash_password(password).map_err(|(_, msg)| ApiError::Internal(msg))?;
                db_adapter
                    .create_user_account(NewUserAccount {
                        id: Uuid::new_v4(),
                        username: "admin".to_string(),
                        hashed_password,
                        full_name: Some("Administrator".to_string()),
                        email: None,
                        mobile: None,
                        role: Role::Admin,
                    })
                    .await?;
                info!("Created the bootstrap admin account.");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/students", get(list_students_handler).post(create_student_handler))
        .route("/students/{id}", get(get_student_handler).put(update_student_handler))
        .route("/tutors", get(list_tutors_handler).post(create_tutor_handler))
        .route("/tutors/{id}", get(get_tutor_handler).put(update_tutor_handler))
        .route("/attendance", post(submit_attendance_handler))
        .route("/invoices", get(list_invoices_handler))
        .route("/invoices/{id}/payments", post(pay_invoice_handler))
        .route("/invoices/{id}/document", get(invoice_document_handler))
        .route("/receipts", get(list_receipts_handler))
        .route("/receipts/{id}/payments", post(pay_receipt_handler))
        .route("/receipts/{id}/document", get(receipt_document_handler))
        .route("/billing/sweep", post(run_sweep_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/me", get(me_handler))
        .route("/admin/users", get(list_users_handler).post(create_user_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
