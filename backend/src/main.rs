use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir};

mod admin;
mod auth;
mod clock;
mod config;
mod crypto;
mod error;
mod events;
mod feed;
mod models;
mod pages;
mod retention;
mod store;
mod tasks;
mod validation;
mod views;

use auth::SessionKey;
use config::Config;
use crypto::{generate_random_password, hash_password};
use models::ADMIN_ROLE;
use store::{PgStore, PlannerStore, StoreError};

type AppState = Arc<AppData>;

pub struct AppData {
    store: Arc<dyn PlannerStore>,
    session_key: SessionKey,
    config: Config,
}

impl AppData {
    fn new(store: Arc<dyn PlannerStore>, config: Config) -> Self {
        Self {
            store,
            session_key: SessionKey::derive(&config.secret_key),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    config.log_configuration();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn PlannerStore> = Arc::new(store);

    ensure_admin(store.as_ref(), &config).await?;

    if !config.is_production() {
        let today = clock::today_in(config.timezone);
        retention::startup_sweep(store.as_ref(), today, config.retention_days).await;
    }

    let bind_addr = config.bind_addr;
    let app = app(AppState::new(AppData::new(store, config)));

    log::info!("Planner server starting on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login_form).post(pages::login))
        .route("/logout", get(pages::logout))
        .route("/dashboard", get(pages::dashboard))
        .route("/calendar", get(pages::calendar))
        .route("/eventos", get(pages::event_list))
        .route("/eventos/nuevo", get(pages::new_event_form).post(events::create_event_form))
        .route("/eventos/:id/ver", get(events::view_event_fragment))
        .route("/eventos/:id/eliminar", post(events::delete_event))
        .route("/tareas", get(pages::task_list))
        .route("/tareas/nueva", get(pages::new_task_form).post(tasks::create_task_form))
        .route("/tareas/:id/ver", get(tasks::view_task_fragment))
        .route("/tareas/:id/eliminar", post(tasks::delete_task))
        .route("/tareas/:id/estado", post(tasks::update_task_state))
        .route("/api/eventos", get(feed::calendar_feed).post(events::create_event))
        .route("/api/eventos/:id", get(events::get_event).put(events::update_event))
        .route("/api/tareas", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tareas/:id", get(tasks::get_task).put(tasks::update_task))
        .route("/api/resumen", get(tasks::task_summary))
        .route("/admin", get(admin::admin_page))
        .route("/admin/usuarios", post(admin::create_user))
        .route("/admin/limpiar-datos", post(admin::purge_data))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)) // 2MB limit
        .with_state(state)
}

/// Creates the first administrator when none exists.
///
/// Without `ADMIN_PASSWORD` a random password is generated and written to
/// `admin_credentials.txt`.
async fn ensure_admin(store: &dyn PlannerStore, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if store.count_users_with_role(ADMIN_ROLE).await? > 0 {
        return Ok(());
    }

    let (password, generated) = match &config.admin_password {
        Some(password) => (password.clone(), false),
        None => (generate_random_password(), true),
    };
    let password_hash = hash_password(&password).await?;

    let created = store
        .create_user(&config.admin_username, &password_hash, ADMIN_ROLE)
        .await?;
    if created.is_none() {
        return Err(StoreError::Unavailable(format!(
            "cannot create administrator: username {} is taken by a non-admin account",
            config.admin_username
        ))
        .into());
    }

    if generated {
        tokio::fs::write(
            "admin_credentials.txt",
            format!("Username: {}\nPassword: {}", config.admin_username, password),
        )
        .await?;
        log::info!("Admin credentials written to admin_credentials.txt");
    } else {
        log::info!("Administrator {} created", config.admin_username);
    }
    Ok(())
}
