use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{AppConfig, ModuleSettings, QuizSettings},
    contributions::PgContributionStore,
    llm::LlmClient,
    quiz::{QuestionBank, QuizRegistry},
    web::{auth::SessionProvider, storage::MediaStore},
};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    settings: Arc<RwLock<ModuleSettings>>,
    llm: LlmClient,
    media: MediaStore,
    quizzes: QuizRegistry,
    bank: Arc<RwLock<Arc<QuestionBank>>>,
    contributions: PgContributionStore,
    sessions: SessionProvider,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let llm_client = LlmClient::from_env().context("failed to initialize LLM client")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        ModuleSettings::ensure_defaults(&pool)
            .await
            .context("failed to seed default module settings")?;
        let settings = ModuleSettings::load(&pool)
            .await
            .context("failed to load module settings")?;

        let bank = QuestionBank::load(&pool)
            .await
            .context("failed to load quiz question bank")?;
        info!(questions = bank.len(), "quiz question bank loaded");

        let media = MediaStore::new(config.media_root.clone());
        media
            .ensure_root()
            .await
            .context("failed to prepare media directory")?;

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            llm: llm_client,
            media,
            quizzes: QuizRegistry::new(config.question_seconds),
            bank: Arc::new(RwLock::new(Arc::new(bank))),
            contributions: PgContributionStore::new(pool.clone()),
            sessions: SessionProvider::new(pool.clone()),
            pool,
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE is_admin = TRUE)")
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if !has_admin {
            let password_hash = crate::web::auth::hash_password("change-me")
                .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

            sqlx::query(
                "INSERT INTO users (id, username, display_name, password_hash, is_admin) VALUES ($1, $2, $3, $4, TRUE)",
            )
            .bind(Uuid::new_v4())
            .bind("demo-admin")
            .bind("Atlas Editor")
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("failed to insert seed admin user")?;

            info!(
                "Seeded default admin user 'demo-admin' (password: 'change-me'). Update it promptly."
            );
        }

        Ok(())
    }

    pub fn llm_client(&self) -> LlmClient {
        self.llm.clone()
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn quizzes(&self) -> &QuizRegistry {
        &self.quizzes
    }

    pub fn contributions(&self) -> &PgContributionStore {
        &self.contributions
    }

    pub fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    pub async fn quiz_settings(&self) -> Option<QuizSettings> {
        let guard = self.settings.read().await;
        guard.quiz().cloned()
    }

    /// Snapshot of the fallback bank; sessions keep the copy they were issued from.
    pub async fn question_bank(&self) -> Arc<QuestionBank> {
        Arc::clone(&*self.bank.read().await)
    }

    pub async fn reload_settings(&self) -> Result<()> {
        let latest = ModuleSettings::load(&self.pool)
            .await
            .context("failed to reload module settings")?;
        let mut guard = self.settings.write().await;
        *guard = latest;
        Ok(())
    }

    /// Rebuilds the fallback bank after a quiz suggestion is approved.
    pub async fn reload_bank(&self) -> Result<()> {
        let latest = QuestionBank::load(&self.pool)
            .await
            .context("failed to reload quiz question bank")?;
        info!(questions = latest.len(), "quiz question bank reloaded");
        *self.bank.write().await = Arc::new(latest);
        Ok(())
    }
}
