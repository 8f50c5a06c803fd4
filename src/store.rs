use std::path::PathBuf;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::db;
use crate::loader;
use crate::models::{Dataset, EmailRecord};
use crate::notify::{email_stats, EmailLogPage, EmailLogStats};

/// Where reference data comes from and where the email log is kept.
pub enum Store {
    Files(PathBuf),
    Postgres(PgPool),
}

impl Store {
    pub async fn open(data_dir: Option<PathBuf>, config: &Config) -> anyhow::Result<Self> {
        if let Some(dir) = data_dir {
            return Ok(Store::Files(dir));
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(config.database_url()?)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Store::Postgres(pool))
    }

    pub fn pool(&self) -> anyhow::Result<&PgPool> {
        match self {
            Store::Postgres(pool) => Ok(pool),
            Store::Files(_) => anyhow::bail!("this command needs Postgres; drop --data-dir"),
        }
    }

    pub async fn load(&self) -> anyhow::Result<Dataset> {
        match self {
            Store::Files(dir) => loader::load_dir(dir),
            Store::Postgres(pool) => db::fetch_dataset(pool).await,
        }
    }

    pub async fn append_email_log(&self, records: &[EmailRecord]) -> anyhow::Result<usize> {
        match self {
            Store::Files(dir) => loader::append_email_log(&loader::email_log_path(dir), records),
            Store::Postgres(pool) => db::append_email_log(pool, records).await,
        }
    }

    pub async fn email_log_page(
        &self,
        page: usize,
        per_page: usize,
    ) -> anyhow::Result<(EmailLogPage, EmailLogStats)> {
        match self {
            Store::Files(dir) => {
                let records = loader::read_email_log(&loader::email_log_path(dir))?;
                Ok((
                    EmailLogPage::slice(&records, page, per_page),
                    email_stats(&records),
                ))
            }
            Store::Postgres(pool) => Ok((
                db::fetch_email_log_page(pool, page, per_page).await?,
                db::email_log_stats(pool).await?,
            )),
        }
    }
}
