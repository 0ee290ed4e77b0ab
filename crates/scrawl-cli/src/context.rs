//! Config resolution and session construction shared by commands.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scrawl_core::auth::MemoryCookieJar;
use scrawl_core::config::ClientConfig;
use scrawl_core::store::{DraftStore, FileStore};
use scrawl_core::{Session, SessionStart, SessionStores};

use crate::error::CliError;
use crate::keyring_store::KeyringStore;

const ENV_CONFIG_PATH: &str = "SCRAWL_CONFIG";
const ENV_DATA_DIR: &str = "SCRAWL_DATA_DIR";

pub struct CliContext {
    pub config_path: PathBuf,
    pub config: ClientConfig,
}

impl CliContext {
    pub fn load(cli_config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = resolve_config_path(cli_config_path)?;
        let config = ClientConfig::load_from_path(&config_path)?.with_env_overrides()?;
        Ok(Self {
            config_path,
            config,
        })
    }

    pub fn draft_store(&self) -> Result<DraftStore, CliError> {
        Ok(DraftStore::new(Arc::new(open_draft_file()?)))
    }

    /// Build a session over HTTP and restore whatever the stores hold.
    pub async fn open_session(&self) -> Result<(Session, SessionStart), CliError> {
        let stores = SessionStores {
            cookies: Arc::new(MemoryCookieJar::new()),
            tokens: Arc::new(KeyringStore::new(&self.config.api_base_url)),
            drafts: Arc::new(open_draft_file()?),
        };
        let session = Session::connect(self.config.clone(), stores)?;
        let start = session.start().await?;
        tracing::debug!(
            "Session started (authenticated={}, restored_draft={})",
            start.authenticated,
            start.restored_draft
        );
        Ok((session, start))
    }

    /// Like [`open_session`](Self::open_session), but fails without a
    /// stored session.
    pub async fn open_signed_in_session(&self) -> Result<(Session, SessionStart), CliError> {
        let (session, start) = self.open_session().await?;
        if !start.authenticated {
            return Err(CliError::NotSignedIn);
        }
        Ok((session, start))
    }
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_config_path
        .or_else(|| env::var_os(ENV_CONFIG_PATH).map(PathBuf::from))
        .map_or_else(default_config_path, Ok)
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("scrawl").join("config.json"))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn draft_store_path() -> Result<PathBuf, CliError> {
    let data_dir = env::var_os(ENV_DATA_DIR)
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|dir| dir.join("scrawl")))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))?;
    Ok(draft_file_in(&data_dir))
}

pub fn draft_file_in(data_dir: &Path) -> PathBuf {
    data_dir.join("draft.json")
}

fn open_draft_file() -> Result<FileStore, CliError> {
    Ok(FileStore::open(draft_store_path()?)?)
}
