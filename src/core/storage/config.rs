use anyhow::Result;
use tracing::info;

use super::types::ApiConfig;
use super::{API_CONFIG_KEY, LocalStore};

impl LocalStore {
    /// Stored settings, or the built-in defaults when nothing was saved yet.
    pub fn get_api_config(&self) -> Result<ApiConfig> {
        Ok(self.read_json(API_CONFIG_KEY)?.unwrap_or_default())
    }

    pub fn save_api_config(&self, config: &ApiConfig) -> Result<()> {
        self.write_json(API_CONFIG_KEY, config)?;
        info!("API config saved (endpoint: {}, model: {})", config.api_base, config.model);
        Ok(())
    }

    pub fn clear_api_config(&self) -> Result<()> {
        self.kv.remove_item(API_CONFIG_KEY)?;
        info!("API config cleared");
        Ok(())
    }
}
