use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum LockConfig {
    #[default]
    Memory,
    #[cfg(feature = "valkey")]
    Valkey {
        url: String,
        #[serde(default)]
        namespace: Option<String>,
        #[serde(default = "default_pool_size")]
        pool_size: usize,
    },
}

#[cfg(feature = "valkey")]
fn default_pool_size() -> usize {
    10
}
