//! # Store Configuration
//!
//! Environment-based configuration for the read-through store.

use std::env;

use tablesync_domain::SystemTables;

/// Read-through store configuration
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Names of the sync subsystem's bookkeeping tables. Operations on
    /// these are never routed to the remote service.
    pub system_tables: SystemTables,
}

impl StoreConfig {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // mutating process env in tests is unsafe on edition 2024, so the
    // variable lookup is injected
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SystemTables::default();
        Self {
            system_tables: SystemTables {
                operation_queue: get("TABLESYNC_OPERATION_QUEUE_TABLE")
                    .unwrap_or(defaults.operation_queue),
                sync_errors: get("TABLESYNC_SYNC_ERRORS_TABLE")
                    .unwrap_or(defaults.sync_errors),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_system_tables() {
        let config = StoreConfig::default();
        assert!(config.system_tables.is_system("__operations"));
        assert!(config.system_tables.is_system("__errors"));
    }

    #[test]
    fn env_overrides_replace_system_table_names() {
        let config = StoreConfig::from_lookup(|key| match key {
            "TABLESYNC_OPERATION_QUEUE_TABLE" => Some("__pending_ops".to_string()),
            "TABLESYNC_SYNC_ERRORS_TABLE" => Some("__push_failures".to_string()),
            _ => None,
        });

        assert!(config.system_tables.is_system("__pending_ops"));
        assert!(config.system_tables.is_system("__push_failures"));
        assert!(!config.system_tables.is_system("__operations"));
        assert!(!config.system_tables.is_system("__errors"));
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let config = StoreConfig::from_lookup(|_| None);
        assert_eq!(config.system_tables, SystemTables::default());
    }
}
