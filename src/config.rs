// SPDX-License-Identifier: Apache-2.0

//! Write session options.
//!
//! Options arrive either as a deserialized struct or as the string key/value
//! map a relational engine attaches to an external table definition.

use std::collections::HashMap;

use fedbridge_core::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of concurrent write units.
pub const DEFAULT_PARALLELISM: usize = 1;
/// Default rows per remote write; 1 selects the single-row strategy.
pub const DEFAULT_BATCH_SIZE: usize = 1;
/// Rows queued per unit ahead of its worker before `submit` blocks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Write strategy selected at session-open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    SingleRow,
    Batched { batch_size: usize },
}

/// Options for opening a write session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Number of concurrent write units (default: 1)
    pub parallelism: Option<usize>,
    /// Rows per remote write (default: 1)
    pub batch_size: Option<usize>,
    /// Column whose value pins rows to one unit
    pub routing_key: Option<String>,
    /// Per-unit queue depth when parallelism > 1 (default: 1)
    pub channel_capacity: Option<usize>,
}

impl WriteOptions {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_routing_key(mut self, column: impl Into<String>) -> Self {
        self.routing_key = Some(column.into());
        self
    }

    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or(DEFAULT_PARALLELISM).max(1)
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1)
    }

    pub fn effective_channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1)
    }

    pub fn strategy(&self) -> WriteStrategy {
        match self.effective_batch_size() {
            1 => WriteStrategy::SingleRow,
            batch_size => WriteStrategy::Batched { batch_size },
        }
    }

    /// Rejects explicitly configured zero values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (option, value) in [
            ("parallelism", self.parallelism),
            ("batch_size", self.batch_size),
            ("channel_capacity", self.channel_capacity),
        ] {
            if value == Some(0) {
                return Err(ConfigError::invalid(option, "0", "must be a positive integer"));
            }
        }
        if let Some(key) = &self.routing_key {
            if key.trim().is_empty() {
                return Err(ConfigError::invalid("routing_key", key.clone(), "must name a column"));
            }
        }
        Ok(())
    }

    /// Builds options from external-table key/value options.
    ///
    /// Keys are case-insensitive. `POOL_SIZE` is accepted as an alias of
    /// `PARALLELISM` and `QUEUE_DEPTH` sets the channel capacity. Unknown
    /// keys are left for other layers.
    pub fn from_table_options(options: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut parsed = WriteOptions::default();
        for (key, value) in options {
            match key.to_ascii_uppercase().as_str() {
                "PARALLELISM" | "POOL_SIZE" => parsed.parallelism = Some(parse_positive(key, value)?),
                "BATCH_SIZE" => parsed.batch_size = Some(parse_positive(key, value)?),
                "ROUTING_KEY" => {
                    let column = value.trim();
                    if column.is_empty() {
                        return Err(ConfigError::invalid(key.clone(), value.clone(), "must name a column"));
                    }
                    parsed.routing_key = Some(column.to_string());
                }
                "QUEUE_DEPTH" => parsed.channel_capacity = Some(parse_positive(key, value)?),
                _ => {}
            }
        }
        Ok(parsed)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, ConfigError> {
    let n: usize = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, value, "not a positive integer"))?;
    if n == 0 {
        return Err(ConfigError::invalid(key, value, "must be a positive integer"));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_select_single_row_with_one_unit() {
        let options = WriteOptions::default();
        assert_eq!(options.effective_parallelism(), 1);
        assert_eq!(options.effective_batch_size(), 1);
        assert_eq!(options.strategy(), WriteStrategy::SingleRow);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_batch_size_above_one_selects_batched() {
        let options = WriteOptions::default().with_batch_size(3);
        assert_eq!(options.strategy(), WriteStrategy::Batched { batch_size: 3 });
    }

    #[test]
    fn test_parses_table_options_case_insensitively() {
        let options = WriteOptions::from_table_options(&table_options(&[
            ("pool_size", "4"),
            ("BATCH_SIZE", " 100 "),
            ("Routing_Key", "customer_id"),
            ("queue_depth", "8"),
            ("format", "ignored"),
        ]))
        .unwrap();
        assert_eq!(options.effective_parallelism(), 4);
        assert_eq!(options.effective_batch_size(), 100);
        assert_eq!(options.routing_key.as_deref(), Some("customer_id"));
        assert_eq!(options.effective_channel_capacity(), 8);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let err = WriteOptions::from_table_options(&table_options(&[("BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref option, .. } if option == "BATCH_SIZE"));

        assert!(WriteOptions::from_table_options(&table_options(&[("PARALLELISM", "-2")])).is_err());
        assert!(WriteOptions::from_table_options(&table_options(&[("PARALLELISM", "many")])).is_err());
        assert!(WriteOptions::from_table_options(&table_options(&[("QUEUE_DEPTH", "0")])).is_err());
        assert!(WriteOptions::default().with_parallelism(0).validate().is_err());
    }

    #[test]
    fn test_deserializes_from_json() {
        let options: WriteOptions =
            serde_json::from_str(r#"{"parallelism":2,"batch_size":3,"routing_key":"id"}"#).unwrap();
        assert_eq!(options.effective_parallelism(), 2);
        assert_eq!(options.strategy(), WriteStrategy::Batched { batch_size: 3 });
    }
}
