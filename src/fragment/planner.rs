// SPDX-License-Identifier: Apache-2.0

//! Fragment planner.
//!
//! Validates the requested schema against the external dataset, then turns
//! each physical storage unit into a [`Fragment`] carrying locality hints and
//! the reader context needed to decode it.

use std::sync::Arc;

use fedbridge_core::{
    ExternalSchema, MetadataProvider, PlanError, StorageDescriptor, StorageUnit,
};
use tracing::{debug, info, instrument, warn};

use crate::context::RequestContext;
use crate::schema::validate_schema;

use super::types::{
    Fragment, FragmentUserData, FragmenterProfile, InputFormat, PartitionKey, PlanOptions,
};

/// Plans fragments for external datasets described by a metadata provider.
///
/// The provider is shared read-only; the planner holds no per-request state.
pub struct FragmentPlanner {
    provider: Arc<dyn MetadataProvider>,
}

impl FragmentPlanner {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    /// Returns one fragment per storage unit, in the storage layer's order.
    ///
    /// A schema mismatch aborts before storage units are listed. Any failure
    /// yields no fragments at all.
    #[instrument(skip(self, context, options), fields(dataset = %context.dataset, columns = context.columns.len()))]
    pub async fn plan(
        &self,
        context: &RequestContext,
        options: &PlanOptions,
    ) -> Result<Vec<Fragment>, PlanError> {
        let dataset = &context.dataset;
        let profile = options.effective_profile();

        let schema = self
            .provider
            .describe_schema(dataset)
            .await
            .map_err(|e| PlanError::provider(dataset, e.message))?;

        validate_schema(&context.columns, &schema)?;

        if profile == FragmenterProfile::InputFormat {
            check_input_format(context, &schema.storage)?;
        }

        let units = self
            .provider
            .list_storage_units(dataset)
            .await
            .map_err(|e| PlanError::provider(dataset, e.message))?;

        let fragments = units
            .into_iter()
            .enumerate()
            .map(|(index, unit)| build_fragment(context, &schema, profile, index, unit))
            .collect::<Result<Vec<_>, _>>()?;

        let without_hosts = fragments.iter().filter(|f| f.hosts.is_empty()).count();
        if without_hosts > 0 {
            warn!(
                without_hosts,
                total = fragments.len(),
                "Fragments without locality hints will be scheduled on any host"
            );
        }

        info!(fragments = fragments.len(), ?profile, "Planned fragments");
        Ok(fragments)
    }
}

fn check_input_format(context: &RequestContext, storage: &StorageDescriptor) -> Result<InputFormat, PlanError> {
    InputFormat::from_class_name(&storage.input_format).ok_or_else(|| {
        PlanError::UnsupportedInputFormat {
            dataset: context.dataset.to_string(),
            input_format: storage.input_format.clone(),
            supported: InputFormat::ALL
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    })
}

fn build_fragment(
    context: &RequestContext,
    schema: &ExternalSchema,
    profile: FragmenterProfile,
    index: usize,
    unit: StorageUnit,
) -> Result<Fragment, PlanError> {
    if unit.partition_values.len() != schema.partition_columns.len() {
        return Err(PlanError::malformed(
            &context.dataset,
            format!(
                "storage unit {} has {} partition values but the table declares {} partition columns",
                unit.locator,
                unit.partition_values.len(),
                schema.partition_columns.len()
            ),
        ));
    }

    let storage = unit.storage.as_ref().unwrap_or(&schema.storage);
    if profile == FragmenterProfile::InputFormat {
        check_input_format(context, storage)?;
    }

    let partition_keys = schema
        .partition_columns
        .iter()
        .zip(&unit.partition_values)
        .map(|(column, value)| PartitionKey {
            name: column.name.to_string(),
            native_type: column.native_type.to_string(),
            value: value.clone(),
        })
        .collect();

    let user_data = FragmentUserData {
        input_format: storage.input_format.clone(),
        serde: storage.serde.clone(),
        partition_keys,
        serde_properties: match profile {
            FragmenterProfile::Full => Some(storage.serde_properties.clone()),
            FragmenterProfile::InputFormat => None,
        },
    }
    .encode()
    .map_err(|e| PlanError::malformed(&context.dataset, format!("cannot encode fragment user data: {e}")))?;

    let hosts = sanitize_hosts(unit.hosts);
    debug!(index, source = %unit.locator, hosts = hosts.len(), "Fragment");

    Ok(Fragment {
        index,
        source: unit.locator,
        hosts,
        user_data,
    })
}

/// Drops blank host names and duplicates, keeping first-seen order.
fn sanitize_hosts(hosts: Vec<String>) -> Vec<String> {
    let mut clean: Vec<String> = Vec::with_capacity(hosts.len());
    for host in hosts {
        let host = host.trim();
        if host.is_empty() || clean.iter().any(|h| h == host) {
            continue;
        }
        clean.push(host.to_string());
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_hosts_drops_blanks_and_duplicates() {
        let hosts = vec![
            "dn2".to_string(),
            " ".to_string(),
            "dn1".to_string(),
            "dn2".to_string(),
            " dn3 ".to_string(),
        ];
        assert_eq!(sanitize_hosts(hosts), vec!["dn2", "dn1", "dn3"]);
        assert!(sanitize_hosts(Vec::new()).is_empty());
    }
}
