//! Predicate filtering over the unified table

use crate::error::QueryError;
use crate::models::{QueryPredicate, ResourceRecord, ResourceTable};
use tracing::warn;

/// Filter `table` strictly, failing on rows that lack a constrained column
///
/// Service type matches exactly, region matches exactly, status matches
/// case-insensitively. Absent fields impose no constraint; present fields
/// combine with AND.
pub fn try_apply(table: &ResourceTable, predicate: &QueryPredicate) -> Result<ResourceTable, QueryError> {
    if predicate.is_unconstrained() {
        return Ok(table.clone());
    }

    let wanted_status = predicate.status.as_ref().map(|s| s.to_lowercase());
    let mut rows = Vec::new();

    for row in table {
        check_columns(row, predicate)?;

        let keep = predicate
            .service_type
            .as_ref()
            .map_or(true, |kind| kind.matches(row.service_type))
            && predicate
                .region
                .as_ref()
                .map_or(true, |region| &row.region == region)
            && wanted_status
                .as_ref()
                .map_or(true, |status| &row.normalized_status() == status);

        if keep {
            rows.push(row.clone());
        }
    }

    Ok(ResourceTable::new(rows))
}

/// Every record must carry a region and a status to be filtered on them
fn check_columns(row: &ResourceRecord, predicate: &QueryPredicate) -> Result<(), QueryError> {
    if predicate.region.is_some() && row.region.is_empty() {
        return Err(QueryError::MissingColumn {
            column: "region",
            resource_id: row.resource_id.clone(),
        });
    }
    if predicate.status.is_some() && row.status.is_empty() {
        return Err(QueryError::MissingColumn {
            column: "status",
            resource_id: row.resource_id.clone(),
        });
    }
    Ok(())
}

/// Filter `table`, falling back to the unfiltered table on a missing
/// predicate or any filtering error
pub fn apply(table: &ResourceTable, predicate: Option<&QueryPredicate>) -> ResourceTable {
    let Some(predicate) = predicate else {
        return table.clone();
    };

    match try_apply(table, predicate) {
        Ok(filtered) => filtered,
        Err(e) => {
            warn!(error = %e, "Filtering failed, returning unfiltered table");
            table.clone()
        }
    }
}
