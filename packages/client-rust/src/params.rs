//! Argument-map helpers for common query shapes.
//!
//! Convenience builders that fold filter and paging values into an outbound
//! argument map, so list-style calls do not hand-assemble the same keys at
//! every call site.

use serde::{Deserialize, Serialize};

use funcgate_core::Parameters;

/// Paging window for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingParams {
    /// Number of items to skip from the start of the result set.
    pub skip: Option<u64>,
    /// Maximum number of items to return.
    pub take: Option<u64>,
    /// Whether the total result count should be computed and returned.
    pub total: bool,
}

/// Copies every filter entry into `args` under its own name.
pub fn add_filter_params(args: &mut Parameters, filter: Option<&Parameters>) {
    if let Some(filter) = filter {
        for (key, value) in filter.iter() {
            args.put(key.clone(), value.clone());
        }
    }
}

/// Adds `total`, `skip`, and `take` paging entries to `args`.
pub fn add_paging_params(args: &mut Parameters, paging: Option<&PagingParams>) {
    if let Some(paging) = paging {
        args.put("total", paging.total);
        if let Some(skip) = paging.skip {
            args.put("skip", skip);
        }
        if let Some(take) = paging.take {
            args.put("take", take);
        }
    }
}
