// SPDX-License-Identifier: Apache-2.0

//! Read path: fragment planning for external datasets.

pub mod planner;
pub mod types;

pub use planner::FragmentPlanner;
pub use types::{
    Fragment, FragmentUserData, FragmenterProfile, InputFormat, PartitionKey, PlanOptions,
};
