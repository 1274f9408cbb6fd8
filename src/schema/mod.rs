// SPDX-License-Identifier: Apache-2.0

//! Schema matching between relational requests and external datasets.

pub mod compat;
pub mod matcher;
pub mod native;

pub use compat::is_compatible;
pub use matcher::validate_schema;
pub use native::{parse_native_type, NativeType};
