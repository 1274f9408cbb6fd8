// SPDX-License-Identifier: Apache-2.0

//! Remote store clients.

pub mod postgres;

pub use postgres::{PgRemoteClient, PgRemoteConfig, PreparedInsert};
