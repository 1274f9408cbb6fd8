// SPDX-License-Identifier: Apache-2.0

//! Write path: units, routing, the coordinator and sessions.

pub mod coordinator;
pub mod routing;
pub mod session;
pub mod unit;

pub use coordinator::WriteCoordinator;
pub use routing::{Route, Router, RoutingPolicy};
pub use session::{WriteSession, WriteSummary};
pub use unit::{BatchedWriter, SingleRowWriter, UnitState, WriteUnit};
