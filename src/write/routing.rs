// SPDX-License-Identifier: Apache-2.0

//! Row routing across write units.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use fedbridge_core::{Row, Value};

/// How rows are spread across units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Rotate through units, skipping busy ones when another is free
    RoundRobin,
    /// All rows with equal values in `column` go to the same unit
    Sticky { column: usize },
}

/// Where a row may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Exactly this unit
    Pinned(usize),
    /// Any unit, preferring this one and then the following ones in order
    AnyFrom(usize),
}

#[derive(Debug)]
pub struct Router {
    policy: RoutingPolicy,
    units: usize,
    cursor: usize,
}

impl Router {
    pub fn new(policy: RoutingPolicy, units: usize) -> Self {
        Self {
            policy,
            units: units.max(1),
            cursor: 0,
        }
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    pub fn route(&mut self, row: &Row) -> Route {
        match self.policy {
            RoutingPolicy::RoundRobin => {
                let start = self.cursor;
                self.cursor = (self.cursor + 1) % self.units;
                Route::AnyFrom(start)
            }
            RoutingPolicy::Sticky { column } => {
                let key = row.values.get(column).unwrap_or(&Value::Null);
                Route::Pinned((key_hash(key) % self.units as u64) as usize)
            }
        }
    }

    /// Moves the rotation past `unit` after a round-robin row landed there.
    pub fn landed(&mut self, unit: usize) {
        if self.policy == RoutingPolicy::RoundRobin {
            self.cursor = (unit + 1) % self.units;
        }
    }
}

/// Stable hash of a routing key value. Integers and integral floats of the
/// same magnitude hash alike so a key keeps its unit across numeric widening.
pub fn key_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_value(value, &mut hasher);
    hasher.finish()
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Int(i) => {
            2u8.hash(state);
            i.hash(state);
        }
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            2u8.hash(state);
            (*f as i64).hash(state);
        }
        Value::Float(f) => {
            3u8.hash(state);
            f.to_bits().hash(state);
        }
        Value::Decimal(d) => {
            4u8.hash(state);
            d.normalize().to_string().hash(state);
        }
        Value::Text(s) => {
            5u8.hash(state);
            s.hash(state);
        }
        Value::Bytes(b) => {
            6u8.hash(state);
            b.hash(state);
        }
        Value::Date(d) => {
            7u8.hash(state);
            d.hash(state);
        }
        Value::Timestamp(ts) => {
            8u8.hash(state);
            ts.hash(state);
        }
        Value::Json(j) => {
            9u8.hash(state);
            j.to_string().hash(state);
        }
        Value::Array(items) => {
            10u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(key: Value) -> Row {
        Row::new(vec![key, Value::Text("payload".to_string())])
    }

    #[test]
    fn test_round_robin_rotates_through_units() {
        let mut router = Router::new(RoutingPolicy::RoundRobin, 3);
        let routes: Vec<Route> = (0..4).map(|_| router.route(&keyed(Value::Null))).collect();
        assert_eq!(
            routes,
            vec![Route::AnyFrom(0), Route::AnyFrom(1), Route::AnyFrom(2), Route::AnyFrom(0)]
        );
    }

    #[test]
    fn test_landed_skips_past_the_unit_actually_used() {
        let mut router = Router::new(RoutingPolicy::RoundRobin, 3);
        assert_eq!(router.route(&keyed(Value::Null)), Route::AnyFrom(0));
        router.landed(2);
        assert_eq!(router.route(&keyed(Value::Null)), Route::AnyFrom(0));
    }

    #[test]
    fn test_sticky_routing_pins_equal_keys_to_one_unit() {
        let mut router = Router::new(RoutingPolicy::Sticky { column: 0 }, 4);
        let first = router.route(&keyed(Value::Text("customer-17".to_string())));
        for _ in 0..10 {
            assert_eq!(router.route(&keyed(Value::Text("customer-17".to_string()))), first);
        }
        assert!(matches!(first, Route::Pinned(unit) if unit < 4));
    }

    #[test]
    fn test_integral_floats_hash_like_integers() {
        assert_eq!(key_hash(&Value::Int(42)), key_hash(&Value::Float(42.0)));
        assert_ne!(key_hash(&Value::Int(42)), key_hash(&Value::Text("42".to_string())));
    }

    #[test]
    fn test_missing_key_column_routes_as_null() {
        let mut router = Router::new(RoutingPolicy::Sticky { column: 5 }, 2);
        let route = router.route(&keyed(Value::Int(1)));
        assert_eq!(route, Route::Pinned((key_hash(&Value::Null) % 2) as usize));
    }
}
