use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use strata::{far_future, BridgeResolver, FrameRecord, VersionedRecord};

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn payload(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn frame_record(
    frame: &str,
    key: &str,
    hooks: &[(&str, &str)],
    columns: &[(&str, &str)],
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    is_current: bool,
) -> FrameRecord {
    let hooks: BTreeMap<String, String> = hooks
        .iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();
    let pit_hook = format!(
        "{}~epoch__valid_from|{}",
        hooks.values().next().unwrap(),
        valid_from.format("%Y-%m-%dT%H:%M:%S%.6fZ")
    );
    FrameRecord {
        frame: frame.to_string(),
        pit_hook,
        hooks,
        record: VersionedRecord {
            unique_key: key.to_string(),
            content_hash: "0xfeed".to_string(),
            payload: payload(columns),
            valid_from,
            valid_to,
            updated_at: if valid_to == far_future() { valid_from } else { valid_to },
            version: 1,
            is_current,
        },
    }
}

const CUSTOMER_HOOK: &str = "_hook__customer__id";
const ORDER_HOOK: &str = "_hook__order__id";

fn current_customer() -> FrameRecord {
    frame_record(
        "customer",
        "ALFKI",
        &[(CUSTOMER_HOOK, "northwind.customer.id|ALFKI")],
        &[("company_name", "Alfreds Futterkiste")],
        ts(0),
        far_future(),
        true,
    )
}

fn closed_order(valid_from: i64, valid_to: i64) -> FrameRecord {
    frame_record(
        "order",
        "10248",
        &[
            (ORDER_HOOK, "northwind.order.id|10248"),
            (CUSTOMER_HOOK, "northwind.customer.id|ALFKI"),
        ],
        &[("freight", "32.38")],
        ts(valid_from),
        ts(valid_to),
        false,
    )
}

#[test]
fn intersects_validity_intervals() {
    let rows = BridgeResolver::seed(&[current_customer()])
        .intersect(CUSTOMER_HOOK, &[closed_order(100, 200)])
        .into_rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.valid_from, ts(100));
    assert_eq!(row.valid_to, ts(200));
    assert!(!row.is_current);
    assert_eq!(row.frames, vec!["customer", "order"]);
}

#[test]
fn bridge_current_only_when_all_sides_current() {
    let current_order = frame_record(
        "order",
        "10248",
        &[
            (ORDER_HOOK, "northwind.order.id|10248"),
            (CUSTOMER_HOOK, "northwind.customer.id|ALFKI"),
        ],
        &[("freight", "32.38")],
        ts(100),
        far_future(),
        true,
    );
    let rows = BridgeResolver::seed(&[current_customer()])
        .intersect(CUSTOMER_HOOK, &[current_order])
        .into_rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_current);
    assert_eq!(rows[0].valid_to, far_future());
}

#[test]
fn disjoint_intervals_yield_no_row() {
    let late_customer = frame_record(
        "customer",
        "ALFKI",
        &[(CUSTOMER_HOOK, "northwind.customer.id|ALFKI")],
        &[("company_name", "Alfreds Futterkiste")],
        ts(500),
        far_future(),
        true,
    );
    let rows = BridgeResolver::seed(&[late_customer])
        .intersect(CUSTOMER_HOOK, &[closed_order(100, 200)])
        .into_rows();
    assert!(rows.is_empty());
}

#[test]
fn different_hook_values_do_not_join() {
    let other_customer = frame_record(
        "customer",
        "ANATR",
        &[(CUSTOMER_HOOK, "northwind.customer.id|ANATR")],
        &[("company_name", "Ana Trujillo")],
        ts(0),
        far_future(),
        true,
    );
    let rows = BridgeResolver::seed(&[other_customer])
        .intersect(CUSTOMER_HOOK, &[closed_order(100, 200)])
        .into_rows();
    assert!(rows.is_empty());
}

#[test]
fn payload_columns_are_source_suffixed() {
    let rows = BridgeResolver::seed(&[current_customer()])
        .intersect(CUSTOMER_HOOK, &[closed_order(100, 200)])
        .into_rows();
    let row = &rows[0];
    assert_eq!(
        row.payload.get("company_name__customer"),
        Some(&Value::String("Alfreds Futterkiste".to_string()))
    );
    assert_eq!(
        row.payload.get("freight__order"),
        Some(&Value::String("32.38".to_string()))
    );
}

#[test]
fn chained_intersection_is_order_independent() {
    let customer = current_customer();
    let order = closed_order(100, 400);
    let shipment = frame_record(
        "shipment",
        "S-1",
        &[
            ("_hook__shipment__id", "northwind.shipment.id|S-1"),
            (ORDER_HOOK, "northwind.order.id|10248"),
        ],
        &[("carrier", "Speedy")],
        ts(200),
        ts(300),
        false,
    );
    let forward = BridgeResolver::seed(std::slice::from_ref(&customer))
        .intersect(CUSTOMER_HOOK, std::slice::from_ref(&order))
        .intersect(ORDER_HOOK, std::slice::from_ref(&shipment))
        .into_rows();
    let backward = BridgeResolver::seed(std::slice::from_ref(&shipment))
        .intersect(ORDER_HOOK, std::slice::from_ref(&order))
        .intersect(CUSTOMER_HOOK, std::slice::from_ref(&customer))
        .into_rows();
    assert_eq!(forward.len(), 1);
    assert_eq!(backward.len(), 1);
    assert_eq!(forward[0].valid_from, backward[0].valid_from);
    assert_eq!(forward[0].valid_to, backward[0].valid_to);
    assert_eq!(forward[0].is_current, backward[0].is_current);
    assert_eq!(forward[0].hooks, backward[0].hooks);
    assert_eq!(forward[0].payload, backward[0].payload);
    assert_eq!(forward[0].valid_from, ts(200));
    assert_eq!(forward[0].valid_to, ts(300));
}

#[test]
fn malformed_hook_excludes_only_that_record() {
    let mut broken = closed_order(100, 200);
    broken
        .hooks
        .insert(CUSTOMER_HOOK.to_string(), "not a hook".to_string());
    let resolver = BridgeResolver::seed(&[current_customer()])
        .intersect(CUSTOMER_HOOK, &[broken, closed_order(250, 300)]);
    assert_eq!(resolver.rows().len(), 1);
    assert_eq!(resolver.rows()[0].valid_from, ts(250));
    assert_eq!(resolver.malformed(), ["not a hook"]);
}
