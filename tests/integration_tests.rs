//! Integration tests across the value layer and the mapper core
//!
//! - custom coercion plugged in through `rowgraph_value::Coerce`
//! - configuration loaded from JSON
//! - one `RowMapper` shared by many threads
//!
//! Run with: cargo test --test integration_tests

use rowgraph::{AmbiguityPolicy, MapError, MapperConfig, MemoryRows, RowMapper};
use rowgraph_value::{
    Cell, Coerce, CoerceError, ColumnMeta, ScalarKind, SqlValue, StandardCoercion,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

#[derive(Debug, Default, Clone, PartialEq)]
struct LineItem {
    sku: String,
    cents: i64,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Customer {
    customer_id: i64,
    customer_name: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Order {
    order_id: i64,
    customer: Option<Customer>,
    lines: Vec<LineItem>,
}

rowgraph::entity!(LineItem { sku as "line_sku", cents as "line_cents" });
rowgraph::entity!(Customer { customer_id, customer_name });
rowgraph::entity!(Order { order_id, customer, lines });

const ORDER_COLUMNS: [&str; 5] = [
    "order_id",
    "customer_id",
    "customer_name",
    "line_sku",
    "line_cents",
];

fn order_row(order: i64, customer: i64, sku: &str, price: &str) -> Vec<SqlValue> {
    vec![
        order.into(),
        customer.into(),
        format!("customer {customer}").into(),
        sku.into(),
        price.into(),
    ]
}

// ============================================================================
// Custom coercion
// ============================================================================

#[test]
fn money_columns_through_a_custom_coercion() {
    init_tracing();

    // Prices arrive as decimal text ("12.34"); everything else uses the defaults.
    let coercion = |raw: &SqlValue,
                    column: &ColumnMeta,
                    target: ScalarKind|
     -> Result<Cell, CoerceError> {
        match (column.name.as_str(), raw) {
            ("line_cents", SqlValue::Text(text)) => {
                let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "0"));
                let parse = |s: &str| {
                    s.parse::<i64>().map_err(|err| CoerceError::Parse {
                        column: column.name.clone(),
                        text: text.clone(),
                        target,
                        message: err.to_string(),
                    })
                };
                Ok(Cell::I64(parse(whole)? * 100 + parse(&format!("{frac:0<2}")[..2])?))
            }
            _ => StandardCoercion.coerce(raw, column, target),
        }
    };

    let mapper = RowMapper::new().with_coercion(coercion);
    let mut rows = MemoryRows::untyped(
        &ORDER_COLUMNS,
        vec![
            order_row(1, 7, "A-1", "12.34"),
            order_row(1, 7, "B-2", "5"),
            order_row(2, 8, "A-1", "0.5"),
        ],
    );
    let mut orders: Vec<Order> = Vec::new();
    mapper.map(&mut rows, &mut orders).unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(
        orders[0].lines,
        vec![
            LineItem {
                sku: "A-1".into(),
                cents: 1234
            },
            LineItem {
                sku: "B-2".into(),
                cents: 500
            },
        ]
    );
    assert_eq!(orders[1].lines[0].cents, 50);
    assert_eq!(
        orders[1].customer.as_ref().map(|c| c.customer_name.as_str()),
        Some("customer 8")
    );
}

#[test]
fn custom_coercion_errors_abort_the_call() {
    let mapper = RowMapper::new().with_coercion(
        |raw: &SqlValue, column: &ColumnMeta, target: ScalarKind| -> Result<Cell, CoerceError> {
            if column.name == "line_cents" {
                return Err(CoerceError::TypeMismatch {
                    column: column.name.clone(),
                    database_type: "NUMERIC".into(),
                    found: raw.type_label(),
                    target,
                });
            }
            StandardCoercion.coerce(raw, column, target)
        },
    );
    let mut rows = MemoryRows::untyped(&ORDER_COLUMNS, vec![order_row(1, 7, "A-1", "1")]);
    let mut orders: Vec<Order> = Vec::new();
    let err = mapper.map(&mut rows, &mut orders).unwrap_err();
    assert!(matches!(err, MapError::Coerce(CoerceError::TypeMismatch { .. })));
    assert!(rows.is_closed());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_from_json_controls_ambiguity_and_caching() {
    init_tracing();

    let config: MapperConfig = serde_json::from_value(serde_json::json!({
        "ambiguous_association": "keep_first",
        "cache_trees": false
    }))
    .unwrap();
    assert_eq!(config.ambiguous_association, AmbiguityPolicy::KeepFirst);
    assert_eq!(config.max_depth, MapperConfig::default().max_depth);

    // Two customers on one order: kept first instead of failing.
    let mapper = RowMapper::with_config(config);
    let mut rows = MemoryRows::untyped(
        &ORDER_COLUMNS,
        vec![order_row(1, 7, "A-1", "1"), order_row(1, 9, "A-1", "1")],
    );
    let mut orders: Vec<Order> = Vec::new();
    mapper.map(&mut rows, &mut orders).unwrap();
    assert_eq!(orders[0].customer.as_ref().map(|c| c.customer_id), Some(7));
    assert!(mapper.cache().is_empty());
}

#[test]
fn config_round_trips_through_json() {
    let config = MapperConfig {
        max_depth: 4,
        ..MapperConfig::default()
    };
    let text = serde_json::to_string(&config).unwrap();
    let back: MapperConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, config);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn one_mapper_shared_across_threads() {
    let mapper = RowMapper::new();

    std::thread::scope(|scope| {
        for worker in 0..8i64 {
            let mapper = &mapper;
            scope.spawn(move || {
                let mut rows = MemoryRows::untyped(
                    &ORDER_COLUMNS,
                    vec![
                        order_row(worker, 1, "A", "1"),
                        order_row(worker, 1, "B", "2"),
                    ],
                );
                let mut orders: Vec<Order> = Vec::new();
                mapper.map(&mut rows, &mut orders).unwrap();
                assert_eq!(orders.len(), 1);
                assert_eq!(orders[0].order_id, worker);
                assert_eq!(orders[0].lines.len(), 2);
            });
        }
    });

    assert_eq!(mapper.cache().len(), 1);

    // A different column order is a different tree.
    let mut rows = MemoryRows::untyped(
        &["customer_id", "order_id"],
        vec![vec![SqlValue::Int(1), SqlValue::Int(2)]],
    );
    let mut orders: Vec<Order> = Vec::new();
    mapper.map(&mut rows, &mut orders).unwrap();
    assert_eq!(mapper.cache().len(), 2);
}
