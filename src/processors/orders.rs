use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::RECENT_ORDERS_LIMIT;
use crate::normalize::coerce::{label, number_or_zero};
use crate::normalize::RowSet;
use crate::types::{MetricRecord, OrderCounts, OrderTotals, OrdersSummary, RecentOrder};

const UNKNOWN_CURRENCY: &str = "UNKNOWN";

/// Column positions of an `/orders` row. Positions apply only when the backend
/// sends no column names; a named layout without a field leaves it absent.
struct Columns {
    currency: Option<usize>,
    order_key: Option<usize>,
    scoring: Option<usize>,
    deposited: Option<usize>,
    refunded: Option<usize>,
    withdrawn: Option<usize>,
    timestamp: Option<usize>,
}

impl Columns {
    fn resolve(set: &RowSet<'_>) -> Self {
        Self {
            currency: set.index(&["currency"], 0),
            order_key: set.index(&["order_key"], 1),
            scoring: set.index(&["scoring", "scoring_amount"], 2),
            deposited: set.index(&["deposited", "deposit_amount"], 3),
            refunded: set.index(&["refunded", "refund_amount"], 4),
            withdrawn: set.index(&["withdrawn", "withdrawal_amount"], 5),
            timestamp: set.index(&["timestamp", "created_at"], 6),
        }
    }
}

impl OrdersSummary {
    fn empty(currency: String) -> Self {
        Self {
            currency,
            totals: OrderTotals::default(),
            counts: OrderCounts::default(),
            chart_data: Vec::new(),
            recent_orders: Vec::new(),
        }
    }

    fn record(&mut self, order: RecentOrder) {
        self.totals.deposited += order.deposited;
        self.totals.refunded += order.refunded;
        self.totals.withdrawn += order.withdrawn;

        self.counts.orders += 1;
        self.counts.deposits += u64::from(order.deposited > 0.0);
        self.counts.refunds += u64::from(order.refunded > 0.0);
        self.counts.withdrawals += u64::from(order.withdrawn > 0.0);

        if self.recent_orders.len() < RECENT_ORDERS_LIMIT {
            self.recent_orders.push(order);
        }
    }

    fn finish(mut self) -> Self {
        self.chart_data = vec![
            MetricRecord::new("Deposited", self.totals.deposited),
            MetricRecord::new("Refunded", self.totals.refunded),
            MetricRecord::new("Withdrawn", self.totals.withdrawn),
        ];
        self
    }
}

/// `/orders` → one summary per currency. Recent orders keep backend order
/// (newest first); nothing is re-sorted here.
pub fn process_orders(payload: Option<&Value>) -> BTreeMap<String, OrdersSummary> {
    let Some(set) = RowSet::locate(payload) else {
        return BTreeMap::new();
    };
    let cols = Columns::resolve(&set);

    let mut by_currency: BTreeMap<String, OrdersSummary> = BTreeMap::new();
    for row in &set.rows {
        let currency = RowSet::cell(row, cols.currency)
            .and_then(label)
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNKNOWN_CURRENCY.to_string());

        let order = RecentOrder {
            order_key: RowSet::cell(row, cols.order_key).and_then(label).unwrap_or_default(),
            scoring: number_or_zero(RowSet::cell(row, cols.scoring)),
            deposited: number_or_zero(RowSet::cell(row, cols.deposited)),
            refunded: number_or_zero(RowSet::cell(row, cols.refunded)),
            withdrawn: number_or_zero(RowSet::cell(row, cols.withdrawn)),
            timestamp: RowSet::cell(row, cols.timestamp).and_then(label),
        };

        by_currency
            .entry(currency.clone())
            .or_insert_with(|| OrdersSummary::empty(currency))
            .record(order);
    }

    by_currency
        .into_iter()
        .map(|(currency, summary)| (currency, summary.finish()))
        .collect()
}
