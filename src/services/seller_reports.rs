use super::{orders::load_items, OrderDetails};
use crate::{
    dto::OrderView,
    entities::{order, order_item, product, user, PaymentMethod},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatistics {
    pub total_orders: usize,
    pub total_sales: Decimal,
    pub paid_orders: usize,
    pub delivered_orders: usize,
}

impl ReportStatistics {
    /// Folds `(amount, is_paid, is_delivered)` triples.
    pub fn tally<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Decimal, bool, bool)>,
    {
        rows.into_iter()
            .fold(Self::default(), |mut stats, (amount, paid, delivered)| {
                stats.total_orders += 1;
                stats.total_sales += amount;
                stats.paid_orders += usize::from(paid);
                stats.delivered_orders += usize::from(delivered);
                stats
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&user::Model> for BuyerSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerLine {
    pub product_id: Uuid,
    pub product_title: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_discount: Option<Decimal>,
}

/// One order as seen by a seller: only that seller's lines, and their total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerReportRow {
    pub order_id: Uuid,
    pub buyer: Option<BuyerSummary>,
    pub items: Vec<SellerLine>,
    pub seller_total: Decimal,
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerReport {
    pub orders: Vec<SellerReportRow>,
    pub statistics: ReportStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReportRow {
    #[serde(flatten)]
    pub order: OrderView,
    pub buyer: Option<BuyerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminReport {
    pub orders: Vec<AdminReportRow>,
    pub statistics: ReportStatistics,
}

fn newest_first(orders: &mut [OrderDetails]) {
    orders.sort_by(|a, b| {
        b.order
            .created_at
            .cmp(&a.order.created_at)
            .then_with(|| b.order.id.cmp(&a.order.id))
    });
}

fn line_amount(item: &order_item::Model) -> Decimal {
    item.price * Decimal::from(item.quantity)
}

/// Keeps the lines whose product belongs to `seller_id` and drops orders left empty.
///
/// `catalog` maps product id to `(seller, title)`. Products missing from it match no seller.
pub fn project_for_seller(
    orders: Vec<OrderDetails>,
    catalog: &HashMap<Uuid, (Option<Uuid>, String)>,
    buyers: &HashMap<Uuid, user::Model>,
    seller_id: Uuid,
) -> SellerReport {
    let mut orders = orders;
    newest_first(&mut orders);

    let rows: Vec<SellerReportRow> = orders
        .into_iter()
        .filter_map(|OrderDetails { order, items }| {
            let retained: Vec<&order_item::Model> = items
                .iter()
                .filter(|item| {
                    catalog
                        .get(&item.product_id)
                        .and_then(|(seller, _)| *seller)
                        == Some(seller_id)
                })
                .collect();
            if retained.is_empty() {
                return None;
            }

            let seller_total = retained.iter().map(|item| line_amount(item)).sum();
            Some(SellerReportRow {
                order_id: order.id,
                buyer: buyers.get(&order.user_id).map(BuyerSummary::from),
                items: retained
                    .into_iter()
                    .map(|item| SellerLine {
                        product_id: item.product_id,
                        product_title: catalog.get(&item.product_id).map(|(_, t)| t.clone()),
                        quantity: item.quantity,
                        unit_price: item.price,
                        line_discount: item.total_product_discount,
                    })
                    .collect(),
                seller_total,
                shipping_address: order.shipping_address,
                payment_method: order.payment_method,
                is_paid: order.is_paid,
                paid_at: order.paid_at,
                is_delivered: order.is_delivered,
                delivered_at: order.delivered_at,
                created_at: order.created_at,
            })
        })
        .collect();

    let statistics = ReportStatistics::tally(
        rows.iter()
            .map(|row| (row.seller_total, row.is_paid, row.is_delivered)),
    );
    SellerReport {
        orders: rows,
        statistics,
    }
}

/// Every order, unfiltered, with global statistics.
pub fn project_for_admin(
    orders: Vec<OrderDetails>,
    buyers: &HashMap<Uuid, user::Model>,
) -> AdminReport {
    let mut orders = orders;
    newest_first(&mut orders);

    let statistics = ReportStatistics::tally(orders.iter().map(|d| {
        (
            d.order.total_order_price,
            d.order.is_paid,
            d.order.is_delivered,
        )
    }));
    let rows = orders
        .into_iter()
        .map(|details| AdminReportRow {
            buyer: buyers.get(&details.order.user_id).map(BuyerSummary::from),
            order: details.into(),
        })
        .collect();

    AdminReport {
        orders: rows,
        statistics,
    }
}

#[derive(Clone)]
pub struct SellerReportAggregator {
    db: Arc<DatabaseConnection>,
}

impl SellerReportAggregator {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn for_seller(&self, seller_id: Uuid) -> Result<SellerReport, ServiceError> {
        let db = &*self.db;

        let products = product::Entity::find()
            .filter(product::Column::SellerId.eq(seller_id))
            .all(db)
            .await?;
        if products.is_empty() {
            return Ok(project_for_seller(
                Vec::new(),
                &HashMap::new(),
                &HashMap::new(),
                seller_id,
            ));
        }
        let catalog: HashMap<Uuid, (Option<Uuid>, String)> = products
            .into_iter()
            .map(|p| (p.id, (p.seller_id, p.title)))
            .collect();

        let order_ids: HashSet<Uuid> = order_item::Entity::find()
            .filter(order_item::Column::ProductId.is_in(catalog.keys().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|item| item.order_id)
            .collect();

        let orders = self.load_orders(Some(order_ids.into_iter().collect())).await?;
        let buyers = self.load_buyers(&orders).await?;
        Ok(project_for_seller(orders, &catalog, &buyers, seller_id))
    }

    #[instrument(skip(self))]
    pub async fn for_admin(&self) -> Result<AdminReport, ServiceError> {
        let orders = self.load_orders(None).await?;
        let buyers = self.load_buyers(&orders).await?;
        Ok(project_for_admin(orders, &buyers))
    }

    async fn load_orders(&self, ids: Option<Vec<Uuid>>) -> Result<Vec<OrderDetails>, ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(ids) = ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.filter(order::Column::Id.is_in(ids));
        }
        let orders = query.all(&*self.db).await?;

        let mut items = load_items(&self.db, orders.iter().map(|o| o.id).collect()).await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderDetails {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    async fn load_buyers(
        &self,
        orders: &[OrderDetails],
    ) -> Result<HashMap<Uuid, user::Model>, ServiceError> {
        let ids: HashSet<Uuid> = orders.iter().map(|d| d.order.user_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(user::Entity::find()
            .filter(user::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn order_with(
        lines: &[(Uuid, i32, Decimal)],
        minutes: i64,
        paid: bool,
        delivered: bool,
    ) -> OrderDetails {
        let id = Uuid::new_v4();
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        OrderDetails {
            order: order::Model {
                id,
                user_id: Uuid::new_v4(),
                total_order_price: lines
                    .iter()
                    .map(|(_, q, p)| *p * Decimal::from(*q))
                    .sum(),
                shipping_address: serde_json::json!({}),
                payment_method: PaymentMethod::Cash,
                is_paid: paid,
                paid_at: paid.then_some(created),
                is_delivered: delivered,
                delivered_at: None,
                created_at: created,
                updated_at: created,
            },
            items: lines
                .iter()
                .enumerate()
                .map(|(i, (product_id, quantity, price))| order_item::Model {
                    id: Uuid::new_v4(),
                    order_id: id,
                    product_id: *product_id,
                    quantity: *quantity,
                    price: *price,
                    total_product_discount: None,
                    position: i as i32,
                })
                .collect(),
        }
    }

    #[test]
    fn seller_view_keeps_only_own_lines_and_totals() {
        let seller = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let catalog = HashMap::from([
            (mine, (Some(seller), "Mug".to_string())),
            (theirs, (Some(other), "Lamp".to_string())),
        ]);

        let mixed = order_with(&[(mine, 2, dec!(10)), (theirs, 1, dec!(99))], 0, true, false);
        let foreign = order_with(&[(theirs, 3, dec!(99))], 1, true, true);

        let report = project_for_seller(vec![mixed.clone(), foreign], &catalog, &HashMap::new(), seller);

        assert_eq!(report.orders.len(), 1);
        let row = &report.orders[0];
        assert_eq!(row.order_id, mixed.order.id);
        assert_eq!(row.items.len(), 1);
        assert_eq!(row.items[0].product_title.as_deref(), Some("Mug"));
        assert_eq!(row.seller_total, dec!(20));
        assert_eq!(
            report.statistics,
            ReportStatistics {
                total_orders: 1,
                total_sales: dec!(20),
                paid_orders: 1,
                delivered_orders: 0,
            }
        );
    }

    #[test]
    fn admin_view_reports_every_order_newest_first() {
        let p = Uuid::new_v4();
        let older = order_with(&[(p, 1, dec!(5))], 0, false, false);
        let newer = order_with(&[(p, 2, dec!(5))], 10, true, true);

        let report = project_for_admin(vec![older.clone(), newer.clone()], &HashMap::new());

        assert_eq!(report.orders[0].order.id, newer.order.id);
        assert_eq!(report.orders[1].order.id, older.order.id);
        assert_eq!(report.statistics.total_orders, 2);
        assert_eq!(report.statistics.total_sales, dec!(15));
        assert_eq!(report.statistics.paid_orders, 1);
        assert_eq!(report.statistics.delivered_orders, 1);
    }

    #[test]
    fn statistics_serialize_with_camel_case_names() {
        let json = serde_json::to_value(ReportStatistics::default()).unwrap();
        for key in ["totalOrders", "totalSales", "paidOrders", "deliveredOrders"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    proptest! {
        #[test]
        fn seller_rows_never_leak_foreign_lines(
            orders in prop::collection::vec(
                prop::collection::vec((0usize..4, 1i32..20, 1i64..10_000), 1..6),
                0..12,
            )
        ) {
            let sellers = [Uuid::new_v4(), Uuid::new_v4()];
            let products: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            let catalog: HashMap<Uuid, (Option<Uuid>, String)> = products
                .iter()
                .enumerate()
                .map(|(i, id)| (*id, (Some(sellers[i % 2]), format!("p{}", i))))
                .collect();

            let details: Vec<OrderDetails> = orders
                .iter()
                .enumerate()
                .map(|(n, lines)| {
                    let lines: Vec<(Uuid, i32, Decimal)> = lines
                        .iter()
                        .map(|(p, q, cents)| (products[*p], *q, Decimal::new(*cents, 2)))
                        .collect();
                    order_with(&lines, n as i64, n % 2 == 0, n % 3 == 0)
                })
                .collect();

            let seller = sellers[0];
            let report = project_for_seller(details, &catalog, &HashMap::new(), seller);

            let mut previous: Option<DateTime<Utc>> = None;
            let mut sales = Decimal::ZERO;
            for row in &report.orders {
                prop_assert!(!row.items.is_empty());
                for line in &row.items {
                    prop_assert_eq!(catalog[&line.product_id].0, Some(seller));
                }
                let expected: Decimal = row
                    .items
                    .iter()
                    .map(|l| l.unit_price * Decimal::from(l.quantity))
                    .sum();
                prop_assert_eq!(row.seller_total, expected);
                if let Some(prev) = previous {
                    prop_assert!(prev >= row.created_at);
                }
                previous = Some(row.created_at);
                sales += row.seller_total;
            }
            prop_assert_eq!(report.statistics.total_orders, report.orders.len());
            prop_assert_eq!(report.statistics.total_sales, sales);
        }
    }
}
