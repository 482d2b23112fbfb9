//! Daily sales series for the admin dashboard.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::db::{RepositoryError, SaleRecord, Store};

/// Longest range a single report may cover.
pub const MAX_RANGE_DAYS: i64 = 3660;

#[derive(Debug, Error)]
pub enum SalesError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("range of {0} days exceeds the {MAX_RANGE_DAYS}-day limit")]
    RangeTooLong(i64),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Inclusive date range, as given in the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Sales and order count for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    /// `YYYY-MM-DD`
    pub date: NaiveDate,
    pub sales: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub total_sales: Decimal,
    pub total_orders: u64,
    /// One entry per day in the range, ascending, gaps filled with zeros.
    pub series: Vec<DailySales>,
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<i64, SalesError> {
    let days = (end - start).num_days();
    if days < 0 {
        return Err(SalesError::InvalidRange { start, end });
    }
    if days >= MAX_RANGE_DAYS {
        return Err(SalesError::RangeTooLong(days + 1));
    }
    Ok(days)
}

/// Group `records` by UTC calendar day over `[start, end]`.
///
/// Records outside the range are ignored.
///
/// # Errors
///
/// Returns `InvalidRange` if `end` precedes `start`.
pub fn aggregate(start: NaiveDate, end: NaiveDate, records: &[SaleRecord]) -> Result<SalesReport, SalesError> {
    let days = check_range(start, end)?;

    let mut by_day: BTreeMap<NaiveDate, (Decimal, u64)> = BTreeMap::new();
    for record in records {
        let day = record.created_at.date_naive();
        if day < start || day > end {
            continue;
        }
        let entry = by_day.entry(day).or_default();
        entry.0 += record.total_amount;
        entry.1 += 1;
    }

    // Offsets rather than `iter_days`, which stops short of `NaiveDate::MAX`.
    let series: Vec<DailySales> = (0..=days.unsigned_abs())
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .map(|date| {
            let (sales, orders) = by_day.get(&date).copied().unwrap_or_default();
            DailySales {
                date,
                sales,
                orders,
            }
        })
        .collect();

    Ok(SalesReport {
        total_sales: series.iter().map(|d| d.sales).sum(),
        total_orders: series.iter().map(|d| d.orders).sum(),
        series,
    })
}

#[derive(Clone)]
pub struct SalesService<S> {
    store: S,
}

impl<S: Store> SalesService<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Sales between `start 00:00:00` and `end 23:59:59.999` UTC.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for a reversed range, `Repository` if the
    /// store query fails.
    #[instrument(skip(self))]
    pub async fn report(&self, query: SalesQuery) -> Result<SalesReport, SalesError> {
        let SalesQuery {
            start_date,
            end_date,
        } = query;
        check_range(start_date, end_date)?;

        let from = start_date.and_time(NaiveTime::MIN).and_utc();
        let to = end_date
            .and_hms_milli_opt(23, 59, 59, 999)
            .ok_or(SalesError::InvalidRange {
                start: start_date,
                end: end_date,
            })?
            .and_utc();
        let records = self.store.sales_between(from, to).await?;
        aggregate(start_date, end_date, &records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn sale(y: i32, m: u32, d: u32, h: u32, amount: i64) -> SaleRecord {
        SaleRecord {
            created_at: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            total_amount: Decimal::new(amount, 0),
        }
    }

    #[test]
    fn test_single_sale_in_three_day_range() {
        let report = aggregate(
            date("2024-01-01"),
            date("2024-01-03"),
            &[sale(2024, 1, 2, 10, 100)],
        )
        .unwrap();

        assert_eq!(report.total_sales, Decimal::new(100, 0));
        assert_eq!(report.total_orders, 1);
        let series: Vec<(String, Decimal, u64)> = report
            .series
            .iter()
            .map(|d| (d.date.to_string(), d.sales, d.orders))
            .collect();
        assert_eq!(
            series,
            vec![
                ("2024-01-01".to_string(), Decimal::ZERO, 0),
                ("2024-01-02".to_string(), Decimal::new(100, 0), 1),
                ("2024-01-03".to_string(), Decimal::ZERO, 0),
            ]
        );
    }

    #[test]
    fn test_series_has_one_entry_per_day() {
        let start = date("2024-02-20");
        let end = date("2024-03-05");
        let report = aggregate(start, end, &[]).unwrap();

        let expected = usize::try_from((end - start).num_days() + 1).unwrap();
        assert_eq!(report.series.len(), expected);
        assert!(report.series.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(report.series[0].date, start);
        assert_eq!(report.series[expected - 1].date, end);
        assert_eq!(report.total_sales, Decimal::ZERO);
    }

    #[test]
    fn test_same_day_sales_are_summed_and_out_of_range_ignored() {
        let report = aggregate(
            date("2024-01-01"),
            date("2024-01-01"),
            &[
                sale(2024, 1, 1, 0, 40),
                sale(2024, 1, 1, 23, 60),
                sale(2024, 1, 2, 0, 999),
            ],
        )
        .unwrap();
        assert_eq!(report.series.len(), 1);
        assert_eq!(report.series[0].sales, Decimal::new(100, 0));
        assert_eq!(report.total_orders, 2);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(matches!(
            aggregate(date("2024-01-03"), date("2024-01-01"), &[]),
            Err(SalesError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_report_at_the_last_representable_date() {
        use crate::db::MemoryStore;

        let report = SalesService::new(MemoryStore::new())
            .report(SalesQuery {
                start_date: NaiveDate::MAX,
                end_date: NaiveDate::MAX,
            })
            .await
            .unwrap();
        assert_eq!(report.series.len(), 1);
        assert_eq!(report.series[0].date, NaiveDate::MAX);
        assert_eq!(report.total_orders, 0);
    }

    #[tokio::test]
    async fn test_report_includes_whole_end_day() {
        use fakeshion_core::{
            NewOrder, OrderItem, PaymentInfo, PaymentMethod, ProductId, SelectedVariant,
            ShippingInfo, UserId, VariantId,
        };

        use crate::db::{MemoryStore, OrderRepository};

        let store = MemoryStore::new();
        let order = store
            .create_order(
                UserId::new(1),
                &NewOrder {
                    items: vec![OrderItem {
                        product: ProductId::new(1),
                        name: "Linen shirt".to_string(),
                        selected_variant: SelectedVariant {
                            variant_id: VariantId::new(1),
                            color: None,
                            size: None,
                        },
                        quantity: 1,
                        price: Decimal::new(100, 0),
                        image: None,
                    }],
                    shipping_info: ShippingInfo::default(),
                    items_price: Decimal::new(100, 0),
                    shipping_amount: Decimal::ZERO,
                    total_amount: Decimal::new(100, 0),
                    payment_method: PaymentMethod::CashOnDelivery,
                    payment_info: PaymentInfo::default(),
                },
            )
            .await
            .unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 3, 23, 59, 59).unwrap();
        assert!(store.set_order_created_at(order.id, late).await);

        let report = SalesService::new(store)
            .report(SalesQuery {
                start_date: date("2024-01-01"),
                end_date: date("2024-01-03"),
            })
            .await
            .unwrap();
        assert_eq!(report.total_orders, 1);
        assert_eq!(report.series[2].orders, 1);
    }
}
