//! Record Normalizer: converts raw provider records into the canonical series
//! every engine consumes. All normalization and fallback handling of provider
//! quirks happens here, at the boundary, not inside the engines.

use crate::types::{DividendEvent, FiscalPeriod, FundamentalPeriod, PriceBar, RawFundamental};
use std::collections::BTreeMap;

/// Monetary fields of a fundamental record, for currency rescaling and
/// richness comparison.
fn monetary_fields(p: &FundamentalPeriod) -> [Option<f64>; 10] {
    [
        p.revenue,
        p.gross_profit,
        p.operating_income,
        p.net_income,
        p.operating_cash_flow,
        p.investing_cash_flow,
        p.assets,
        p.liabilities,
        p.equity,
        p.long_term_debt,
    ]
}

fn populated_count(p: &FundamentalPeriod) -> usize {
    monetary_fields(p).iter().filter(|f| f.is_some()).count() + p.diluted_eps.is_some() as usize
}

fn scale(value: Option<f64>, factor: f64) -> Option<f64> {
    value.map(|v| v * factor)
}

/// Build the canonical quarterly series from raw provider records:
/// quarterly granularity only, monetary fields rescaled to unit currency,
/// unique by (fiscal_year, fiscal_period), newest-first.
pub fn quarterly_periods(raw: Vec<RawFundamental>) -> Vec<FundamentalPeriod> {
    let mut by_key: BTreeMap<(i32, FiscalPeriod), FundamentalPeriod> = BTreeMap::new();

    for record in raw {
        let period = match FiscalPeriod::parse(&record.fiscal_period) {
            Some(p) if p.is_quarterly() => p,
            _ => continue,
        };
        let year = match record.fiscal_year {
            Some(y) => y,
            None => continue,
        };
        let end_date = match record.end_date {
            Some(d) => d,
            None => continue,
        };

        let factor = record.currency_scale.unwrap_or(1.0);
        let candidate = FundamentalPeriod {
            symbol: record.symbol,
            fiscal_period: period,
            fiscal_year: year,
            start_date: record.start_date,
            end_date,
            revenue: scale(record.revenue, factor),
            gross_profit: scale(record.gross_profit, factor),
            operating_income: scale(record.operating_income, factor),
            net_income: scale(record.net_income, factor),
            operating_cash_flow: scale(record.operating_cash_flow, factor),
            investing_cash_flow: scale(record.investing_cash_flow, factor),
            assets: scale(record.assets, factor),
            liabilities: scale(record.liabilities, factor),
            equity: scale(record.equity, factor),
            long_term_debt: scale(record.long_term_debt, factor),
            // Per-share, never currency-scaled
            diluted_eps: record.diluted_eps,
        };

        // Duplicate period keys keep the richer record
        match by_key.get(&(year, period)) {
            Some(existing) if populated_count(existing) >= populated_count(&candidate) => {}
            _ => {
                by_key.insert((year, period), candidate);
            }
        }
    }

    let mut periods: Vec<FundamentalPeriod> = by_key.into_values().collect();
    periods.sort_by(|a, b| b.end_date.cmp(&a.end_date));
    periods
}

/// Chronologically sorted, date-unique daily bars; non-positive closes dropped.
pub fn clean_bars(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.retain(|b| b.close > 0.0);
    bars.sort_by(|a, b| a.date.cmp(&b.date));
    bars.dedup_by(|a, b| a.date == b.date);
    bars
}

/// Dividend events with negative amounts dropped, newest-first by pay date.
pub fn clean_dividends(mut dividends: Vec<DividendEvent>) -> Vec<DividendEvent> {
    dividends.retain(|d| d.cash_amount >= 0.0);
    dividends.sort_by(|a, b| b.pay_date.cmp(&a.pay_date));
    dividends
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(symbol: &str, period: &str, year: i32, end: (i32, u32, u32), revenue: Option<f64>) -> RawFundamental {
        RawFundamental {
            symbol: symbol.to_string(),
            fiscal_period: period.to_string(),
            fiscal_year: Some(year),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2),
            revenue,
            ..Default::default()
        }
    }

    #[test]
    fn filters_annual_periods_and_sorts_newest_first() {
        let records = vec![
            raw("T", "Q1", 2024, (2024, 3, 31), Some(10.0)),
            raw("T", "FY", 2024, (2024, 12, 31), Some(44.0)),
            raw("T", "Q3", 2024, (2024, 9, 30), Some(12.0)),
            raw("T", "Q2", 2024, (2024, 6, 30), Some(11.0)),
        ];
        let periods = quarterly_periods(records);
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].fiscal_period, FiscalPeriod::Q3);
        assert_eq!(periods[2].fiscal_period, FiscalPeriod::Q1);
    }

    #[test]
    fn dedupes_on_year_and_period_keeping_richer_record() {
        let mut sparse = raw("T", "Q1", 2024, (2024, 3, 31), Some(10.0));
        sparse.net_income = None;
        let mut rich = raw("T", "Q1", 2024, (2024, 3, 31), Some(10.0));
        rich.net_income = Some(2.0);
        rich.assets = Some(100.0);

        let periods = quarterly_periods(vec![sparse, rich]);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].net_income, Some(2.0));
    }

    #[test]
    fn rescales_monetary_fields_but_not_eps() {
        let mut record = raw("T", "Q1", 2024, (2024, 3, 31), Some(10.0));
        record.currency_scale = Some(1_000.0);
        record.diluted_eps = Some(1.25);

        let periods = quarterly_periods(vec![record]);
        assert_eq!(periods[0].revenue, Some(10_000.0));
        assert_eq!(periods[0].diluted_eps, Some(1.25));
    }

    #[test]
    fn drops_records_without_period_key() {
        let mut record = raw("T", "TTM", 2024, (2024, 3, 31), Some(10.0));
        record.fiscal_year = Some(2024);
        let no_year = RawFundamental {
            fiscal_year: None,
            ..raw("T", "Q1", 2024, (2024, 3, 31), Some(10.0))
        };
        assert!(quarterly_periods(vec![record, no_year]).is_empty());
    }

    #[test]
    fn clean_bars_sorts_and_dedupes() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let bar = |d: u32, close: f64| PriceBar {
            symbol: "T".to_string(),
            date: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        };
        let bars = clean_bars(vec![bar(3, 10.0), bar(1, 9.0), bar(3, 10.5), bar(2, 0.0)]);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, day(1));
        assert_eq!(bars[1].date, day(3));
    }

    #[test]
    fn clean_dividends_drops_negative_amounts() {
        let day = |m: u32| NaiveDate::from_ymd_opt(2024, m, 15).unwrap();
        let event = |m: u32, amount: f64| DividendEvent {
            symbol: "T".to_string(),
            pay_date: day(m),
            ex_date: None,
            cash_amount: amount,
            payments_per_year: 4,
        };
        let cleaned = clean_dividends(vec![event(1, 0.5), event(4, -0.5), event(7, 0.55)]);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].pay_date, day(7));
    }
}
