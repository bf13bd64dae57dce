use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbol used for portfolio-wide results.
pub const PORTFOLIO_SYMBOL: &str = "PORTFOLIO";

/// Fiscal period tag for a fundamental record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Q4,
    Annual,
}

impl FiscalPeriod {
    /// Parse a provider period tag ("Q1".."Q4", "FY", "Annual").
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "Q1" => Some(FiscalPeriod::Q1),
            "Q2" => Some(FiscalPeriod::Q2),
            "Q3" => Some(FiscalPeriod::Q3),
            "Q4" => Some(FiscalPeriod::Q4),
            "FY" | "ANNUAL" | "A" | "Y" => Some(FiscalPeriod::Annual),
            _ => None,
        }
    }

    pub fn is_quarterly(&self) -> bool {
        !matches!(self, FiscalPeriod::Annual)
    }
}

/// Per-period fundamental record as delivered by the data provider, before
/// normalization. Every financial field is optional; the period tag is a raw
/// string; monetary fields may be reported at a non-unit currency scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFundamental {
    pub symbol: String,
    pub fiscal_period: String,
    pub fiscal_year: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Multiplier for monetary fields (e.g. 1_000.0 when reported in thousands).
    #[serde(default)]
    pub currency_scale: Option<f64>,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub investing_cash_flow: Option<f64>,
    pub assets: Option<f64>,
    pub liabilities: Option<f64>,
    pub equity: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub diluted_eps: Option<f64>,
}

/// Canonical quarterly fundamental record. Unique per symbol by
/// (fiscal_year, fiscal_period); series are kept newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalPeriod {
    pub symbol: String,
    pub fiscal_period: FiscalPeriod,
    pub fiscal_year: i32,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub investing_cash_flow: Option<f64>,
    pub assets: Option<f64>,
    pub liabilities: Option<f64>,
    pub equity: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub diluted_eps: Option<f64>,
}

impl FundamentalPeriod {
    pub fn operating_margin(&self) -> Option<f64> {
        match (self.operating_income, self.revenue) {
            (Some(oi), Some(rev)) if rev > 0.0 => Some(oi / rev),
            _ => None,
        }
    }

    pub fn gross_margin(&self) -> Option<f64> {
        match (self.gross_profit, self.revenue) {
            (Some(gp), Some(rev)) if rev > 0.0 => Some(gp / rev),
            _ => None,
        }
    }
}

/// Sum an optional field across the most recent `n` quarters, returning None
/// when every quarter is missing the field. Index 0 must be the latest quarter.
pub fn sum_recent(quarters: &[FundamentalPeriod], n: usize, field: fn(&FundamentalPeriod) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = quarters.iter().take(n).filter_map(field).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

/// Daily OHLCV bar. Chronologically unique per symbol, oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single cash dividend payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DividendEvent {
    pub symbol: String,
    pub pay_date: NaiveDate,
    pub ex_date: Option<NaiveDate>,
    /// Cash amount per share, never negative after normalization.
    pub cash_amount: f64,
    /// Payments per year declared by the provider (0 = unknown).
    pub payments_per_year: u32,
}

/// Static company context shared across engines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: Option<String>,
    pub sic_code: Option<String>,
    pub sic_description: Option<String>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub employee_count: Option<f64>,
    pub beta: Option<f64>,
}

/// A portfolio position. `weight` is derived from quantity and price and is
/// recomputed whenever the holding set changes; it is never independent state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub last_price: f64,
    pub sector: Option<String>,
    pub weight: f64,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, quantity: f64, last_price: f64, sector: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            last_price,
            sector,
            weight: 0.0,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.last_price
    }
}

/// Recompute derived weights from quantity x price over the portfolio total.
pub fn recompute_weights(holdings: &mut [Holding]) {
    let total: f64 = holdings.iter().map(Holding::market_value).sum();
    for h in holdings.iter_mut() {
        h.weight = if total > 0.0 { h.market_value() / total } else { 0.0 };
    }
}

/// Identifier of the model that produced an AnalysisResult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    Dcf,
    DividendGrowth,
    Technical,
    FactorExposure,
    EarningsQuality,
    CompetitiveMoat,
    EsgProxy,
    CapitalAllocation,
    SectorAttribution,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Dcf => "dcf",
            ModelId::DividendGrowth => "dividend_growth",
            ModelId::Technical => "technical",
            ModelId::FactorExposure => "factor_exposure",
            ModelId::EarningsQuality => "earnings_quality",
            ModelId::CompetitiveMoat => "competitive_moat",
            ModelId::EsgProxy => "esg_proxy",
            ModelId::CapitalAllocation => "capital_allocation",
            ModelId::SectorAttribution => "sector_attribution",
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output contract of every engine: named scalar metrics, named time-ordered
/// series, a verdict/grade string, and ordered human-readable warnings.
/// Read-only once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub model: ModelId,
    /// Ticker, or "PORTFOLIO" for portfolio-wide models.
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    /// False when the model does not apply to this input (e.g. no dividends).
    pub applicable: bool,
    pub verdict: String,
    pub scalar_metrics: BTreeMap<String, f64>,
    pub series: BTreeMap<String, Vec<f64>>,
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    pub fn new(model: ModelId, symbol: impl Into<String>) -> Self {
        Self {
            model,
            symbol: symbol.into(),
            generated_at: Utc::now(),
            applicable: true,
            verdict: String::new(),
            scalar_metrics: BTreeMap::new(),
            series: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// A distinguished "model not applicable" result. Never an error: the
    /// reason is carried as the first warning.
    pub fn not_applicable(model: ModelId, symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut result = Self::new(model, symbol);
        result.applicable = false;
        result.verdict = "Not Applicable".to_string();
        result.warnings.push(reason.into());
        result
    }

    pub fn metric(&mut self, key: &str, value: f64) {
        self.scalar_metrics.insert(key.to_string(), value);
    }

    /// Insert a metric only when the value is present.
    pub fn metric_opt(&mut self, key: &str, value: Option<f64>) {
        if let Some(v) = value {
            self.metric(key, v);
        }
    }

    pub fn add_series(&mut self, key: &str, values: Vec<f64>) {
        self.series.insert(key.to_string(), values);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn get_metric(&self, key: &str) -> Option<f64> {
        self.scalar_metrics.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let mut holdings = vec![
            Holding::new("AAA", 10.0, 50.0, None),
            Holding::new("BBB", 5.0, 100.0, None),
            Holding::new("CCC", 20.0, 25.0, None),
        ];
        recompute_weights(&mut holdings);
        let total: f64 = holdings.iter().map(|h| h.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((holdings[0].weight - 500.0 / 1500.0).abs() < 1e-12);
    }

    #[test]
    fn weights_zero_portfolio() {
        let mut holdings = vec![Holding::new("AAA", 0.0, 0.0, None)];
        recompute_weights(&mut holdings);
        assert_eq!(holdings[0].weight, 0.0);
    }

    #[test]
    fn analysis_result_round_trips_scalar_metrics() {
        let mut result = AnalysisResult::new(ModelId::Dcf, "TEST");
        result.metric("fair_value", 123.456789);
        result.metric("wacc", 0.0925);
        result.add_series("projected_fcf", vec![1.0, 2.5, 3.75]);
        result.warn("example caveat");

        let json = serde_json::to_string(&result).unwrap();
        let parsed: AnalysisResult = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.scalar_metrics, result.scalar_metrics);
        assert_eq!(parsed.series, result.series);
        assert_eq!(parsed.warnings, result.warnings);
        assert_eq!(parsed.verdict, result.verdict);
    }

    #[test]
    fn not_applicable_carries_reason() {
        let result = AnalysisResult::not_applicable(ModelId::DividendGrowth, "NOPE", "no dividend history");
        assert!(!result.applicable);
        assert_eq!(result.verdict, "Not Applicable");
        assert_eq!(result.warnings[0], "no dividend history");
    }

    #[test]
    fn fiscal_period_parsing() {
        assert_eq!(FiscalPeriod::parse("q2"), Some(FiscalPeriod::Q2));
        assert_eq!(FiscalPeriod::parse("FY"), Some(FiscalPeriod::Annual));
        assert_eq!(FiscalPeriod::parse("TTM"), None);
        assert!(FiscalPeriod::Q4.is_quarterly());
        assert!(!FiscalPeriod::Annual.is_quarterly());
    }
}
