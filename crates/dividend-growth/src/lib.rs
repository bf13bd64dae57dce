//! Dividend growth valuation: Gordon Growth fair value, a 0-5 dividend safety
//! score, and a 10-year income projection with and without reinvestment.

use research_core::{
    sum_recent, AnalysisError, AnalysisResult, CompanyProfile, DividendEvent, FundamentalPeriod,
    ModelId,
};

const RISK_FREE_RATE: f64 = 0.045;
const EQUITY_RISK_PREMIUM: f64 = 0.055;
const DEFAULT_GROWTH: f64 = 0.03;
const PROJECTION_YEARS: usize = 10;
/// Notional investment for the income projection.
const NOTIONAL_INVESTMENT: f64 = 10_000.0;

pub struct DividendGrowthEngine;

impl DividendGrowthEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pure valuation over normalized dividend events (newest-first) and
    /// quarterly fundamentals (newest-first).
    pub fn evaluate(
        &self,
        symbol: &str,
        dividends: &[DividendEvent],
        quarters: &[FundamentalPeriod],
        company: &CompanyProfile,
        current_price: Option<f64>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let payments: Vec<f64> = dividends.iter().map(|d| d.cash_amount).collect();
        if !payments.iter().any(|&p| p > 0.0) {
            return Ok(AnalysisResult::not_applicable(
                ModelId::DividendGrowth,
                symbol,
                "No dividend history; dividend growth model does not apply",
            ));
        }

        let mut result = AnalysisResult::new(ModelId::DividendGrowth, symbol);

        let mut payments_per_year = dividends[0].payments_per_year as usize;
        if payments_per_year == 0 {
            payments_per_year = 4;
            result.warn("Payment frequency unknown; assuming quarterly dividends");
        }

        let annual_dps: f64 = payments.iter().take(payments_per_year).sum();

        // Growth: CAGR of the latest annual total versus the total two payment
        // cycles earlier. Implausible rates give way to a 3% default before
        // the final clamp.
        let older_total: Option<f64> = if payments.len() >= 3 * payments_per_year {
            Some(payments[2 * payments_per_year..3 * payments_per_year].iter().sum())
        } else {
            None
        };
        let growth = match older_total {
            Some(older) if older > 0.0 && annual_dps > 0.0 => {
                let cagr = (annual_dps / older).powf(0.5) - 1.0;
                if !(-0.50..=0.50).contains(&cagr) {
                    result.warn(format!(
                        "Computed dividend growth {:.1}% implausible; using 3% default",
                        cagr * 100.0
                    ));
                    DEFAULT_GROWTH
                } else {
                    cagr
                }
            }
            _ => {
                result.warn("Insufficient dividend history for a growth rate; using 3% default");
                DEFAULT_GROWTH
            }
        };
        let growth = growth.clamp(-0.10, 0.30);

        let beta = company.beta.unwrap_or(1.0);
        let cost_of_equity = RISK_FREE_RATE + beta * EQUITY_RISK_PREMIUM;

        result.metric("annual_dividend", annual_dps);
        result.metric("dividend_growth", growth);
        result.metric("cost_of_equity", cost_of_equity);

        // No silent division: Gordon Growth is undefined whenever r <= g.
        if cost_of_equity <= growth {
            let mut na = AnalysisResult::not_applicable(
                ModelId::DividendGrowth,
                symbol,
                format!(
                    "Cost of equity {:.1}% does not exceed dividend growth {:.1}%; Gordon Growth undefined",
                    cost_of_equity * 100.0,
                    growth * 100.0
                ),
            );
            na.scalar_metrics = result.scalar_metrics.clone();
            return Ok(na);
        }

        let fair_value = annual_dps * (1.0 + growth) / (cost_of_equity - growth);
        result.metric("gordon_fair_value", fair_value);

        // Dividend safety score: one point per passed check, 0-5.
        let mut safety = 0u32;
        let ttm_eps = sum_recent(quarters, 4, |q| q.diluted_eps);
        let ttm_ocf = sum_recent(quarters, 4, |q| q.operating_cash_flow);
        let shares = company.shares_outstanding.filter(|&s| s > 0.0);
        let total_dividends = shares.map(|s| annual_dps * s);

        if let Some(eps) = ttm_eps.filter(|&e| e > 0.0) {
            let payout = annual_dps / eps;
            result.metric("payout_ratio", payout);
            if payout < 0.75 {
                safety += 1;
            }
        }
        if let (Some(ocf), Some(total)) = (ttm_ocf.filter(|&c| c > 0.0), total_dividends) {
            let cf_payout = total / ocf;
            result.metric("cash_flow_payout_ratio", cf_payout);
            if cf_payout < 0.60 {
                safety += 1;
            }
            let coverage = ocf / total;
            result.metric("dividend_coverage", coverage);
            if coverage >= 1.5 {
                safety += 1;
            }
        }
        if let Some(older) = older_total {
            if annual_dps > older {
                safety += 1;
            }
        }
        if let Some(latest) = quarters.first() {
            let debt = latest.long_term_debt.or_else(|| latest.liabilities.map(|l| l * 0.35));
            if let (Some(d), Some(e)) = (debt, latest.equity.filter(|&e| e > 0.0)) {
                let d_to_e = d / e;
                result.metric("debt_to_equity", d_to_e);
                if d_to_e < 1.5 {
                    safety += 1;
                }
            }
        }
        result.metric("safety_score", safety as f64);

        // Annual DPS history, oldest cycle first.
        let mut history: Vec<f64> = payments
            .chunks(payments_per_year)
            .filter(|chunk| chunk.len() == payments_per_year)
            .map(|chunk| chunk.iter().sum())
            .collect();
        history.reverse();
        result.add_series("annual_dps_history", history);

        // 10-year income projection for a fixed notional investment, with and
        // without reinvestment at the current price (no price appreciation).
        if let Some(price) = current_price.filter(|&p| p > 0.0) {
            result.metric("dividend_yield_pct", annual_dps / price * 100.0);

            let initial_shares = NOTIONAL_INVESTMENT / price;
            let mut income_plain = Vec::with_capacity(PROJECTION_YEARS);
            let mut cumulative_plain = Vec::with_capacity(PROJECTION_YEARS);
            let mut income_drip = Vec::with_capacity(PROJECTION_YEARS);
            let mut cumulative_drip = Vec::with_capacity(PROJECTION_YEARS);

            let mut drip_shares = initial_shares;
            let mut total_plain = 0.0;
            let mut total_drip = 0.0;
            for year in 1..=PROJECTION_YEARS {
                let dps_year = annual_dps * (1.0 + growth).powi(year as i32);

                let plain = initial_shares * dps_year;
                total_plain += plain;
                income_plain.push(plain);
                cumulative_plain.push(total_plain);

                let drip = drip_shares * dps_year;
                total_drip += drip;
                income_drip.push(drip);
                cumulative_drip.push(total_drip);
                drip_shares += drip / price;
            }
            result.metric("yield_on_cost_year10_pct", income_drip[PROJECTION_YEARS - 1] / NOTIONAL_INVESTMENT * 100.0);
            result.add_series("income_no_drip", income_plain);
            result.add_series("cumulative_no_drip", cumulative_plain);
            result.add_series("income_drip", income_drip);
            result.add_series("cumulative_drip", cumulative_drip);
        } else {
            result.warn("No current price; yield and income projection not computed");
        }

        result.verdict = match current_price {
            Some(price) if price > 0.0 => {
                let upside = (fair_value - price) / price;
                result.metric("upside_pct", upside * 100.0);
                if upside > 0.15 {
                    "Undervalued".to_string()
                } else if upside >= -0.15 {
                    "Fairly Valued".to_string()
                } else {
                    "Overvalued".to_string()
                }
            }
            _ => "Indeterminate".to_string(),
        };

        Ok(result)
    }
}

impl Default for DividendGrowthEngine {
    fn default() -> Self {
        Self::new()
    }
}
