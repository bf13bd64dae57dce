//! Sector-calibrated discounted-cash-flow valuation: 5-year projection with
//! growth decay toward the sector terminal rate, margin mean-reversion, a
//! market-value-weighted WACC, a blended terminal value, and a WACC x
//! terminal-growth sensitivity grid.

use research_core::{
    sum_recent, AnalysisResult, AnalysisError, CompanyProfile, FundamentalPeriod, ModelId,
    SectorProfile,
};
use serde::{Deserialize, Serialize};

const RISK_FREE_RATE: f64 = 0.045;
const EQUITY_RISK_PREMIUM: f64 = 0.055;
const DEBT_SPREAD: f64 = 0.02;
const TAX_RATE: f64 = 0.21;
const PROJECTION_YEARS: usize = 5;
/// Free-cash-flow margin that cash-burning companies mean-revert toward.
const NORMALIZED_FCF_MARGIN: f64 = 0.12;

/// User assumptions overriding the sector calibration. All optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValuationOverrides {
    pub revenue_growth: Option<f64>,
    pub target_margin: Option<f64>,
    pub wacc: Option<f64>,
    pub terminal_growth: Option<f64>,
    pub exit_multiple: Option<f64>,
}

/// Estimated interest-bearing debt: long-term debt when reported, otherwise a
/// fraction of total liabilities (the record has no non-current split).
fn financial_debt(latest: &FundamentalPeriod) -> Option<f64> {
    latest
        .long_term_debt
        .or_else(|| latest.liabilities.map(|l| l * 0.35))
}

/// Estimated cash position: a fraction of total assets (the record has no
/// current-asset split to halve).
fn cash_estimate(latest: &FundamentalPeriod) -> Option<f64> {
    latest.assets.map(|a| a * 0.15)
}

/// Terminal value blending a Gordon perpetuity on year-5 FCF and an exit
/// multiple on year-5 operating income. When only one term is positive, that
/// term is used alone; when neither is, the caller falls back to a revenue
/// multiple.
fn terminal_value(
    fcf_5: f64,
    op_income_5: f64,
    wacc: f64,
    terminal_growth: f64,
    exit_multiple: f64,
) -> Option<f64> {
    let gordon = if wacc > terminal_growth && fcf_5 > 0.0 {
        Some(fcf_5 * (1.0 + terminal_growth) / (wacc - terminal_growth))
    } else {
        None
    };
    let multiple = if op_income_5 > 0.0 {
        Some(op_income_5 * exit_multiple)
    } else {
        None
    };

    match (gordon, multiple) {
        (Some(g), Some(m)) => Some((g + m) / 2.0),
        (Some(g), None) => Some(g),
        (None, Some(m)) => Some(m),
        (None, None) => None,
    }
}

/// Discount a fixed FCF path and terminal value at `wacc` into a fair value
/// per share (or total equity value when shares are unknown), floored at 0.
fn discounted_fair_value(
    fcf_path: &[f64],
    op_income_5: f64,
    revenue_5: f64,
    wacc: f64,
    terminal_growth: f64,
    exit_multiple: f64,
    net_debt: f64,
    shares: Option<f64>,
) -> f64 {
    let discounted: f64 = fcf_path
        .iter()
        .enumerate()
        .map(|(i, fcf)| fcf / (1.0 + wacc).powi(i as i32 + 1))
        .sum();

    let tv = terminal_value(fcf_path[PROJECTION_YEARS - 1], op_income_5, wacc, terminal_growth, exit_multiple)
        .unwrap_or(2.0 * revenue_5);
    let enterprise = discounted + tv / (1.0 + wacc).powi(PROJECTION_YEARS as i32);
    let equity = (enterprise - net_debt).max(0.0);

    match shares {
        Some(s) if s > 0.0 => equity / s,
        _ => equity,
    }
}

pub struct DcfValuationEngine;

impl DcfValuationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pure valuation over normalized quarterly fundamentals. `quarters` is
    /// newest-first; `current_price` anchors the verdict when available.
    pub fn evaluate(
        &self,
        symbol: &str,
        quarters: &[FundamentalPeriod],
        company: &CompanyProfile,
        sector: &SectorProfile,
        overrides: &ValuationOverrides,
        current_price: Option<f64>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if quarters.len() < 2 {
            return Ok(AnalysisResult::not_applicable(
                ModelId::Dcf,
                symbol,
                "DCF requires at least 2 quarters of fundamentals",
            ));
        }

        let mut result = AnalysisResult::new(ModelId::Dcf, symbol);

        let ttm_revenue = match sum_recent(quarters, 4, |q| q.revenue) {
            Some(rev) if rev > 0.0 => rev,
            _ => {
                return Ok(AnalysisResult::not_applicable(
                    ModelId::Dcf,
                    symbol,
                    "DCF requires positive trailing revenue",
                ))
            }
        };
        let ttm_op_income = sum_recent(quarters, 4, |q| q.operating_income);
        let ttm_ocf = sum_recent(quarters, 4, |q| q.operating_cash_flow);
        let ttm_icf = sum_recent(quarters, 4, |q| q.investing_cash_flow);

        // Historical growth: average of the available trailing-4-quarter YoY
        // rates, clamped to [-5%, +30%].
        let mut yoy_rates = Vec::new();
        for i in 0..4 {
            if let (Some(current), Some(prior)) = (
                quarters.get(i).and_then(|q| q.revenue),
                quarters.get(i + 4).and_then(|q| q.revenue),
            ) {
                if prior > 0.0 {
                    yoy_rates.push((current - prior) / prior);
                }
            }
        }
        let historical_growth = if let Some(g) = overrides.revenue_growth {
            g
        } else if yoy_rates.is_empty() {
            result.warn(format!(
                "Insufficient history for revenue growth; using the {} sector default",
                sector.sector.label()
            ));
            sector.default_growth
        } else {
            let avg = yoy_rates.iter().sum::<f64>() / yoy_rates.len() as f64;
            avg.clamp(-0.05, 0.30)
        };

        let terminal_growth = overrides.terminal_growth.unwrap_or(sector.terminal_growth);
        let exit_multiple = overrides.exit_multiple.unwrap_or(sector.exit_multiple);
        let target_margin = overrides.target_margin.unwrap_or(sector.target_operating_margin);

        // Revenue path: growth decays linearly from the historical rate in
        // year 1 to the terminal rate in year 5.
        let mut revenues = Vec::with_capacity(PROJECTION_YEARS);
        let mut growth_path = Vec::with_capacity(PROJECTION_YEARS);
        let mut revenue = ttm_revenue;
        for year in 0..PROJECTION_YEARS {
            let t = year as f64 / (PROJECTION_YEARS - 1) as f64;
            let growth = historical_growth + (terminal_growth - historical_growth) * t;
            revenue *= 1.0 + growth;
            growth_path.push(growth);
            revenues.push(revenue);
        }

        // Operating margin mean-reverts toward the sector target.
        let current_margin = match ttm_op_income {
            Some(op) => op / ttm_revenue,
            None => {
                result.warn("Operating income unavailable; assuming the sector target margin");
                target_margin
            }
        };
        if current_margin < 0.0 {
            result.warn(format!(
                "Negative operating margin normalized toward the {:.0}% sector target over 5 years",
                target_margin * 100.0
            ));
        }
        let margins: Vec<f64> = (1..=PROJECTION_YEARS)
            .map(|y| current_margin + (target_margin - current_margin) * y as f64 / PROJECTION_YEARS as f64)
            .collect();

        // FCF conversion from operating cash flow when profitable, clamped to
        // [0.3, 1.0]; sector default otherwise.
        let conversion = match (ttm_ocf, ttm_op_income) {
            (Some(ocf), Some(op)) if op > 0.0 => (ocf / op).clamp(0.3, 1.0),
            _ => sector.fcf_conversion,
        };

        // Cash-burning-but-FCF-positive path: FCF margin mean-reverting
        // toward 12%.
        let ttm_fcf = match (ttm_ocf, ttm_icf) {
            (Some(ocf), Some(icf)) => Some(ocf + icf),
            (Some(ocf), None) => Some(ocf),
            _ => None,
        };
        let fcf_margin_path: Option<Vec<f64>> = match ttm_fcf {
            Some(fcf) if current_margin < 0.0 && fcf > 0.0 => {
                let current_fcf_margin = fcf / ttm_revenue;
                Some(
                    (1..=PROJECTION_YEARS)
                        .map(|y| {
                            current_fcf_margin
                                + (NORMALIZED_FCF_MARGIN - current_fcf_margin) * y as f64 / PROJECTION_YEARS as f64
                        })
                        .collect(),
                )
            }
            _ => None,
        };

        let op_income_path: Vec<f64> = revenues.iter().zip(&margins).map(|(r, m)| r * m).collect();
        let fcf_path: Vec<f64> = op_income_path
            .iter()
            .enumerate()
            .map(|(i, &op)| {
                let from_conversion = op * conversion;
                match &fcf_margin_path {
                    Some(margins) => from_conversion.max(revenues[i] * margins[i]),
                    None => from_conversion,
                }
            })
            .collect();

        // WACC: market-value-weighted CAPM cost of equity and after-tax cost
        // of debt, clamped to the sector bounds.
        let beta = company.beta.unwrap_or(1.0);
        let cost_of_equity = RISK_FREE_RATE + beta * EQUITY_RISK_PREMIUM;
        let cost_of_debt = (RISK_FREE_RATE + DEBT_SPREAD) * (1.0 - TAX_RATE);
        let latest = &quarters[0];
        let debt = financial_debt(latest).unwrap_or(0.0);
        let equity_weight_base = company
            .market_cap
            .or(latest.equity)
            .filter(|&e| e > 0.0);
        let wacc = if let Some(w) = overrides.wacc {
            w.clamp(sector.wacc_floor, sector.wacc_ceiling)
        } else {
            let blended = match equity_weight_base {
                Some(e) => (e * cost_of_equity + debt * cost_of_debt) / (e + debt),
                None => cost_of_equity,
            };
            blended.clamp(sector.wacc_floor, sector.wacc_ceiling)
        };

        // Terminal value: average of Gordon perpetuity and exit multiple when
        // both are positive; a revenue multiple as a last resort.
        let fcf_5 = fcf_path[PROJECTION_YEARS - 1];
        let op_income_5 = op_income_path[PROJECTION_YEARS - 1];
        let revenue_5 = revenues[PROJECTION_YEARS - 1];
        let tv = match terminal_value(fcf_5, op_income_5, wacc, terminal_growth, exit_multiple) {
            Some(tv) => tv,
            None => {
                result.warn("Terminal value fell back to 2x year-5 revenue (unprofitable in year 5)");
                2.0 * revenue_5
            }
        };

        let discounted_fcf: Vec<f64> = fcf_path
            .iter()
            .enumerate()
            .map(|(i, fcf)| fcf / (1.0 + wacc).powi(i as i32 + 1))
            .collect();
        let enterprise_value =
            discounted_fcf.iter().sum::<f64>() + tv / (1.0 + wacc).powi(PROJECTION_YEARS as i32);

        let net_debt = debt - cash_estimate(latest).unwrap_or(0.0);
        let equity_value_raw = enterprise_value - net_debt;
        if equity_value_raw <= 0.0 {
            result.warn("Enterprise value does not cover estimated net debt; equity value floored at 0");
        }
        let equity_value = equity_value_raw.max(0.0);

        let shares = company.shares_outstanding.filter(|&s| s > 0.0);
        let fair_value_per_share = shares.map(|s| equity_value / s);
        if shares.is_none() {
            result.warn("Shares outstanding unavailable; per-share fair value not computed");
        }

        result.metric("ttm_revenue", ttm_revenue);
        result.metric("historical_growth", historical_growth);
        result.metric("terminal_growth", terminal_growth);
        result.metric("current_operating_margin", current_margin);
        result.metric("target_operating_margin", target_margin);
        result.metric("fcf_conversion", conversion);
        result.metric("cost_of_equity", cost_of_equity);
        result.metric("wacc", wacc);
        result.metric("terminal_value", tv);
        result.metric("enterprise_value", enterprise_value);
        result.metric("net_debt", net_debt);
        result.metric("equity_value", equity_value);
        result.metric_opt("fair_value_per_share", fair_value_per_share);

        result.add_series("growth_path", growth_path);
        result.add_series("projected_revenue", revenues.clone());
        result.add_series("projected_margin", margins);
        result.add_series("projected_fcf", fcf_path.clone());
        result.add_series("discounted_fcf", discounted_fcf);

        // Sensitivity grid: fair value across WACC +/-2% x terminal growth
        // +/-1%, reusing the fixed FCF path. Row-major by WACC.
        let wacc_axis: Vec<f64> = (-2..=2).map(|i| wacc + i as f64 * 0.01).collect();
        let growth_axis: Vec<f64> = (-2..=2).map(|i| terminal_growth + i as f64 * 0.005).collect();
        let mut grid = Vec::with_capacity(wacc_axis.len() * growth_axis.len());
        for &w in &wacc_axis {
            for &g in &growth_axis {
                grid.push(discounted_fair_value(
                    &fcf_path, op_income_5, revenue_5, w, g, exit_multiple, net_debt, shares,
                ));
            }
        }
        result.add_series("sensitivity_waccs", wacc_axis);
        result.add_series("sensitivity_terminal_growths", growth_axis);
        result.add_series("sensitivity_fair_values", grid);

        // Verdict: >+15% upside undervalued, within +/-15% fair, else overvalued.
        result.verdict = match (fair_value_per_share, current_price) {
            (Some(fair), Some(price)) if price > 0.0 => {
                let upside = (fair - price) / price;
                result.metric("upside_pct", upside * 100.0);
                if upside > 0.15 {
                    "Undervalued".to_string()
                } else if upside >= -0.15 {
                    "Fairly Valued".to_string()
                } else {
                    "Overvalued".to_string()
                }
            }
            _ => {
                result.warn("No current price or per-share value; verdict indeterminate");
                "Indeterminate".to_string()
            }
        };

        Ok(result)
    }
}

impl Default for DcfValuationEngine {
    fn default() -> Self {
        Self::new()
    }
}
