//! Capital allocation quality: ROIC versus a CAPM-based WACC, reinvestment
//! discipline, and a 10-point scorecard. Also hosts the Brinson-style sector
//! attribution used for portfolio-versus-benchmark reviews.

use indicators::linreg_slope;
use research_core::{
    sum_recent, AnalysisError, AnalysisResult, CompanyProfile, DividendEvent, FundamentalPeriod,
    ModelId, PORTFOLIO_SYMBOL,
};
use serde::{Deserialize, Serialize};

const RISK_FREE_RATE: f64 = 0.045;
const EQUITY_RISK_PREMIUM: f64 = 0.055;
const DEBT_SPREAD: f64 = 0.02;
const TAX_RATE: f64 = 0.21;
const MIN_QUARTERS: usize = 4;

pub struct CapitalAllocationEngine;

fn invested_capital(q: &FundamentalPeriod) -> Option<f64> {
    let equity = q.equity.filter(|&e| e > 0.0)?;
    let debt = q.long_term_debt.or_else(|| q.liabilities.map(|l| l * 0.35)).unwrap_or(0.0);
    Some(equity + debt)
}

fn quarterly_roic(q: &FundamentalPeriod) -> Option<f64> {
    let nopat = q.operating_income? * (1.0 - TAX_RATE);
    let capital = invested_capital(q)?;
    Some(nopat / capital)
}

impl CapitalAllocationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Assess capital allocation from quarterly fundamentals (newest-first),
    /// the company profile, and the recent dividend history.
    pub fn evaluate(
        &self,
        symbol: &str,
        quarters: &[FundamentalPeriod],
        profile: &CompanyProfile,
        dividends: &[DividendEvent],
    ) -> Result<AnalysisResult, AnalysisError> {
        if quarters.len() < MIN_QUARTERS {
            return Ok(AnalysisResult::not_applicable(
                ModelId::CapitalAllocation,
                symbol,
                format!(
                    "Need at least {MIN_QUARTERS} quarters of fundamentals, have {}",
                    quarters.len()
                ),
            ));
        }

        let mut result = AnalysisResult::new(ModelId::CapitalAllocation, symbol);
        let mut score = 0u32;

        // WACC: 70/30 equity/debt blend off CAPM and a spread over the
        // risk-free rate for debt.
        let beta = profile.beta.unwrap_or(1.0);
        let cost_of_equity = RISK_FREE_RATE + beta * EQUITY_RISK_PREMIUM;
        let cost_of_debt = (RISK_FREE_RATE + DEBT_SPREAD) * (1.0 - TAX_RATE);
        let wacc = 0.7 * cost_of_equity + 0.3 * cost_of_debt;
        result.metric("wacc", wacc);

        // ROIC per quarter (annualized), oldest first.
        let roic_series: Vec<f64> = quarters
            .iter()
            .rev()
            .filter_map(|q| quarterly_roic(q).map(|r| r * 4.0))
            .collect();
        if roic_series.is_empty() {
            result.warn("ROIC not computable: operating income or capital base missing");
        } else {
            let latest_roic = *roic_series.last().unwrap();
            result.metric("roic", latest_roic);
            result.add_series("roic_history", roic_series.clone());

            let spread = latest_roic - wacc;
            result.metric("roic_wacc_spread", spread);
            if spread > 0.10 {
                score += 3;
            } else if spread > 0.03 {
                score += 2;
            } else if spread > 0.0 {
                score += 1;
            } else {
                result.warn("ROIC below the cost of capital: growth likely destroys value");
            }

            if roic_series.len() >= 3 {
                let trend = linreg_slope(&roic_series);
                result.metric("roic_trend", trend);
                if trend > 0.0 {
                    score += 1;
                }
            }
        }

        // Incremental ROIC per consecutive quarter pair: annualized change in
        // NOPAT over the change in assets. Informational, not scored.
        let mut incremental: Vec<f64> = Vec::new();
        for pair in quarters.windows(2) {
            if let (Some(oi_new), Some(oi_old), Some(a_new), Some(a_old)) = (
                pair[0].operating_income,
                pair[1].operating_income,
                pair[0].assets,
                pair[1].assets,
            ) {
                let delta_assets = a_new - a_old;
                if delta_assets > 0.0 {
                    incremental.push((oi_new - oi_old) * 4.0 * (1.0 - TAX_RATE) / delta_assets);
                }
            }
        }
        if !incremental.is_empty() {
            incremental.reverse();
            let avg = incremental.iter().sum::<f64>() / incremental.len() as f64;
            result.metric("incremental_roic", avg);
            result.add_series("incremental_roic_history", incremental);
        }

        // Margin expansion: consecutive-quarter operating margin increases,
        // oldest to newest.
        let margins: Vec<f64> = quarters
            .iter()
            .rev()
            .filter_map(|q| match (q.operating_income, q.revenue) {
                (Some(oi), Some(rev)) if rev > 0.0 => Some(oi / rev),
                _ => None,
            })
            .collect();
        if margins.len() >= 2 {
            let expansions = margins.windows(2).filter(|w| w[1] > w[0]).count();
            result.metric("margin_expansion_count", expansions as f64);
            let pairs = margins.len() - 1;
            if expansions * 2 >= pairs {
                score += 2;
            } else if expansions > 0 {
                score += 1;
            }
        }

        // Revenue growth against the asset growth that funded it.
        let oldest = quarters.last().unwrap();
        let newest = &quarters[0];
        if let (Some(rev_new), Some(rev_old), Some(a_new), Some(a_old)) = (
            newest.revenue,
            oldest.revenue.filter(|&r| r > 0.0),
            newest.assets,
            oldest.assets.filter(|&a| a > 0.0),
        ) {
            let revenue_growth = (rev_new - rev_old) / rev_old;
            let asset_growth = (a_new - a_old) / a_old;
            if asset_growth > 0.0 {
                let ratio = revenue_growth / asset_growth;
                result.metric("revenue_asset_growth_ratio", ratio);
                if ratio > 1.0 {
                    score += 1;
                }
            } else if revenue_growth > 0.0 {
                // Growing sales off a flat or shrinking asset base.
                score += 1;
            }
        }

        // Reinvestment rate: the share of earnings retained in the business.
        let ttm_ni = sum_recent(quarters, 4, |q| q.net_income);
        let annual_dividends = match (dividends.first(), profile.shares_outstanding) {
            (Some(first), Some(shares)) if shares > 0.0 => {
                let ppy = if first.payments_per_year == 0 { 4 } else { first.payments_per_year };
                let dps: f64 = dividends.iter().take(ppy as usize).map(|d| d.cash_amount).sum();
                Some(dps * shares)
            }
            _ => None,
        };
        match (ttm_ni, annual_dividends) {
            (Some(ni), Some(div)) if ni > 0.0 => {
                let reinvestment = (1.0 - div / ni).clamp(0.0, 1.0);
                result.metric("reinvestment_rate", reinvestment);
                let roic_positive = result.get_metric("roic").map_or(false, |r| r > wacc);
                // Heavy reinvestment only deserves credit when returns clear
                // the hurdle; payouts deserve it when they do not.
                if roic_positive && reinvestment > 0.6 {
                    score += 2;
                } else if !roic_positive && reinvestment < 0.4 {
                    score += 2;
                } else if (0.3..=0.7).contains(&reinvestment) {
                    score += 1;
                }
            }
            (Some(ni), None) if ni > 0.0 => {
                result.metric("reinvestment_rate", 1.0);
                if result.get_metric("roic").map_or(false, |r| r > wacc) {
                    score += 2;
                }
            }
            _ => result.warn("Reinvestment rate not computable without positive trailing income"),
        }

        // Balance-sheet discipline.
        if let (Some(debt), Some(equity)) = (
            newest.long_term_debt.or_else(|| newest.liabilities.map(|l| l * 0.35)),
            newest.equity.filter(|&e| e > 0.0),
        ) {
            let de = debt / equity;
            result.metric("debt_to_equity", de);
            if de < 1.0 {
                score += 1;
            }
        }

        // DuPont: ROE = net margin x asset turnover x equity multiplier.
        let ttm_revenue = sum_recent(quarters, 4, |q| q.revenue);
        if let (Some(ni), Some(rev), Some(assets), Some(equity)) = (
            ttm_ni,
            ttm_revenue.filter(|&r| r > 0.0),
            newest.assets.filter(|&a| a > 0.0),
            newest.equity.filter(|&e| e > 0.0),
        ) {
            let net_margin = ni / rev;
            let asset_turnover = rev / assets;
            let equity_multiplier = assets / equity;
            result.metric("dupont_net_margin", net_margin);
            result.metric("dupont_asset_turnover", asset_turnover);
            result.metric("dupont_equity_multiplier", equity_multiplier);
            result.metric("dupont_roe", net_margin * asset_turnover * equity_multiplier);
        }

        let score = score.min(10);
        result.metric("allocation_score", score as f64);

        // Moat label from the score and the ROIC level.
        let latest_roic = result.get_metric("roic");
        result.verdict = if score >= 8 && latest_roic.map_or(false, |r| r > 0.15) {
            "Wide Moat"
        } else if score >= 5 && latest_roic.map_or(false, |r| r > wacc) {
            "Narrow Moat"
        } else {
            "No Moat"
        }
        .to_string();

        Ok(result)
    }
}

impl Default for CapitalAllocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// One sector row for Brinson attribution: the portfolio's weight and return
/// in the sector against the benchmark's. Weights are fractions; returns are
/// period returns as decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorRow {
    pub sector: String,
    pub portfolio_weight: f64,
    pub portfolio_return: f64,
    pub benchmark_weight: f64,
    pub benchmark_return: f64,
}

pub struct SectorAttributionEngine;

impl SectorAttributionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Brinson allocation/selection attribution. Rows labeled "Other" are
    /// excluded and the remaining weights renormalized on both sides.
    pub fn evaluate(&self, rows: &[SectorRow]) -> Result<AnalysisResult, AnalysisError> {
        let rows: Vec<&SectorRow> = rows.iter().filter(|r| r.sector != "Other").collect();
        if rows.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "Sector attribution needs at least one non-Other sector".to_string(),
            ));
        }

        let pw_total: f64 = rows.iter().map(|r| r.portfolio_weight).sum();
        let bw_total: f64 = rows.iter().map(|r| r.benchmark_weight).sum();
        if pw_total <= 0.0 || bw_total <= 0.0 {
            return Err(AnalysisError::InvalidData(
                "Sector attribution weights must sum to a positive total".to_string(),
            ));
        }

        let mut result = AnalysisResult::new(ModelId::SectorAttribution, PORTFOLIO_SYMBOL);
        let mut total_allocation = 0.0;
        let mut total_selection = 0.0;
        let mut portfolio_return = 0.0;
        let mut benchmark_return = 0.0;

        for row in &rows {
            let pw = row.portfolio_weight / pw_total;
            let bw = row.benchmark_weight / bw_total;
            let allocation = (pw - bw) * row.benchmark_return;
            let selection = (row.portfolio_return - row.benchmark_return) * bw;
            total_allocation += allocation;
            total_selection += selection;
            portfolio_return += pw * row.portfolio_return;
            benchmark_return += bw * row.benchmark_return;
            result.metric(&format!("allocation_{}", row.sector), allocation);
            result.metric(&format!("selection_{}", row.sector), selection);
        }

        let active = portfolio_return - benchmark_return;
        result.metric("portfolio_return", portfolio_return);
        result.metric("benchmark_return", benchmark_return);
        result.metric("active_return", active);
        result.metric("total_allocation_effect", total_allocation);
        result.metric("total_selection_effect", total_selection);
        // Interaction absorbs what the two classic effects do not explain.
        result.metric("interaction_effect", active - total_allocation - total_selection);

        result.verdict = if active > 0.005 {
            "Outperforming"
        } else if active >= -0.005 {
            "In Line"
        } else {
            "Underperforming"
        }
        .to_string();

        Ok(result)
    }
}

impl Default for SectorAttributionEngine {
    fn default() -> Self {
        Self::new()
    }
}
