//! Earnings quality: accruals, a Beneish-style M-Score built from statement
//! proxies, cash conversion, earnings persistence, and revenue quality, rolled
//! into a 0-10 composite and a letter grade.
//!
//! Several Beneish inputs (receivables, SG&A, depreciation) are not available
//! in the normalized quarterly record, so documented proxies stand in:
//! receivables ~ max(revenue - operating cash flow, 0), SG&A ~ gross profit -
//! operating income, and the depreciation index is held at 1.0.

use indicators::linreg_slope;
use research_core::{sum_recent, AnalysisError, AnalysisResult, FundamentalPeriod, ModelId};

const MIN_QUARTERS: usize = 4;
const M_SCORE_THRESHOLD: f64 = -1.78;

pub struct EarningsQualityEngine;

/// Lag-1 autocorrelation; 0 when fewer than 3 points or zero variance.
fn autocorrelation(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if variance == 0.0 {
        return 0.0;
    }
    let covariance: f64 = values
        .windows(2)
        .map(|w| (w[0] - mean) * (w[1] - mean))
        .sum();
    covariance / variance
}

/// Beneish component indexes computed over two consecutive quarters.
struct MScore {
    m: f64,
    dsri: f64,
    gmi: f64,
    aqi: f64,
    sgi: f64,
    sgai: f64,
    tata: f64,
    lvgi: f64,
    depi: f64,
}

/// Beneish M-Score from two consecutive quarters, newest first. None when the
/// required fields are missing or degenerate.
fn beneish_m_score(cur: &FundamentalPeriod, prev: &FundamentalPeriod) -> Option<MScore> {
    let rev_c = cur.revenue.filter(|&v| v > 0.0)?;
    let rev_p = prev.revenue.filter(|&v| v > 0.0)?;
    let assets_c = cur.assets.filter(|&v| v > 0.0)?;
    let assets_p = prev.assets.filter(|&v| v > 0.0)?;
    let gp_c = cur.gross_profit?;
    let gp_p = prev.gross_profit?;
    let oi_c = cur.operating_income?;
    let oi_p = prev.operating_income?;
    let ni_c = cur.net_income?;
    let ocf_c = cur.operating_cash_flow?;
    let liab_c = cur.liabilities.filter(|&v| v > 0.0)?;
    let liab_p = prev.liabilities.filter(|&v| v > 0.0)?;

    let recv_c = (rev_c - ocf_c).max(0.0);
    let recv_p = (rev_p - prev.operating_cash_flow?).max(0.0);
    let dsr_c = recv_c / rev_c;
    let dsr_p = recv_p / rev_p;
    let dsri = if dsr_p > 0.0 { dsr_c / dsr_p } else { 1.0 };

    let gm_c = gp_c / rev_c;
    let gm_p = gp_p / rev_p;
    let gmi = if gm_c > 0.0 { gm_p / gm_c } else { 1.0 };

    let aqi = (assets_c / rev_c) / (assets_p / rev_p);
    let sgi = rev_c / rev_p;

    let sga_c = (gp_c - oi_c).max(0.0);
    let sga_p = (gp_p - oi_p).max(0.0);
    let sgai = if sga_p > 0.0 && rev_p > 0.0 && sga_c > 0.0 {
        (sga_c / rev_c) / (sga_p / rev_p)
    } else {
        1.0
    };

    let tata = (ni_c - ocf_c) / assets_c;
    let lvgi = (liab_c / assets_c) / (liab_p / assets_p);
    let depi = 1.0;

    let m = -4.84 + 0.92 * dsri + 0.528 * gmi + 0.404 * aqi + 0.892 * sgi + 0.115 * depi
        - 0.172 * sgai
        + 4.679 * tata
        - 0.327 * lvgi;
    Some(MScore {
        m,
        dsri,
        gmi,
        aqi,
        sgi,
        sgai,
        tata,
        lvgi,
        depi,
    })
}

impl EarningsQualityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate over quarterly fundamentals, newest first.
    pub fn evaluate(
        &self,
        symbol: &str,
        quarters: &[FundamentalPeriod],
    ) -> Result<AnalysisResult, AnalysisError> {
        if quarters.len() < MIN_QUARTERS {
            return Ok(AnalysisResult::not_applicable(
                ModelId::EarningsQuality,
                symbol,
                format!(
                    "Need at least {MIN_QUARTERS} quarters of fundamentals, have {}",
                    quarters.len()
                ),
            ));
        }

        let mut result = AnalysisResult::new(ModelId::EarningsQuality, symbol);
        let mut composite = 0u32;

        // Accruals ratio per quarter, oldest first in the series. Negative
        // accruals (cash flow exceeding reported income) are the good side.
        let accrual_series: Vec<f64> = quarters
            .iter()
            .rev()
            .filter_map(|q| match (q.net_income, q.operating_cash_flow, q.assets) {
                (Some(ni), Some(ocf), Some(assets)) if assets > 0.0 => Some((ni - ocf) / assets),
                _ => None,
            })
            .collect();
        let latest_accruals = accrual_series.last().copied();
        if let Some(acc) = latest_accruals {
            result.metric("accruals_ratio", acc);
            if acc < 0.0 {
                composite += 2;
            } else if acc < 0.05 {
                composite += 1;
            }
            if acc > 0.10 {
                result.warn("High accruals: reported income far ahead of operating cash flow");
            }
            result.add_series("accruals_history", accrual_series);
        } else {
            result.warn("Accruals not computable: income, cash flow, or assets missing");
        }

        // Beneish M-Score from the two most recent quarters.
        match beneish_m_score(&quarters[0], &quarters[1]) {
            Some(score) => {
                result.metric("m_score", score.m);
                result.metric("dsri", score.dsri);
                result.metric("gmi", score.gmi);
                result.metric("aqi", score.aqi);
                result.metric("sgi", score.sgi);
                result.metric("sgai", score.sgai);
                result.metric("tata", score.tata);
                result.metric("lvgi", score.lvgi);
                result.metric("depi", score.depi);
                if score.m < M_SCORE_THRESHOLD {
                    composite += 2;
                } else {
                    result.warn(format!(
                        "M-Score {:.2} above {M_SCORE_THRESHOLD}: statistically consistent with earnings manipulation",
                        score.m
                    ));
                }
                if score.dsri > 1.5 {
                    result.warn("Receivables proxy growing much faster than revenue");
                }
                if score.gmi > 1.2 {
                    result.warn("Gross margin deteriorating sharply year over year");
                }
            }
            None => result.warn("M-Score not computable: required statement fields missing"),
        }

        // Cash conversion: OCF / net income per profitable quarter, plus its
        // trend across the window.
        let cf_ni_series: Vec<f64> = quarters
            .iter()
            .rev()
            .filter_map(|q| match (q.operating_cash_flow, q.net_income) {
                (Some(ocf), Some(ni)) if ni > 0.0 => Some(ocf / ni),
                _ => None,
            })
            .collect();
        if let Some(&latest_cf_ni) = cf_ni_series.last() {
            result.metric("cash_flow_to_net_income", latest_cf_ni);
            if latest_cf_ni > 1.2 {
                composite += 2;
            } else if latest_cf_ni > 1.0 {
                composite += 1;
            }
            if cf_ni_series.len() >= 3 {
                let slope = linreg_slope(&cf_ni_series);
                result.metric("cash_conversion_trend", slope);
                if slope < -0.05 {
                    result.warn("Cash conversion deteriorating over the window");
                }
            }
            result.add_series("cash_flow_to_net_income_history", cf_ni_series);
        }

        // Persistence: lag-1 autocorrelation of quarterly EPS.
        let eps_series: Vec<f64> = quarters.iter().rev().filter_map(|q| q.diluted_eps).collect();
        if eps_series.len() >= 3 {
            let persistence = autocorrelation(&eps_series);
            result.metric("earnings_persistence", persistence);
            if persistence > 0.6 {
                composite += 2;
            } else if persistence > 0.3 {
                composite += 1;
            }
            if persistence < 0.2 {
                result.warn("Erratic quarter-to-quarter earnings; low persistence");
            }
        }

        // Revenue quality: does cash flow growth keep pace with revenue growth?
        let mut ocf_growth = Vec::new();
        let mut rev_growth = Vec::new();
        for w in quarters.windows(2) {
            if let (Some(c), Some(p)) = (w[0].operating_cash_flow, w[1].operating_cash_flow) {
                if p.abs() > f64::EPSILON {
                    ocf_growth.push((c - p) / p.abs());
                }
            }
            if let (Some(c), Some(p)) = (w[0].revenue, w[1].revenue) {
                if p > 0.0 {
                    rev_growth.push((c - p) / p);
                }
            }
        }
        if !ocf_growth.is_empty() && !rev_growth.is_empty() {
            let avg_ocf = ocf_growth.iter().sum::<f64>() / ocf_growth.len() as f64;
            let avg_rev = rev_growth.iter().sum::<f64>() / rev_growth.len() as f64;
            if avg_rev.abs() > f64::EPSILON {
                let revenue_quality = avg_ocf / avg_rev;
                result.metric("revenue_quality", revenue_quality);
                if revenue_quality > 1.0 {
                    composite += 2;
                } else if revenue_quality > 0.8 {
                    composite += 1;
                }
                if revenue_quality < 0.5 {
                    result.warn("Revenue growth not confirmed by cash flow growth");
                }
            }
        }

        let composite = composite.min(10);
        result.metric("quality_score", composite as f64);
        result.verdict = match composite {
            9..=10 => "A",
            7..=8 => "B",
            5..=6 => "C",
            3..=4 => "D",
            _ => "F",
        }
        .to_string();

        Ok(result)
    }
}

impl Default for EarningsQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}
