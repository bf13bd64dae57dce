//! ESG proxy scoring from financial statements alone. No disclosure data is
//! consulted: environmental intensity comes from sector constants and revenue
//! efficiency, social from workforce productivity and scale, governance from
//! accruals, leverage discipline, and cash conversion. Scores are heuristics
//! and the result always carries a warning saying so.

use research_core::{
    sum_recent, AnalysisError, AnalysisResult, CompanyProfile, FundamentalPeriod, ModelId, Sector,
    PORTFOLIO_SYMBOL,
};

/// Sector baseline for environmental intensity, 0-20 (higher = cleaner).
fn sector_environment_baseline(sector: Sector) -> f64 {
    match sector {
        Sector::Software | Sector::Media => 18.0,
        Sector::Banking | Sector::Insurance | Sector::RealEstate => 16.0,
        Sector::Pharma | Sector::Telecom => 14.0,
        Sector::Semiconductors | Sector::Retail | Sector::Restaurants => 12.0,
        Sector::ConsumerStaples | Sector::Aerospace => 10.0,
        Sector::Industrials | Sector::Autos | Sector::Transportation => 8.0,
        Sector::Utilities => 6.0,
        Sector::Energy => 4.0,
        Sector::General => 10.0,
    }
}

/// Sector baseline for labor standards, 0-10.
fn sector_labor_baseline(sector: Sector) -> f64 {
    match sector {
        Sector::Software | Sector::Pharma | Sector::Banking | Sector::Insurance => 8.0,
        Sector::Semiconductors | Sector::Media | Sector::Telecom | Sector::Aerospace => 7.0,
        Sector::Utilities | Sector::Industrials | Sector::RealEstate => 6.0,
        Sector::ConsumerStaples | Sector::Energy | Sector::Autos => 5.0,
        Sector::Retail | Sector::Restaurants | Sector::Transportation => 4.0,
        Sector::General => 6.0,
    }
}

fn rating_for(total: f64) -> &'static str {
    if total >= 90.0 {
        "AAA"
    } else if total >= 80.0 {
        "AA"
    } else if total >= 70.0 {
        "A"
    } else if total >= 60.0 {
        "BBB"
    } else if total >= 50.0 {
        "BB"
    } else if total >= 40.0 {
        "B"
    } else {
        "CCC"
    }
}

pub struct EsgProxyEngine;

impl EsgProxyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score a single company. Quarters are newest-first; missing inputs fall
    /// back to mid-band values rather than failing.
    pub fn evaluate(
        &self,
        symbol: &str,
        quarters: &[FundamentalPeriod],
        profile: &CompanyProfile,
        sector: Sector,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut result = AnalysisResult::new(ModelId::EsgProxy, symbol);
        result.warn(
            "ESG scores are financial-statement proxies, not disclosure-based ratings",
        );

        let revenue_ttm = sum_recent(quarters, 4, |q| q.revenue);
        let revenue_per_employee = match (revenue_ttm, profile.employee_count) {
            (Some(rev), Some(emp)) if emp > 0.0 => Some(rev / emp),
            _ => None,
        };
        let market_cap = profile.market_cap.filter(|&m| m > 0.0);

        // Environmental, 0-35: sector baseline + revenue efficiency + scale.
        let efficiency_points = match revenue_per_employee {
            Some(rpe) if rpe > 1_000_000.0 => 10.0,
            Some(rpe) if rpe > 500_000.0 => 8.0,
            Some(rpe) if rpe > 250_000.0 => 6.0,
            Some(rpe) if rpe > 100_000.0 => 4.0,
            Some(_) => 2.0,
            None => 5.0,
        };
        let size_points = match market_cap {
            Some(m) if m > 100.0e9 => 5.0,
            Some(m) if m > 10.0e9 => 4.0,
            Some(m) if m > 1.0e9 => 3.0,
            Some(_) => 2.0,
            None => 2.5,
        };
        let environmental = sector_environment_baseline(sector) + efficiency_points + size_points;

        // Social, 0-35: workforce productivity sweet spot + sector labor
        // baseline + company scale (larger firms face more scrutiny and
        // maintain formal programs).
        let productivity_points = match revenue_per_employee {
            // Extremely high revenue per head often means a thin contractor-
            // heavy workforce; the optimum is a broad, productive payroll.
            Some(rpe) if (300_000.0..=1_200_000.0).contains(&rpe) => 15.0,
            Some(rpe) if (150_000.0..300_000.0).contains(&rpe) => 11.0,
            Some(rpe) if rpe > 1_200_000.0 => 9.0,
            Some(_) => 6.0,
            None => 7.5,
        };
        let scale_points = match market_cap {
            Some(m) if m > 50.0e9 => 10.0,
            Some(m) if m > 5.0e9 => 8.0,
            Some(m) if m > 500.0e6 => 6.0,
            Some(_) => 4.0,
            None => 5.0,
        };
        let social = productivity_points + sector_labor_baseline(sector) + scale_points;

        // Governance, 0-30: accounting conservatism, leverage discipline,
        // cash conversion.
        let latest = quarters.first();
        let accrual_points = match latest.and_then(|q| {
            match (q.net_income, q.operating_cash_flow, q.assets) {
                (Some(ni), Some(ocf), Some(assets)) if assets > 0.0 => Some((ni - ocf) / assets),
                _ => None,
            }
        }) {
            Some(acc) if acc < 0.0 => 10.0,
            Some(acc) if acc < 0.03 => 8.0,
            Some(acc) if acc < 0.08 => 5.0,
            Some(_) => 2.0,
            None => 5.0,
        };
        let leverage_points = match latest.and_then(|q| {
            let debt = q.long_term_debt.or_else(|| q.liabilities.map(|l| l * 0.35))?;
            let equity = q.equity.filter(|&e| e > 0.0)?;
            Some(debt / equity)
        }) {
            // A moderate amount of debt signals deliberate capital structure.
            Some(de) if (0.2..=0.8).contains(&de) => 10.0,
            Some(de) if de < 0.2 => 8.0,
            Some(de) if de <= 1.5 => 6.0,
            Some(de) if de <= 2.5 => 3.0,
            Some(_) => 1.0,
            None => 5.0,
        };
        let conversion_points = match (
            sum_recent(quarters, 4, |q| q.operating_cash_flow),
            sum_recent(quarters, 4, |q| q.net_income),
        ) {
            (Some(ocf), Some(ni)) if ni > 0.0 => {
                let ratio = ocf / ni;
                if ratio > 1.1 {
                    10.0
                } else if ratio > 0.9 {
                    7.0
                } else if ratio > 0.6 {
                    4.0
                } else {
                    1.0
                }
            }
            _ => 5.0,
        };
        let governance = accrual_points + leverage_points + conversion_points;

        let total = environmental + social + governance;
        result.metric("environmental_score", environmental);
        result.metric("social_score", social);
        result.metric("governance_score", governance);
        result.metric("esg_total", total);
        result.verdict = rating_for(total).to_string();

        Ok(result)
    }

    /// Value-weighted portfolio rollup over per-company results (weights are
    /// position fractions summing to 1). Companies are paired positionally
    /// with their weights and resolved sectors.
    pub fn evaluate_portfolio(
        &self,
        scored: &[(AnalysisResult, f64, Sector)],
    ) -> Result<AnalysisResult, AnalysisError> {
        if scored.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "Portfolio ESG rollup needs at least one scored holding".to_string(),
            ));
        }

        let mut result = AnalysisResult::new(ModelId::EsgProxy, PORTFOLIO_SYMBOL);
        result.warn(
            "ESG scores are financial-statement proxies, not disclosure-based ratings",
        );

        let total_weight: f64 = scored.iter().map(|(_, w, _)| w).sum();
        if total_weight <= 0.0 {
            return Err(AnalysisError::InvalidData(
                "Portfolio ESG rollup has no positive weight".to_string(),
            ));
        }

        let mut env = 0.0;
        let mut soc = 0.0;
        let mut gov = 0.0;
        let mut best: Option<(&str, f64)> = None;
        let mut worst: Option<(&str, f64)> = None;
        let mut by_sector: std::collections::BTreeMap<&'static str, (f64, f64)> =
            std::collections::BTreeMap::new();
        for (company, weight, sector) in scored {
            let w = weight / total_weight;
            env += w * company.get_metric("environmental_score").unwrap_or(0.0);
            soc += w * company.get_metric("social_score").unwrap_or(0.0);
            gov += w * company.get_metric("governance_score").unwrap_or(0.0);
            if let Some(total) = company.get_metric("esg_total") {
                if best.map_or(true, |(_, b)| total > b) {
                    best = Some((&company.symbol, total));
                }
                if worst.map_or(true, |(_, b)| total < b) {
                    worst = Some((&company.symbol, total));
                }
                let entry = by_sector.entry(sector.label()).or_insert((0.0, 0.0));
                entry.0 += w * total;
                entry.1 += w;
            }
        }

        let total = env + soc + gov;
        result.metric("environmental_score", env);
        result.metric("social_score", soc);
        result.metric("governance_score", gov);
        result.metric("esg_total", total);
        result.metric("holdings_count", scored.len() as f64);
        if let Some((symbol, score)) = best {
            result.metric(&format!("best_{symbol}"), score);
        }
        if let Some((symbol, score)) = worst {
            result.metric(&format!("worst_{symbol}"), score);
        }
        for (label, (weighted_total, weight)) in by_sector {
            if weight > 0.0 {
                result.metric(&format!("sector_avg_{label}"), weighted_total / weight);
            }
        }
        result.verdict = rating_for(total).to_string();

        Ok(result)
    }
}

impl Default for EsgProxyEngine {
    fn default() -> Self {
        Self::new()
    }
}
