//! Competitive position: a 4-component moat rating, a management quality
//! score, a peer-relative composite, and a data-driven SWOT summary.

use research_core::{
    profile_for, sum_recent, AnalysisError, AnalysisResult, CompanyProfile, FundamentalPeriod,
    ModelId, Sector,
};
use serde::{Deserialize, Serialize};

const MIN_PEERS: usize = 3;

/// Inputs for one company in the peer group. `quarters` is newest-first.
#[derive(Debug, Clone)]
pub struct CompanyData {
    pub symbol: String,
    pub quarters: Vec<FundamentalPeriod>,
    pub profile: CompanyProfile,
    pub price: Option<f64>,
}

/// Fixed peer rosters per sector, used by callers to decide what to fetch.
pub fn peer_roster(sector: Sector) -> &'static [&'static str] {
    match sector {
        Sector::Software => &["MSFT", "ORCL", "CRM", "ADBE", "NOW", "INTU"],
        Sector::Semiconductors => &["NVDA", "AMD", "INTC", "TXN", "QCOM", "AVGO"],
        Sector::Pharma => &["JNJ", "PFE", "MRK", "ABBV", "LLY", "BMY"],
        Sector::Banking => &["JPM", "BAC", "WFC", "C", "GS", "MS"],
        Sector::Insurance => &["PGR", "ALL", "TRV", "CB", "AIG"],
        Sector::Retail => &["WMT", "TGT", "COST", "HD", "LOW"],
        Sector::Restaurants => &["MCD", "SBUX", "CMG", "YUM", "DRI"],
        Sector::Energy => &["XOM", "CVX", "COP", "SLB", "EOG"],
        Sector::Utilities => &["NEE", "DUK", "SO", "D", "AEP"],
        Sector::Telecom => &["T", "VZ", "TMUS", "CMCSA"],
        Sector::Media => &["DIS", "NFLX", "WBD", "PARA", "FOXA"],
        Sector::Industrials => &["GE", "HON", "CAT", "DE", "MMM", "EMR"],
        Sector::Autos => &["TSLA", "F", "GM", "STLA", "RIVN"],
        Sector::Aerospace => &["BA", "LMT", "RTX", "NOC", "GD"],
        Sector::ConsumerStaples => &["PG", "KO", "PEP", "CL", "KMB"],
        Sector::Transportation => &["UNP", "UPS", "FDX", "CSX", "NSC"],
        Sector::RealEstate => &["PLD", "AMT", "EQIX", "SPG", "O"],
        Sector::General => &["AAPL", "MSFT", "BRK.B", "JNJ", "JPM"],
    }
}

/// TTM metrics derived for one company, used for peer comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerMetrics {
    pub symbol: String,
    pub revenue_ttm: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub revenue_growth_yoy: Option<f64>,
    pub revenue_per_employee: Option<f64>,
    pub earnings_yield: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

/// SWOT bullets derived from metric comparisons; 2-4 entries per quadrant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwotSummary {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

/// Full output: the scored result for the subject company, the peer metric
/// table, and the SWOT summary.
#[derive(Debug, Clone)]
pub struct CompetitiveReport {
    pub result: AnalysisResult,
    pub peers: Vec<PeerMetrics>,
    pub swot: SwotSummary,
}

pub struct CompetitiveMoatEngine;

fn ttm_metrics(company: &CompanyData) -> PeerMetrics {
    let q = &company.quarters;
    let revenue_ttm = sum_recent(q, 4, |p| p.revenue);
    let gross_ttm = sum_recent(q, 4, |p| p.gross_profit);
    let operating_ttm = sum_recent(q, 4, |p| p.operating_income);
    let net_ttm = sum_recent(q, 4, |p| p.net_income);

    let margin = |num: Option<f64>| match (num, revenue_ttm) {
        (Some(n), Some(rev)) if rev > 0.0 => Some(n / rev),
        _ => None,
    };

    let revenue_growth_yoy = match (revenue_ttm, sum_recent(&q[4.min(q.len())..], 4, |p| p.revenue)) {
        (Some(cur), Some(prior)) if prior > 0.0 => Some((cur - prior) / prior),
        _ => None,
    };

    let revenue_per_employee = match (revenue_ttm, company.profile.employee_count) {
        (Some(rev), Some(emp)) if emp > 0.0 => Some(rev / emp),
        _ => None,
    };

    let earnings_yield = match (net_ttm, company.profile.market_cap) {
        (Some(ni), Some(mcap)) if mcap > 0.0 => Some(ni / mcap),
        _ => None,
    };

    let return_on_equity = match (net_ttm, q.first().and_then(|p| p.equity)) {
        (Some(ni), Some(eq)) if eq > 0.0 => Some(ni / eq),
        _ => None,
    };

    let return_on_assets = match (net_ttm, q.first().and_then(|p| p.assets)) {
        (Some(ni), Some(assets)) if assets > 0.0 => Some(ni / assets),
        _ => None,
    };

    let debt_to_equity = match (
        q.first().and_then(|p| p.long_term_debt.or_else(|| p.liabilities.map(|l| l * 0.35))),
        q.first().and_then(|p| p.equity).filter(|&e| e > 0.0),
    ) {
        (Some(debt), Some(eq)) => Some(debt / eq),
        _ => None,
    };

    PeerMetrics {
        symbol: company.symbol.clone(),
        revenue_ttm,
        gross_margin: margin(gross_ttm),
        operating_margin: margin(operating_ttm),
        net_margin: margin(net_ttm),
        revenue_growth_yoy,
        revenue_per_employee,
        earnings_yield,
        return_on_equity,
        return_on_assets,
        debt_to_equity,
    }
}

fn median(values: &mut Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn peer_median(peers: &[PeerMetrics], field: fn(&PeerMetrics) -> Option<f64>) -> Option<f64> {
    let mut values: Vec<f64> = peers.iter().filter_map(field).collect();
    median(&mut values)
}

/// Min-max normalize `value` within `values`; 0.5 when the range is
/// degenerate.
fn normalize(value: f64, values: &[f64]) -> f64 {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() || max - min < f64::EPSILON {
        0.5
    } else {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    }
}

fn brand_score(gross_margin: Option<f64>) -> f64 {
    match gross_margin {
        Some(gm) if gm > 0.60 => 5.0,
        Some(gm) if gm > 0.45 => 4.0,
        Some(gm) if gm > 0.30 => 3.0,
        Some(gm) if gm > 0.15 => 2.0,
        _ => 1.0,
    }
}

fn cost_score(operating_margin: Option<f64>, sector_median: Option<f64>) -> f64 {
    match (operating_margin, sector_median) {
        (Some(om), Some(med)) => {
            if om > med * 1.5 {
                5.0
            } else if om > med * 1.2 {
                4.0
            } else if om > med {
                3.0
            } else if om > med * 0.7 {
                2.0
            } else {
                1.0
            }
        }
        _ => 2.5,
    }
}

fn network_score(revenue_per_employee: Option<f64>) -> f64 {
    match revenue_per_employee {
        Some(rpe) if rpe > 1_500_000.0 => 5.0,
        Some(rpe) if rpe > 800_000.0 => 4.0,
        Some(rpe) if rpe > 400_000.0 => 3.0,
        Some(rpe) if rpe > 200_000.0 => 2.0,
        _ => 1.0,
    }
}

/// Switching costs proxy: steady growth at scale suggests a locked-in base.
fn switching_score(metrics: &PeerMetrics, quarters: &[FundamentalPeriod]) -> f64 {
    let revenues: Vec<f64> = quarters.iter().rev().filter_map(|q| q.revenue).collect();
    if revenues.len() < 4 {
        return 2.5;
    }
    let growths: Vec<f64> = revenues
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if growths.is_empty() {
        return 2.5;
    }
    let mean = growths.iter().sum::<f64>() / growths.len() as f64;
    let variance = growths.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / growths.len() as f64;
    let stability = if variance.sqrt() < 0.03 {
        2.5
    } else if variance.sqrt() < 0.08 {
        2.0
    } else {
        1.0
    };
    let scale = match metrics.revenue_ttm {
        Some(rev) if rev > 10.0e9 => 2.5,
        Some(rev) if rev > 1.0e9 => 2.0,
        Some(rev) if rev > 100.0e6 => 1.5,
        _ => 1.0,
    };
    stability + scale
}

/// 0-10 across returns, profitability, growth, leverage, and efficiency.
fn management_score(metrics: &PeerMetrics) -> f64 {
    let mut score: f64 = 0.0;
    match metrics.return_on_equity {
        Some(roe) if roe > 0.20 => score += 3.0,
        Some(roe) if roe > 0.12 => score += 2.0,
        Some(roe) if roe > 0.05 => score += 1.0,
        None => score += 1.5,
        _ => {}
    }
    match metrics.operating_margin {
        Some(om) if om > 0.20 => score += 2.0,
        Some(om) if om > 0.10 => score += 1.5,
        Some(om) if om > 0.0 => score += 1.0,
        _ => {}
    }
    match metrics.revenue_growth_yoy {
        Some(g) if g > 0.15 => score += 2.0,
        Some(g) if g > 0.05 => score += 1.5,
        Some(g) if g > 0.0 => score += 1.0,
        _ => {}
    }
    match metrics.debt_to_equity {
        Some(de) if de < 0.5 => score += 1.5,
        Some(de) if de < 1.5 => score += 1.0,
        None => score += 0.75,
        _ => {}
    }
    match metrics.revenue_per_employee {
        Some(rpe) if rpe > 800_000.0 => score += 1.5,
        Some(rpe) if rpe > 300_000.0 => score += 1.0,
        Some(rpe) if rpe > 100_000.0 => score += 0.5,
        _ => {}
    }
    score.min(10.0)
}

fn build_swot(subject: &PeerMetrics, peers: &[PeerMetrics], sector: Sector) -> SwotSummary {
    let mut swot = SwotSummary::default();
    let med_gm = peer_median(peers, |p| p.gross_margin);
    let med_om = peer_median(peers, |p| p.operating_margin);
    let med_growth = peer_median(peers, |p| p.revenue_growth_yoy);

    match (subject.gross_margin, med_gm) {
        (Some(gm), Some(med)) if gm > med => swot
            .strengths
            .push(format!("Gross margin {:.0}% above the peer median {:.0}%", gm * 100.0, med * 100.0)),
        (Some(gm), Some(med)) => swot
            .weaknesses
            .push(format!("Gross margin {:.0}% below the peer median {:.0}%", gm * 100.0, med * 100.0)),
        _ => {}
    }
    match (subject.operating_margin, med_om) {
        (Some(om), Some(med)) if om > med => swot
            .strengths
            .push(format!("Operating margin {:.0}% leads the peer group", om * 100.0)),
        (Some(om), Some(_)) => swot
            .weaknesses
            .push(format!("Operating margin {:.0}% trails the peer group", om * 100.0)),
        _ => {}
    }
    match (subject.revenue_growth_yoy, med_growth) {
        (Some(g), Some(med)) if g > med => swot
            .strengths
            .push(format!("Revenue growing {:.0}% year over year, ahead of peers", g * 100.0)),
        (Some(g), Some(_)) if g > 0.0 => swot
            .opportunities
            .push(format!("Revenue growth {:.0}% lags peers; room to close the gap", g * 100.0)),
        (Some(_), Some(_)) => swot.weaknesses.push("Revenue shrinking year over year".to_string()),
        _ => {}
    }
    if let Some(roe) = subject.return_on_equity {
        if roe > 0.15 {
            swot.strengths.push(format!("Return on equity {:.0}%", roe * 100.0));
        } else if roe < 0.05 {
            swot.weaknesses.push(format!("Return on equity only {:.1}%", roe * 100.0));
        }
    }
    if let Some(g) = subject.revenue_growth_yoy {
        if g > 0.10 {
            swot.opportunities
                .push("Sustained double-digit growth supports share gains".to_string());
        }
    }

    // Each quadrant carries 2-4 entries; thin quadrants are padded from
    // absolute metric levels before the generic fallback.
    let strength_pads = [
        (subject.revenue_ttm.map_or(false, |r| r > 1.0e9), "Established revenue base at scale"),
        (subject.debt_to_equity.map_or(false, |de| de < 1.0), "Conservative balance-sheet leverage"),
        (true, "Multi-year operating history in the sector"),
        (true, "Entrenched customer relationships"),
    ];
    for (applies, text) in strength_pads {
        if swot.strengths.len() >= 2 {
            break;
        }
        if applies {
            swot.strengths.push(text.to_string());
        }
    }
    let weakness_pads = [
        (subject.revenue_growth_yoy.map_or(true, |g| g < 0.05), "Limited organic growth momentum"),
        (subject.debt_to_equity.map_or(false, |de| de > 1.0), "Elevated balance-sheet leverage"),
        (true, "Margins hold no clear edge over the peer median"),
        (true, "Scale advantage over peers not evident"),
    ];
    for (applies, text) in weakness_pads {
        if swot.weaknesses.len() >= 2 {
            break;
        }
        if applies {
            swot.weaknesses.push(text.to_string());
        }
    }
    let opportunity_pads = [
        format!("Consolidation potential within {}", sector.label()),
        "Margin expansion from operating leverage".to_string(),
    ];
    for text in opportunity_pads {
        if swot.opportunities.len() >= 2 {
            break;
        }
        swot.opportunities.push(text);
    }

    swot.threats = match sector {
        Sector::Software => vec![
            "Platform shifts can erode entrenched positions quickly".to_string(),
            "Open-source and bundled alternatives pressure pricing".to_string(),
        ],
        Sector::Semiconductors => vec![
            "Cyclical demand swings and inventory corrections".to_string(),
            "Capital intensity of leading-edge capacity".to_string(),
        ],
        Sector::Pharma => vec![
            "Patent cliffs expose franchises to generics".to_string(),
            "Drug pricing regulation risk".to_string(),
        ],
        Sector::Energy => vec![
            "Commodity price cycles dominate earnings".to_string(),
            "Energy-transition policy pressure on long-lived assets".to_string(),
        ],
        Sector::Retail | Sector::ConsumerStaples => vec![
            "Private-label and discounter price competition".to_string(),
            "Thin margins leave little room for cost shocks".to_string(),
        ],
        Sector::Banking | Sector::Insurance => vec![
            "Credit cycle and rate sensitivity".to_string(),
            "Regulatory capital requirements limit flexibility".to_string(),
        ],
        _ => vec![
            "New entrants with lower cost structures".to_string(),
            "Macroeconomic sensitivity of end-market demand".to_string(),
        ],
    };

    for bucket in [&mut swot.strengths, &mut swot.weaknesses, &mut swot.opportunities, &mut swot.threats] {
        bucket.truncate(4);
    }
    swot
}

impl CompetitiveMoatEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score `subject` against its peer group. Peers with no usable revenue
    /// are dropped; fewer than 3 survivors fails the whole comparison.
    pub fn evaluate(
        &self,
        subject: &CompanyData,
        peer_companies: &[CompanyData],
        sector: Sector,
    ) -> Result<CompetitiveReport, AnalysisError> {
        let subject_metrics = ttm_metrics(subject);

        let mut peers: Vec<PeerMetrics> = peer_companies
            .iter()
            .map(ttm_metrics)
            .filter(|m| m.revenue_ttm.is_some())
            .collect();
        let missing: Vec<String> = peer_companies
            .iter()
            .filter(|c| !peers.iter().any(|p| p.symbol == c.symbol))
            .map(|c| c.symbol.clone())
            .collect();
        if peers.len() < MIN_PEERS {
            return Err(AnalysisError::BatchFailed {
                context: format!(
                    "Peer comparison for {} needs at least {MIN_PEERS} usable peers, have {}",
                    subject.symbol,
                    peers.len()
                ),
                missing,
            });
        }
        // The subject participates in its own peer statistics.
        peers.push(subject_metrics.clone());

        let mut result = AnalysisResult::new(ModelId::CompetitiveMoat, &subject.symbol);
        if !missing.is_empty() {
            result.warn(format!("Peers dropped for missing fundamentals: {}", missing.join(", ")));
        }

        let sector_median_om = peer_median(&peers, |p| p.operating_margin)
            .or(Some(profile_for(sector).target_operating_margin));

        let brand = brand_score(subject_metrics.gross_margin);
        let cost = cost_score(subject_metrics.operating_margin, sector_median_om);
        let network = network_score(subject_metrics.revenue_per_employee);
        let switching = switching_score(&subject_metrics, &subject.quarters);
        let moat = (brand + cost + network + switching) / 4.0;

        result.metric("moat_brand", brand);
        result.metric("moat_cost_advantage", cost);
        result.metric("moat_network_effects", network);
        result.metric("moat_switching_costs", switching);
        result.metric("moat_score", moat);

        let moat_label = if moat >= 4.0 {
            "Wide"
        } else if moat >= 2.5 {
            "Narrow"
        } else {
            "None"
        };

        let management = management_score(&subject_metrics);
        result.metric("management_score", management);

        // Peer-relative composite: every term min-max normalized to [0,1]
        // across the group, subject included.
        let peer_rows: Vec<(String, f64, f64, Option<f64>, Option<f64>)> = peer_companies
            .iter()
            .filter_map(|peer| {
                let metrics = peers.iter().find(|p| p.symbol == peer.symbol)?;
                let peer_moat = (brand_score(metrics.gross_margin)
                    + cost_score(metrics.operating_margin, sector_median_om)
                    + network_score(metrics.revenue_per_employee)
                    + switching_score(metrics, &peer.quarters))
                    / 4.0;
                Some((
                    peer.symbol.clone(),
                    peer_moat,
                    management_score(metrics),
                    metrics.earnings_yield,
                    metrics.revenue_growth_yoy,
                ))
            })
            .collect();

        let mut moats: Vec<f64> = peer_rows.iter().map(|r| r.1).collect();
        moats.push(moat);
        let mut mgmts: Vec<f64> = peer_rows.iter().map(|r| r.2).collect();
        mgmts.push(management);
        let mut yields: Vec<f64> = peer_rows.iter().filter_map(|r| r.3).collect();
        yields.extend(subject_metrics.earnings_yield);
        let mut growths: Vec<f64> = peer_rows.iter().filter_map(|r| r.4).collect();
        growths.extend(subject_metrics.revenue_growth_yoy);

        let composite_of = |m: f64, g: f64, ey: Option<f64>, gr: Option<f64>| {
            0.30 * normalize(m, &moats)
                + 0.25 * normalize(g, &mgmts)
                + 0.25 * ey.map_or(0.5, |v| normalize(v, &yields))
                + 0.20 * gr.map_or(0.5, |v| normalize(v, &growths))
        };
        let composite = composite_of(
            moat,
            management,
            subject_metrics.earnings_yield,
            subject_metrics.revenue_growth_yoy,
        );
        result.metric("composite_score", composite * 100.0);

        // Peer composites and the subject's rank within the group (1 = best).
        let mut rank = 1usize;
        for (symbol, m, g, ey, gr) in &peer_rows {
            let peer_composite = composite_of(*m, *g, *ey, *gr);
            result.metric(&format!("peer_composite_{symbol}"), peer_composite * 100.0);
            if peer_composite > composite {
                rank += 1;
            }
        }
        result.metric("composite_rank", rank as f64);

        result.metric_opt("gross_margin", subject_metrics.gross_margin);
        result.metric_opt("operating_margin", subject_metrics.operating_margin);
        result.metric_opt("revenue_growth_yoy", subject_metrics.revenue_growth_yoy);
        result.metric_opt("return_on_assets", subject_metrics.return_on_assets);
        result.metric_opt("debt_to_equity", subject_metrics.debt_to_equity);
        result.metric("peer_count", (peers.len() - 1) as f64);

        result.verdict = format!("{moat_label} Moat");

        let swot = build_swot(&subject_metrics, &peers, sector);
        peers.pop(); // the table reports actual peers only
        Ok(CompetitiveReport { result, peers, swot })
    }
}

impl Default for CompetitiveMoatEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use research_core::FiscalPeriod;

    fn company(symbol: &str, quarterly_revenue: f64, op_margin: f64, employees: f64) -> CompanyData {
        let quarters: Vec<FundamentalPeriod> = (0..8)
            .map(|i| FundamentalPeriod {
                symbol: symbol.to_string(),
                fiscal_period: FiscalPeriod::Q1,
                fiscal_year: 2025,
                start_date: None,
                end_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
                    - chrono::Months::new(i * 3),
                revenue: Some(quarterly_revenue),
                gross_profit: Some(quarterly_revenue * 0.55),
                operating_income: Some(quarterly_revenue * op_margin),
                net_income: Some(quarterly_revenue * op_margin * 0.8),
                operating_cash_flow: Some(quarterly_revenue * op_margin),
                investing_cash_flow: None,
                assets: Some(quarterly_revenue * 8.0),
                liabilities: Some(quarterly_revenue * 3.0),
                equity: Some(quarterly_revenue * 5.0),
                long_term_debt: None,
                diluted_eps: Some(1.0),
            })
            .collect();
        CompanyData {
            symbol: symbol.to_string(),
            quarters,
            profile: CompanyProfile {
                symbol: symbol.to_string(),
                market_cap: Some(quarterly_revenue * 40.0),
                employee_count: Some(employees),
                ..Default::default()
            },
            price: Some(100.0),
        }
    }

    fn peer_group() -> Vec<CompanyData> {
        vec![
            company("P1", 2.0e9, 0.18, 20_000.0),
            company("P2", 3.0e9, 0.22, 30_000.0),
            company("P3", 1.5e9, 0.15, 25_000.0),
            company("P4", 4.0e9, 0.25, 18_000.0),
        ]
    }

    #[test]
    fn too_few_usable_peers_fails_the_batch() {
        let subject = company("SUBJ", 5.0e9, 0.30, 15_000.0);
        let mut peers = peer_group();
        for peer in peers.iter_mut().take(2) {
            for q in &mut peer.quarters {
                q.revenue = None;
            }
        }
        let err = CompetitiveMoatEngine::new()
            .evaluate(&subject, &peers, Sector::Software)
            .unwrap_err();
        match err {
            AnalysisError::BatchFailed { missing, .. } => {
                assert_eq!(missing, vec!["P1".to_string(), "P2".to_string()]);
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }
    }

    #[test]
    fn high_margin_leader_earns_a_wide_moat() {
        // 55% gross margin, operating margin 1.5x the peer median, high
        // revenue per employee, stable revenue at scale.
        let subject = company("SUBJ", 6.0e9, 0.35, 10_000.0);
        let report = CompetitiveMoatEngine::new()
            .evaluate(&subject, &peer_group(), Sector::Software)
            .unwrap();

        let moat = report.result.get_metric("moat_score").unwrap();
        assert!(moat >= 4.0, "expected a wide moat, got {moat}");
        assert_eq!(report.result.verdict, "Wide Moat");
        assert_eq!(report.peers.len(), 4);
        assert_eq!(report.result.get_metric("composite_rank"), Some(1.0));
        assert!(report.result.get_metric("peer_composite_P1").is_some());
        // Best in group on moat, management, and earnings yield; flat growth
        // group-wide is a degenerate range scored 0.5. With every term
        // min-max normalized: 0.30 + 0.25 + 0.25 + 0.20 * 0.5 = 0.90.
        let composite = report.result.get_metric("composite_score").unwrap();
        assert!((composite - 90.0).abs() < 1e-9, "composite was {composite}");
        assert!(report
            .peers
            .iter()
            .all(|p| p.return_on_assets.is_some() && p.debt_to_equity.is_some()));
    }

    #[test]
    fn management_score_credits_leverage_and_efficiency() {
        // Same returns, margins, and growth; only balance-sheet leverage and
        // revenue per employee differ.
        let lean = company("LEAN", 2.0e9, 0.18, 5_000.0);
        let mut bloated = company("BLOAT", 2.0e9, 0.18, 80_000.0);
        for q in &mut bloated.quarters {
            q.long_term_debt = q.equity.map(|e| e * 2.0);
        }
        let lean_score = management_score(&ttm_metrics(&lean));
        let bloated_score = management_score(&ttm_metrics(&bloated));
        assert!(lean_score > bloated_score);
        assert!((0.0..=10.0).contains(&lean_score));
    }

    #[test]
    fn moat_components_stay_in_range() {
        let subject = company("SUBJ", 0.5e9, 0.05, 50_000.0);
        let report = CompetitiveMoatEngine::new()
            .evaluate(&subject, &peer_group(), Sector::Software)
            .unwrap();
        for key in ["moat_brand", "moat_cost_advantage", "moat_network_effects", "moat_switching_costs"] {
            let v = report.result.get_metric(key).unwrap();
            assert!((1.0..=5.0).contains(&v), "{key} = {v} out of range");
        }
        let mgmt = report.result.get_metric("management_score").unwrap();
        assert!((0.0..=10.0).contains(&mgmt));
        let composite = report.result.get_metric("composite_score").unwrap();
        assert!((0.0..=100.0).contains(&composite));
    }

    #[test]
    fn swot_quadrants_are_populated_and_bounded() {
        let subject = company("SUBJ", 6.0e9, 0.35, 10_000.0);
        let report = CompetitiveMoatEngine::new()
            .evaluate(&subject, &peer_group(), Sector::Software)
            .unwrap();
        for bucket in [
            &report.swot.strengths,
            &report.swot.weaknesses,
            &report.swot.opportunities,
            &report.swot.threats,
        ] {
            assert!(
                (2..=4).contains(&bucket.len()),
                "quadrant has {} items: {bucket:?}",
                bucket.len()
            );
        }
    }

    #[test]
    fn every_sector_has_a_roster() {
        for sector in [Sector::Software, Sector::Energy, Sector::General, Sector::RealEstate] {
            assert!(peer_roster(sector).len() >= 4);
        }
    }
}
