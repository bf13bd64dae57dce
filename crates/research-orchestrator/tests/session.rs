//! End-to-end session tests over an in-memory provider. The tokio clock is
//! paused, so batch pauses resolve instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use dcf_valuation::ValuationOverrides;
use research_core::{
    recompute_weights, AnalysisError, CompanyProfile, DividendEvent, Holding, MarketDataProvider,
    PriceBar, RawFundamental,
};
use research_orchestrator::{BatchPolicy, BenchmarkSector, ResearchSession};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Serves deterministic data for any symbol and counts provider calls.
#[derive(Default)]
struct FakeProvider {
    fundamentals_calls: AtomicUsize,
    bars_calls: AtomicUsize,
    dividends_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    /// Symbols that fail every request.
    broken: Vec<String>,
}

impl FakeProvider {
    fn failing(symbols: &[&str]) -> Self {
        Self {
            broken: symbols.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn check(&self, symbol: &str) -> Result<(), AnalysisError> {
        if self.broken.iter().any(|s| s == symbol) {
            Err(AnalysisError::ProviderError(format!("no data for {symbol}")))
        } else {
            Ok(())
        }
    }
}

fn raw_quarter(symbol: &str, i: u32) -> RawFundamental {
    let revenue = 500.0e6 * 1.02f64.powi(-(i as i32));
    RawFundamental {
        symbol: symbol.to_string(),
        fiscal_period: format!("Q{}", (i % 4) + 1),
        fiscal_year: Some(2025 - (i / 4) as i32),
        start_date: None,
        end_date: NaiveDate::from_ymd_opt(2025, 12, 31).map(|d| d - chrono::Months::new(i * 3)),
        currency_scale: None,
        revenue: Some(revenue),
        gross_profit: Some(revenue * 0.55),
        operating_income: Some(revenue * 0.22),
        net_income: Some(revenue * 0.16),
        operating_cash_flow: Some(revenue * 0.20),
        investing_cash_flow: Some(-revenue * 0.05),
        assets: Some(revenue * 8.0),
        liabilities: Some(revenue * 3.0),
        equity: Some(revenue * 5.0),
        long_term_debt: Some(revenue * 1.2),
        diluted_eps: Some(0.45),
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn fundamentals(&self, symbol: &str) -> Result<Vec<RawFundamental>, AnalysisError> {
        self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
        self.check(symbol)?;
        Ok((0..8).map(|i| raw_quarter(symbol, i)).collect())
    }

    async fn daily_bars(&self, symbol: &str, days_back: i64) -> Result<Vec<PriceBar>, AnalysisError> {
        self.bars_calls.fetch_add(1, Ordering::SeqCst);
        self.check(symbol)?;
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        Ok((0..days_back.min(250) as u64)
            .map(|i| {
                let close = 80.0 + (i as f64 * 0.3).sin() * 6.0 + i as f64 * 0.02;
                PriceBar {
                    symbol: symbol.to_string(),
                    date: start + Days::new(i),
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 2_000_000.0,
                }
            })
            .collect())
    }

    async fn dividends(&self, symbol: &str, limit: usize) -> Result<Vec<DividendEvent>, AnalysisError> {
        self.dividends_calls.fetch_add(1, Ordering::SeqCst);
        self.check(symbol)?;
        Ok((0..limit.min(12))
            .map(|i| DividendEvent {
                symbol: symbol.to_string(),
                pay_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap()
                    - chrono::Months::new(i as u32 * 3),
                ex_date: None,
                cash_amount: 0.40 * 1.01f64.powi(-(i as i32 / 4)),
                payments_per_year: 4,
            })
            .collect())
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.check(symbol)?;
        Ok(CompanyProfile {
            symbol: symbol.to_string(),
            name: Some(format!("{symbol} Inc.")),
            sic_code: Some("7372".to_string()),
            sic_description: Some("Prepackaged Software".to_string()),
            market_cap: Some(12.0e9),
            shares_outstanding: Some(150.0e6),
            employee_count: Some(9_000.0),
            beta: Some(1.1),
        })
    }
}

fn holdings(symbols: &[&str]) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = symbols
        .iter()
        .map(|s| Holding::new(*s, 100.0, 80.0, Some("Software".to_string())))
        .collect();
    recompute_weights(&mut holdings);
    holdings
}

#[tokio::test(start_paused = true)]
async fn fetches_are_memoized_within_a_session() -> anyhow::Result<()> {
    init_tracing();
    let provider = Arc::new(FakeProvider::default());
    let session = ResearchSession::new(provider.clone());

    session.run_earnings_quality("ACME").await?;
    session.run_earnings_quality("ACME").await?;
    session.run_dcf("ACME", &ValuationOverrides::default()).await?;

    // Three engine runs, one underlying fundamentals fetch.
    assert_eq!(provider.fundamentals_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.profile_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn full_report_runs_all_engines_once_per_data_kind() {
    init_tracing();
    let provider = Arc::new(FakeProvider::default());
    let session = ResearchSession::new(provider.clone());

    let report = session.full_report("ACME", &ValuationOverrides::default()).await;

    assert!(report.dcf.is_some());
    assert!(report.dividend_growth.is_some());
    assert!(report.technical.is_some());
    assert!(report.earnings_quality.is_some());
    assert!(report.capital_allocation.is_some());
    assert!(report.esg.is_some());
    assert!(!report.applicable_results().is_empty());

    assert_eq!(provider.fundamentals_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.bars_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.dividends_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.profile_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn peer_comparison_survives_broken_peers() {
    // Two roster members fail; enough peers remain for the comparison.
    let provider = Arc::new(FakeProvider::failing(&["ORCL", "CRM"]));
    let session = ResearchSession::new(provider.clone());

    let report = session.run_competitive_moat("ACME").await.unwrap();
    assert!(report.result.get_metric("moat_score").is_some());
    assert!(report
        .result
        .warnings
        .iter()
        .any(|w| w.contains("ORCL") && w.contains("CRM")));
}

#[tokio::test(start_paused = true)]
async fn factor_exposure_degrades_failed_holdings_to_neutral() {
    let provider = Arc::new(FakeProvider::failing(&["BAD1"]));
    let session = ResearchSession::new(provider.clone());

    let holdings = holdings(&["A1", "A2", "A3", "A4", "A5", "BAD1"]);
    let result = session.run_factor_exposure(&holdings).await.unwrap();

    assert!(result.warnings.iter().any(|w| w.contains("BAD1")));
    // Identical healthy holdings plus one neutral row keep tilts near zero.
    assert!(result.get_metric("tilt_value").unwrap().abs() < 0.5);
}

#[tokio::test(start_paused = true)]
async fn five_holdings_one_dataless_still_yields_five_tilts() {
    let provider = Arc::new(FakeProvider::failing(&["NODATA"]));
    let session = ResearchSession::new(provider.clone());

    let holdings = holdings(&["A1", "A2", "A3", "A4", "NODATA"]);
    let result = session.run_factor_exposure(&holdings).await.unwrap();

    assert_eq!(result.series["tilts"].len(), 5);
    for name in ["value", "momentum", "quality", "size", "low_volatility"] {
        assert!(result.get_metric(&format!("tilt_{name}")).is_some());
    }
    // The dataless holding scores neutral on every factor.
    assert_eq!(result.series["z_value"][4], 0.0);
    let score = result.get_metric("diversification_score").unwrap();
    assert!((1.0..=10.0).contains(&score), "score {score} out of range");
    assert!(result.warnings.iter().any(|w| w.contains("NODATA")));
}

#[tokio::test(start_paused = true)]
async fn factor_exposure_fails_when_most_holdings_are_broken() {
    let provider = Arc::new(FakeProvider::failing(&["B1", "B2", "B3", "B4"]));
    let session = ResearchSession::new(provider.clone());

    let holdings = holdings(&["A1", "A2", "B1", "B2", "B3", "B4"]);
    let err = session.run_factor_exposure(&holdings).await.unwrap_err();
    match err {
        AnalysisError::BatchFailed { missing, .. } => assert_eq!(missing.len(), 4),
        other => panic!("expected BatchFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn esg_portfolio_rollup_is_value_weighted_and_paced() {
    let provider = Arc::new(FakeProvider::default());
    let session = ResearchSession::with_policy(
        provider.clone(),
        BatchPolicy {
            batch_size: 2,
            pause: std::time::Duration::from_secs(1),
        },
    );

    let holdings = holdings(&["A1", "A2", "A3", "A4", "A5", "A6"]);
    let result = session.run_esg_portfolio(&holdings).await.unwrap();

    assert_eq!(result.symbol, "PORTFOLIO");
    assert!(result.get_metric("esg_total").unwrap() > 0.0);
    assert_eq!(result.get_metric("holdings_count").unwrap(), 6.0);
    // Equal-weight identical holdings: every company scored identically.
    assert!(result.get_metric("sector_avg_Software").is_some());
}

#[tokio::test(start_paused = true)]
async fn portfolio_attribution_builds_rows_from_constituent_returns() {
    let provider = Arc::new(FakeProvider::failing(&["BADP"]));
    let session = ResearchSession::new(provider.clone());

    let mut holdings = holdings(&["A1", "A2", "A3", "A4"]);
    holdings.push(Holding::new("BADP", 100.0, 80.0, Some("Software".to_string())));
    recompute_weights(&mut holdings);

    let benchmark = vec![BenchmarkSector {
        sector: "Software".to_string(),
        weight: 1.0,
        period_return: 0.02,
    }];
    let result = session
        .run_portfolio_attribution(&holdings, &benchmark, 60)
        .await
        .unwrap();

    // Identical constituents: the portfolio return is the shared 60-day return.
    let portfolio_return = result.get_metric("portfolio_return").unwrap();
    assert!(portfolio_return > 0.0);
    let active = result.get_metric("active_return").unwrap();
    assert!((active - (portfolio_return - 0.02)).abs() < 1e-9);
    assert!(result.get_metric("selection_Software").is_some());
    assert!(result.warnings.iter().any(|w| w.contains("BADP")));
}

#[tokio::test(start_paused = true)]
async fn technical_and_dividend_runs_use_fresh_symbols_independently() {
    let provider = Arc::new(FakeProvider::default());
    let session = ResearchSession::new(provider.clone());

    let technical = session.run_technical("ACME").await.unwrap();
    assert!(technical.applicable);
    assert!(technical.get_metric("technical_score").unwrap() <= 100.0);

    let dividend = session.run_dividend_growth("OTHER").await.unwrap();
    assert!(dividend.applicable);
    assert!(dividend.get_metric("gordon_fair_value").is_some());

    assert_eq!(provider.bars_calls.load(Ordering::SeqCst), 2);
}
