use std::sync::Arc;
use std::time::Duration;

use capital_allocation::{CapitalAllocationEngine, SectorAttributionEngine, SectorRow};
use competitive_moat::{peer_roster, CompanyData, CompetitiveMoatEngine, CompetitiveReport};
use dashmap::DashMap;
use dcf_valuation::{DcfValuationEngine, ValuationOverrides};
use dividend_growth::DividendGrowthEngine;
use earnings_quality::EarningsQualityEngine;
use esg_proxy::EsgProxyEngine;
use factor_exposure::{FactorExposureEngine, HoldingFactorInput};
use futures::future::join_all;
use indicators::rolling_std;
use research_core::normalize::{clean_bars, clean_dividends, quarterly_periods};
use research_core::{
    profile_for, resolve_sector, sum_recent, AnalysisError, AnalysisResult,
    CompanyProfile, DividendEvent, FundamentalPeriod, Holding, MarketDataProvider, PriceBar,
};
use technical_scoring::TechnicalScoringEngine;
use tokio::sync::OnceCell;

use crate::CompanyReport;

/// Session memo: one cell per request key, deduplicating concurrent fetches
/// for the same key. A failed fetch leaves the cell empty, so a later call
/// retries.
type Memo<T> = DashMap<String, Arc<OnceCell<Arc<T>>>>;

async fn memoized<T, F, Fut>(memo: &Memo<T>, key: &str, fetch: F) -> Result<Arc<T>, AnalysisError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, AnalysisError>>,
{
    let cell = memo
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(OnceCell::new()))
        .clone();
    let value = cell
        .get_or_try_init(|| async { fetch().await.map(Arc::new) })
        .await?;
    Ok(value.clone())
}

const PRICE_HISTORY_DAYS: i64 = 365;
const DIVIDEND_LIMIT: usize = 40;
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One benchmark sector bucket for attribution: its index weight and its
/// return over the same window as the portfolio side.
#[derive(Debug, Clone)]
pub struct BenchmarkSector {
    pub sector: String,
    pub weight: f64,
    pub period_return: f64,
}

/// Pacing for multi-symbol fetches: at most `batch_size` symbols in flight,
/// with a pause between batches.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub pause: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pause: Duration::from_secs(1),
        }
    }
}

/// One research session over one data provider. Every fetch is memoized for
/// the lifetime of the session, so a full report or a peer comparison touches
/// the provider once per (symbol, request) pair.
pub struct ResearchSession {
    provider: Arc<dyn MarketDataProvider>,
    policy: BatchPolicy,
    dcf: DcfValuationEngine,
    dividend_growth: DividendGrowthEngine,
    technical: TechnicalScoringEngine,
    factor_exposure: FactorExposureEngine,
    earnings_quality: EarningsQualityEngine,
    competitive_moat: CompetitiveMoatEngine,
    esg: EsgProxyEngine,
    capital_allocation: CapitalAllocationEngine,
    sector_attribution: SectorAttributionEngine,
    fundamentals_cache: Memo<Vec<FundamentalPeriod>>,
    bars_cache: Memo<Vec<PriceBar>>,
    dividends_cache: Memo<Vec<DividendEvent>>,
    profile_cache: Memo<CompanyProfile>,
}

impl ResearchSession {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::with_policy(provider, BatchPolicy::default())
    }

    pub fn with_policy(provider: Arc<dyn MarketDataProvider>, policy: BatchPolicy) -> Self {
        Self {
            provider,
            policy,
            dcf: DcfValuationEngine::new(),
            dividend_growth: DividendGrowthEngine::new(),
            technical: TechnicalScoringEngine::new(),
            factor_exposure: FactorExposureEngine::new(),
            earnings_quality: EarningsQualityEngine::new(),
            competitive_moat: CompetitiveMoatEngine::new(),
            esg: EsgProxyEngine::new(),
            capital_allocation: CapitalAllocationEngine::new(),
            sector_attribution: SectorAttributionEngine::new(),
            fundamentals_cache: DashMap::new(),
            bars_cache: DashMap::new(),
            dividends_cache: DashMap::new(),
            profile_cache: DashMap::new(),
        }
    }

    /// Normalized quarterly fundamentals, newest first. Memoized.
    pub async fn quarterly_fundamentals(
        &self,
        symbol: &str,
    ) -> Result<Arc<Vec<FundamentalPeriod>>, AnalysisError> {
        memoized(&self.fundamentals_cache, symbol, || async {
            let raw = self.provider.fundamentals(symbol).await?;
            let quarters = quarterly_periods(raw);
            tracing::debug!(symbol, quarters = quarters.len(), "fetched fundamentals");
            Ok(quarters)
        })
        .await
    }

    /// Cleaned daily bars, oldest first. Memoized per (symbol, window).
    pub async fn daily_bars(
        &self,
        symbol: &str,
        days_back: i64,
    ) -> Result<Arc<Vec<PriceBar>>, AnalysisError> {
        let key = format!("{symbol}:{days_back}");
        memoized(&self.bars_cache, &key, || async {
            let raw = self.provider.daily_bars(symbol, days_back).await?;
            let bars = clean_bars(raw);
            tracing::debug!(symbol, bars = bars.len(), "fetched daily bars");
            Ok(bars)
        })
        .await
    }

    /// Cleaned dividend history, newest first. Memoized.
    pub async fn dividends(&self, symbol: &str) -> Result<Arc<Vec<DividendEvent>>, AnalysisError> {
        memoized(&self.dividends_cache, symbol, || async {
            let raw = self.provider.dividends(symbol, DIVIDEND_LIMIT).await?;
            Ok(clean_dividends(raw))
        })
        .await
    }

    /// Company profile. Memoized.
    pub async fn profile(&self, symbol: &str) -> Result<Arc<CompanyProfile>, AnalysisError> {
        memoized(&self.profile_cache, symbol, || async {
            self.provider.profile(symbol).await
        })
        .await
    }

    /// Last close from the trailing year of bars.
    pub async fn current_price(&self, symbol: &str) -> Result<Option<f64>, AnalysisError> {
        let bars = self.daily_bars(symbol, PRICE_HISTORY_DAYS).await?;
        Ok(bars.last().map(|b| b.close))
    }

    pub async fn run_dcf(
        &self,
        symbol: &str,
        overrides: &ValuationOverrides,
    ) -> Result<AnalysisResult, AnalysisError> {
        let (quarters, profile, price) = tokio::join!(
            self.quarterly_fundamentals(symbol),
            self.profile(symbol),
            self.current_price(symbol),
        );
        let quarters = quarters?;
        let profile = profile?;
        let price = price.unwrap_or_else(|e| {
            tracing::warn!(symbol, error = %e, "no price history for DCF");
            None
        });
        let sector = resolve_sector(None, &profile);
        let sector_profile = profile_for(sector);
        tracing::info!(symbol, sector = sector.label(), "running DCF valuation");
        self.dcf
            .evaluate(symbol, &quarters, &profile, &sector_profile, overrides, price)
    }

    pub async fn run_dividend_growth(&self, symbol: &str) -> Result<AnalysisResult, AnalysisError> {
        let (dividends, quarters, profile, price) = tokio::join!(
            self.dividends(symbol),
            self.quarterly_fundamentals(symbol),
            self.profile(symbol),
            self.current_price(symbol),
        );
        let dividends = dividends?;
        let quarters = quarters?;
        let profile = profile?;
        let price = price.ok().flatten();
        self.dividend_growth
            .evaluate(symbol, &dividends, &quarters, &profile, price)
    }

    pub async fn run_technical(&self, symbol: &str) -> Result<AnalysisResult, AnalysisError> {
        let bars = self.daily_bars(symbol, PRICE_HISTORY_DAYS).await?;
        self.technical.evaluate(symbol, &bars)
    }

    pub async fn run_earnings_quality(&self, symbol: &str) -> Result<AnalysisResult, AnalysisError> {
        let quarters = self.quarterly_fundamentals(symbol).await?;
        self.earnings_quality.evaluate(symbol, &quarters)
    }

    pub async fn run_capital_allocation(
        &self,
        symbol: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let (quarters, profile, dividends) = tokio::join!(
            self.quarterly_fundamentals(symbol),
            self.profile(symbol),
            self.dividends(symbol),
        );
        let quarters = quarters?;
        let profile = profile?;
        let dividends = dividends.unwrap_or_else(|e| {
            tracing::warn!(symbol, error = %e, "no dividend history for capital allocation");
            Arc::new(Vec::new())
        });
        self.capital_allocation
            .evaluate(symbol, &quarters, &profile, &dividends)
    }

    pub async fn run_esg(&self, symbol: &str) -> Result<AnalysisResult, AnalysisError> {
        let (quarters, profile) =
            tokio::join!(self.quarterly_fundamentals(symbol), self.profile(symbol));
        let quarters = quarters?;
        let profile = profile?;
        let sector = resolve_sector(None, &profile);
        self.esg.evaluate(symbol, &quarters, &profile, sector)
    }

    /// Value-weighted ESG rollup across a holding set. Holdings that fail to
    /// fetch are skipped with a warning on the portfolio result.
    pub async fn run_esg_portfolio(
        &self,
        holdings: &[Holding],
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut scored = Vec::with_capacity(holdings.len());
        let mut skipped = Vec::new();
        for chunk in holdings.chunks(self.policy.batch_size.max(1)) {
            let fetched = join_all(chunk.iter().map(|h| async move {
                let (quarters, profile) = tokio::join!(
                    self.quarterly_fundamentals(&h.symbol),
                    self.profile(&h.symbol),
                );
                (h, quarters, profile)
            }))
            .await;
            for (holding, quarters, profile) in fetched {
                match (quarters, profile) {
                    (Ok(quarters), Ok(profile)) => {
                        let sector = resolve_sector(holding.sector.as_deref(), &profile);
                        match self.esg.evaluate(&holding.symbol, &quarters, &profile, sector) {
                            Ok(result) => scored.push((result, holding.weight, sector)),
                            Err(e) => {
                                tracing::warn!(symbol = %holding.symbol, error = %e, "ESG scoring failed");
                                skipped.push(holding.symbol.clone());
                            }
                        }
                    }
                    _ => {
                        tracing::warn!(symbol = %holding.symbol, "fetch failed for ESG rollup");
                        skipped.push(holding.symbol.clone());
                    }
                }
            }
            if holdings.len() > self.policy.batch_size {
                tokio::time::sleep(self.policy.pause).await;
            }
        }

        if scored.len() * 2 < holdings.len() {
            return Err(AnalysisError::BatchFailed {
                context: "ESG rollup: fewer than half the holdings could be scored".to_string(),
                missing: skipped,
            });
        }
        let mut result = self.esg.evaluate_portfolio(&scored)?;
        if !skipped.is_empty() {
            result.warn(format!("Holdings skipped: {}", skipped.join(", ")));
        }
        Ok(result)
    }

    /// Portfolio factor exposure. Each holding's inputs come from its
    /// fundamentals, price history, and profile; any fetch failure degrades
    /// that holding to neutral scores with a warning.
    pub async fn run_factor_exposure(
        &self,
        holdings: &[Holding],
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut inputs = Vec::with_capacity(holdings.len());
        let mut degraded = Vec::new();
        for chunk in holdings.chunks(self.policy.batch_size.max(1)) {
            let fetched =
                join_all(chunk.iter().map(|h| async move { (h, self.factor_input(h).await) })).await;
            for (holding, input) in fetched {
                match input {
                    Ok(input) => inputs.push(input),
                    Err(e) => {
                        tracing::warn!(symbol = %holding.symbol, error = %e, "factor inputs unavailable");
                        degraded.push(holding.symbol.clone());
                        inputs.push(HoldingFactorInput {
                            symbol: holding.symbol.clone(),
                            weight: holding.weight,
                            ..Default::default()
                        });
                    }
                }
            }
            if holdings.len() > self.policy.batch_size {
                tokio::time::sleep(self.policy.pause).await;
            }
        }

        if degraded.len() * 2 > holdings.len() {
            return Err(AnalysisError::BatchFailed {
                context: "Factor exposure: more than half the holdings lack inputs".to_string(),
                missing: degraded,
            });
        }
        let mut result = self.factor_exposure.evaluate(&inputs)?;
        if !degraded.is_empty() {
            result.warn(format!(
                "Holdings scored neutral for missing data: {}",
                degraded.join(", ")
            ));
        }
        Ok(result)
    }

    async fn factor_input(&self, holding: &Holding) -> Result<HoldingFactorInput, AnalysisError> {
        let (quarters, bars, profile) = tokio::join!(
            self.quarterly_fundamentals(&holding.symbol),
            self.daily_bars(&holding.symbol, PRICE_HISTORY_DAYS),
            self.profile(&holding.symbol),
        );
        let quarters = quarters?;
        let bars = bars?;
        let profile = profile?;

        let ttm_eps = sum_recent(&quarters, 4, |q| q.diluted_eps);
        let ttm_ni = sum_recent(&quarters, 4, |q| q.net_income);
        let ttm_revenue = sum_recent(&quarters, 4, |q| q.revenue);
        let ttm_operating = sum_recent(&quarters, 4, |q| q.operating_income);
        let latest_equity = quarters.first().and_then(|q| q.equity).filter(|&e| e > 0.0);

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let momentum_3m = if closes.len() > 63 {
            let then = closes[closes.len() - 64];
            let now = *closes.last().unwrap();
            (then > 0.0).then(|| (now - then) / then)
        } else {
            None
        };
        let returns: Vec<f64> = closes
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        let volatility = rolling_std(&returns, returns.len().max(1))
            .first()
            .map(|sd| sd * TRADING_DAYS_PER_YEAR.sqrt());

        Ok(HoldingFactorInput {
            symbol: holding.symbol.clone(),
            weight: holding.weight,
            pe_ratio: ttm_eps
                .filter(|&e| e > 0.0)
                .map(|e| holding.last_price / e),
            pb_ratio: match (profile.market_cap, latest_equity) {
                (Some(mcap), Some(eq)) => Some(mcap / eq),
                _ => None,
            },
            momentum_3m,
            roe: match (ttm_ni, latest_equity) {
                (Some(ni), Some(eq)) => Some(ni / eq),
                _ => None,
            },
            operating_margin: match (ttm_operating, ttm_revenue) {
                (Some(oi), Some(rev)) if rev > 0.0 => Some(oi / rev),
                _ => None,
            },
            market_cap: profile.market_cap,
            volatility,
        })
    }

    /// Peer comparison against the fixed sector roster. The subject's sector
    /// decides the roster; peers that fail to fetch enter the comparison with
    /// no fundamentals and are reported as missing by the engine.
    pub async fn run_competitive_moat(
        &self,
        symbol: &str,
    ) -> Result<CompetitiveReport, AnalysisError> {
        let profile = self.profile(symbol).await?;
        let sector = resolve_sector(None, &profile);
        let roster: Vec<&str> = peer_roster(sector)
            .iter()
            .copied()
            .filter(|peer| *peer != symbol)
            .collect();
        tracing::info!(symbol, sector = sector.label(), peers = roster.len(), "running peer comparison");

        let subject = self.fetch_company(symbol).await;
        let mut peers = Vec::with_capacity(roster.len());
        for chunk in roster.chunks(self.policy.batch_size.max(1)) {
            let fetched = join_all(chunk.iter().map(|peer| self.fetch_company(peer))).await;
            peers.extend(fetched);
            if roster.len() > self.policy.batch_size {
                tokio::time::sleep(self.policy.pause).await;
            }
        }

        self.competitive_moat.evaluate(&subject, &peers, sector)
    }

    async fn fetch_company(&self, symbol: &str) -> CompanyData {
        let (quarters, profile, price) = tokio::join!(
            self.quarterly_fundamentals(symbol),
            self.profile(symbol),
            self.current_price(symbol),
        );
        let quarters = match quarters {
            Ok(q) => q.as_ref().clone(),
            Err(e) => {
                tracing::warn!(symbol, error = %e, "fundamentals unavailable");
                Vec::new()
            }
        };
        let profile = match profile {
            Ok(p) => p.as_ref().clone(),
            Err(_) => CompanyProfile {
                symbol: symbol.to_string(),
                ..Default::default()
            },
        };
        CompanyData {
            symbol: symbol.to_string(),
            quarters,
            profile,
            price: price.ok().flatten(),
        }
    }

    /// Brinson sector attribution over prepared sector rows.
    pub fn run_sector_attribution(&self, rows: &[SectorRow]) -> Result<AnalysisResult, AnalysisError> {
        self.sector_attribution.evaluate(rows)
    }

    /// Sector attribution from raw holdings: fetches each constituent's price
    /// history over the window, computes start-to-end returns, rolls them up
    /// into value-weighted sector returns, and attributes against the given
    /// benchmark sector weights and returns.
    pub async fn run_portfolio_attribution(
        &self,
        holdings: &[Holding],
        benchmark: &[BenchmarkSector],
        days_back: i64,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut returns: Vec<(&Holding, f64)> = Vec::with_capacity(holdings.len());
        let mut skipped = Vec::new();
        for chunk in holdings.chunks(self.policy.batch_size.max(1)) {
            let fetched = join_all(
                chunk
                    .iter()
                    .map(|h| async move { (h, self.daily_bars(&h.symbol, days_back).await) }),
            )
            .await;
            for (holding, bars) in fetched {
                let period_return = bars.ok().and_then(|bars| {
                    let first = bars.first()?.close;
                    let last = bars.last()?.close;
                    (bars.len() >= 2 && first > 0.0).then(|| (last - first) / first)
                });
                match period_return {
                    Some(r) => returns.push((holding, r)),
                    None => {
                        tracing::warn!(symbol = %holding.symbol, "no usable price window");
                        skipped.push(holding.symbol.clone());
                    }
                }
            }
            if holdings.len() > self.policy.batch_size {
                tokio::time::sleep(self.policy.pause).await;
            }
        }

        if returns.len() * 2 < holdings.len() {
            return Err(AnalysisError::BatchFailed {
                context: "Sector attribution: fewer than half the holdings have price history"
                    .to_string(),
                missing: skipped,
            });
        }

        // Value-weighted sector returns over the surviving holdings.
        let mut by_sector: std::collections::BTreeMap<String, (f64, f64)> =
            std::collections::BTreeMap::new();
        for (holding, r) in &returns {
            let sector = holding.sector.clone().unwrap_or_else(|| "Other".to_string());
            let entry = by_sector.entry(sector).or_insert((0.0, 0.0));
            entry.0 += holding.weight;
            entry.1 += holding.weight * r;
        }

        let mut rows: Vec<SectorRow> = Vec::with_capacity(by_sector.len());
        for (sector, (weight, weighted_return)) in &by_sector {
            let bench = benchmark.iter().find(|b| b.sector == *sector);
            rows.push(SectorRow {
                sector: sector.clone(),
                portfolio_weight: *weight,
                portfolio_return: if *weight > 0.0 { weighted_return / weight } else { 0.0 },
                benchmark_weight: bench.map_or(0.0, |b| b.weight),
                benchmark_return: bench.map_or(0.0, |b| b.period_return),
            });
        }
        for bench in benchmark {
            if !by_sector.contains_key(&bench.sector) {
                rows.push(SectorRow {
                    sector: bench.sector.clone(),
                    portfolio_weight: 0.0,
                    portfolio_return: 0.0,
                    benchmark_weight: bench.weight,
                    benchmark_return: bench.period_return,
                });
            }
        }

        let mut result = self.sector_attribution.evaluate(&rows)?;
        if !skipped.is_empty() {
            result.warn(format!("Holdings excluded for missing prices: {}", skipped.join(", ")));
        }
        Ok(result)
    }

    /// Run every single-company engine concurrently and collect whatever
    /// succeeded. Individual engine failures are logged, not fatal.
    pub async fn full_report(
        &self,
        symbol: &str,
        overrides: &ValuationOverrides,
    ) -> CompanyReport {
        let (dcf, dividend_growth, technical, earnings_quality, capital_allocation, esg) = tokio::join!(
            self.run_dcf(symbol, overrides),
            self.run_dividend_growth(symbol),
            self.run_technical(symbol),
            self.run_earnings_quality(symbol),
            self.run_capital_allocation(symbol),
            self.run_esg(symbol),
        );

        let keep = |name: &str, outcome: Result<AnalysisResult, AnalysisError>| match outcome {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(symbol, engine = name, error = %e, "engine failed");
                None
            }
        };

        CompanyReport {
            symbol: symbol.to_string(),
            generated_at: chrono::Utc::now(),
            dcf: keep("dcf", dcf),
            dividend_growth: keep("dividend_growth", dividend_growth),
            technical: keep("technical", technical),
            earnings_quality: keep("earnings_quality", earnings_quality),
            capital_allocation: keep("capital_allocation", capital_allocation),
            esg: keep("esg", esg),
        }
    }
}
