//! Composite technical score built from four 25-point components: RSI, MACD,
//! trend (price versus long moving averages), and Bollinger %B.

use indicators::{bollinger, linreg_slope, macd, obv, percent_b, rsi, sma, support_resistance};
use research_core::{AnalysisError, AnalysisResult, ModelId, PriceBar};

const MIN_BARS: usize = 30;
const RSI_PERIOD: usize = 14;

pub struct TechnicalScoringEngine;

impl TechnicalScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score a cleaned daily bar series (ascending by date).
    pub fn evaluate(&self, symbol: &str, bars: &[PriceBar]) -> Result<AnalysisResult, AnalysisError> {
        if bars.len() < MIN_BARS {
            return Ok(AnalysisResult::not_applicable(
                ModelId::Technical,
                symbol,
                format!("Need at least {MIN_BARS} daily bars, have {}", bars.len()),
            ));
        }

        let mut result = AnalysisResult::new(ModelId::Technical, symbol);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last_close = *closes.last().unwrap();

        // RSI: oversold scores high, overbought scores low.
        let rsi_values = rsi(&closes, RSI_PERIOD);
        let current_rsi = rsi_values.last().copied().unwrap_or(50.0);
        let rsi_points = if current_rsi < 30.0 {
            25.0
        } else if current_rsi < 40.0 {
            20.0
        } else if current_rsi <= 60.0 {
            15.0
        } else if current_rsi <= 70.0 {
            10.0
        } else {
            5.0
        };
        result.metric("rsi", current_rsi);
        result.metric("rsi_points", rsi_points);

        // MACD: positive and rising histogram is the strongest configuration.
        let macd_result = macd(&closes, 12, 26, 9);
        let hist = &macd_result.histogram;
        let macd_points = match (hist.last(), hist.len().checked_sub(2).and_then(|i| hist.get(i))) {
            (Some(&cur), Some(&prev)) => {
                if cur > 0.0 && cur > prev {
                    25.0
                } else if cur > 0.0 {
                    18.0
                } else if cur > prev {
                    10.0
                } else {
                    4.0
                }
            }
            (Some(&cur), None) if cur > 0.0 => 18.0,
            _ => 4.0,
        };
        if let Some(&h) = hist.last() {
            result.metric("macd_histogram", h);
        }
        if let Some(&m) = macd_result.macd_line.last() {
            result.metric("macd_line", m);
        }
        result.metric("macd_points", macd_points);

        // Trend: golden-cross style check on 50/200 SMAs, degrading to a
        // 50-SMA-only check with a reduced ceiling on short histories.
        let sma50 = sma(&closes, 50);
        let sma200 = sma(&closes, 200);
        let trend_points = match (sma50.last(), sma200.last()) {
            (Some(&s50), Some(&s200)) => {
                result.metric("sma_50", s50);
                result.metric("sma_200", s200);
                if last_close > s200 && s50 > s200 {
                    25.0
                } else if last_close > s200 {
                    18.0
                } else if last_close > s50 {
                    12.0
                } else if s50 > s200 {
                    8.0
                } else {
                    4.0
                }
            }
            (Some(&s50), None) => {
                result.metric("sma_50", s50);
                result.warn("Fewer than 200 bars; trend component based on the 50-day average only");
                if last_close > s50 {
                    15.0
                } else {
                    6.0
                }
            }
            _ => {
                result.warn("Too few bars for moving-average trend; neutral trend score");
                10.0
            }
        };
        result.metric("trend_points", trend_points);

        // Bollinger %B: near the lower band scores high.
        let bands = bollinger(&closes, 20, 2.0);
        if let Some(&mid) = bands.middle.last() {
            result.metric("sma_20", mid);
        }
        let bb_points = match (bands.upper.last(), bands.lower.last()) {
            (Some(&upper), Some(&lower)) => {
                let pb = percent_b(last_close, upper, lower);
                result.metric("percent_b", pb);
                result.metric("bollinger_upper", upper);
                result.metric("bollinger_lower", lower);
                if pb < 0.2 {
                    25.0
                } else if pb < 0.4 {
                    18.0
                } else if pb < 0.6 {
                    12.0
                } else if pb < 0.8 {
                    8.0
                } else {
                    4.0
                }
            }
            _ => {
                result.warn("Too few bars for Bollinger Bands; neutral band score");
                12.0
            }
        };
        result.metric("bollinger_points", bb_points);

        let total = rsi_points + macd_points + trend_points + bb_points;
        result.metric("technical_score", total);

        // OBV confirmation: informational only, not part of the score.
        let obv_series = obv(bars);
        if obv_series.len() >= 25 {
            let recent_avg: f64 = obv_series[obv_series.len() - 20..].iter().sum::<f64>() / 20.0;
            let prior_avg: f64 =
                obv_series[obv_series.len() - 25..obv_series.len() - 5].iter().sum::<f64>() / 20.0;
            result.metric("obv_rising", if recent_avg > prior_avg { 1.0 } else { 0.0 });
        }
        result.metric("price_slope_20d", linreg_slope(&closes[closes.len().saturating_sub(20)..]));

        let levels = support_resistance(bars, 5, 60);
        result.add_series("support_levels", levels.supports);
        result.add_series("resistance_levels", levels.resistances);
        if let Some(tail) = rsi_values.len().checked_sub(30) {
            result.add_series("rsi_recent", rsi_values[tail..].to_vec());
        } else {
            result.add_series("rsi_recent", rsi_values);
        }

        result.verdict = if total > 70.0 {
            "Strong Buy"
        } else if total > 55.0 {
            "Buy"
        } else if total > 45.0 {
            "Hold"
        } else if total > 30.0 {
            "Sell"
        } else {
            "Strong Sell"
        }
        .to_string();
        result.metric("last_close", last_close);

        Ok(result)
    }
}

impl Default for TechnicalScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: usize, close: f64) -> PriceBar {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(day as u64);
        PriceBar {
            symbol: "TEST".to_string(),
            date,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000_000.0,
        }
    }

    fn series(closes: &[f64]) -> Vec<PriceBar> {
        closes.iter().enumerate().map(|(i, &c)| bar(i, c)).collect()
    }

    #[test]
    fn too_few_bars_is_not_applicable() {
        let bars = series(&vec![100.0; 29]);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        assert!(!result.applicable);
        assert_eq!(result.verdict, "Not Applicable");
    }

    #[test]
    fn score_is_bounded() {
        let closes: Vec<f64> = (0..250).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        let score = result.get_metric("technical_score").unwrap();
        assert!(score >= 16.0 && score <= 100.0);
        assert!(result.applicable);
    }

    #[test]
    fn sustained_uptrend_scores_trend_component_high() {
        // 250 bars climbing steadily: price above both SMAs, 50 above 200.
        let closes: Vec<f64> = (0..250).map(|i| 50.0 + i as f64 * 0.5).collect();
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        assert_eq!(result.get_metric("trend_points").unwrap(), 25.0);
        // A relentless uptrend pins RSI high, which caps the RSI component.
        assert_eq!(result.get_metric("rsi_points").unwrap(), 5.0);
    }

    #[test]
    fn short_history_trend_is_capped_with_warning() {
        // 60 bars: enough for the 50 SMA but not the 200.
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + i as f64 * 0.5).collect();
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        assert_eq!(result.get_metric("trend_points").unwrap(), 15.0);
        assert!(result.warnings.iter().any(|w| w.contains("Fewer than 200 bars")));
    }

    #[test]
    fn drawdown_scores_oversold_components_high() {
        // Prolonged decline: RSI oversold and price near the lower band.
        let closes: Vec<f64> = (0..250).map(|i| 200.0 - i as f64 * 0.5).collect();
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        assert_eq!(result.get_metric("rsi_points").unwrap(), 25.0);
        assert_eq!(result.get_metric("bollinger_points").unwrap(), 25.0);
    }

    #[test]
    fn support_scan_ignores_levels_older_than_sixty_bars() {
        // A deep trough 90 bars before the end sits outside the 60-bar scan
        // window and must not surface as a support level.
        let mut closes = vec![100.0; 150];
        closes[60] = 50.0;
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        let supports = &result.series["support_levels"];
        assert!(!supports.is_empty());
        assert!(supports.iter().all(|&s| s > 60.0), "stale trough surfaced: {supports:?}");
    }

    #[test]
    fn verdict_buckets_match_score() {
        let closes: Vec<f64> = (0..250).map(|i| 200.0 - i as f64 * 0.5).collect();
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        let score = result.get_metric("technical_score").unwrap();
        let expected = if score > 70.0 {
            "Strong Buy"
        } else if score > 55.0 {
            "Buy"
        } else if score > 45.0 {
            "Hold"
        } else if score > 30.0 {
            "Sell"
        } else {
            "Strong Sell"
        };
        assert_eq!(result.verdict, expected);
    }

    #[test]
    fn support_levels_are_sorted_ascending() {
        let closes: Vec<f64> = (0..250).map(|i| 100.0 + (i as f64 * 0.25).sin() * 10.0).collect();
        let bars = series(&closes);
        let result = TechnicalScoringEngine::new().evaluate("TEST", &bars).unwrap();
        let supports = &result.series["support_levels"];
        assert!(supports.len() <= 3);
        assert!(supports.windows(2).all(|w| w[0] <= w[1]));
    }
}
