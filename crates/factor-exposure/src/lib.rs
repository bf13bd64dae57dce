//! Portfolio factor tilts: cross-sectional z-scores over the holdings for the
//! classic style factors, weighted into portfolio-level exposures, plus a
//! concentration-based diversification grade.

use indicators::cross_sectional_z;
use research_core::{AnalysisError, AnalysisResult, ModelId, PORTFOLIO_SYMBOL};
use serde::{Deserialize, Serialize};

const MIN_HOLDINGS: usize = 5;

pub const FACTOR_NAMES: [&str; 5] = ["value", "momentum", "quality", "size", "low_volatility"];

/// Per-holding inputs for the factor model. Any field may be missing; missing
/// values score neutral within their factor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldingFactorInput {
    pub symbol: String,
    /// Portfolio weight, fraction of total value.
    pub weight: f64,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub momentum_3m: Option<f64>,
    pub roe: Option<f64>,
    pub operating_margin: Option<f64>,
    pub market_cap: Option<f64>,
    pub volatility: Option<f64>,
}

pub struct FactorExposureEngine;

impl FactorExposureEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, holdings: &[HoldingFactorInput]) -> Result<AnalysisResult, AnalysisError> {
        if holdings.len() < MIN_HOLDINGS {
            return Err(AnalysisError::InsufficientData(format!(
                "Factor model needs at least {MIN_HOLDINGS} holdings, have {}",
                holdings.len()
            )));
        }

        let mut result = AnalysisResult::new(ModelId::FactorExposure, PORTFOLIO_SYMBOL);

        // Cheapness scores high, so earnings and book multiples are negated.
        let z_neg_pe = cross_sectional_z(
            &holdings.iter().map(|h| h.pe_ratio.filter(|&v| v > 0.0).map(|v| -v)).collect::<Vec<_>>(),
        );
        let z_neg_pb = cross_sectional_z(
            &holdings.iter().map(|h| h.pb_ratio.filter(|&v| v > 0.0).map(|v| -v)).collect::<Vec<_>>(),
        );
        let z_momentum = cross_sectional_z(&holdings.iter().map(|h| h.momentum_3m).collect::<Vec<_>>());
        let z_roe = cross_sectional_z(&holdings.iter().map(|h| h.roe).collect::<Vec<_>>());
        let z_margin =
            cross_sectional_z(&holdings.iter().map(|h| h.operating_margin).collect::<Vec<_>>());
        // Small caps load positively on the size factor.
        let z_size = cross_sectional_z(
            &holdings
                .iter()
                .map(|h| h.market_cap.filter(|&v| v > 0.0).map(|v| -v.log10()))
                .collect::<Vec<_>>(),
        );
        let z_low_vol = cross_sectional_z(
            &holdings.iter().map(|h| h.volatility.map(|v| -v)).collect::<Vec<_>>(),
        );

        let n = holdings.len();
        let value: Vec<f64> = (0..n).map(|i| (z_neg_pe[i] + z_neg_pb[i]) / 2.0).collect();
        let quality: Vec<f64> = (0..n).map(|i| (z_roe[i] + z_margin[i]) / 2.0).collect();

        let factor_scores: [&Vec<f64>; 5] = [&value, &z_momentum, &quality, &z_size, &z_low_vol];
        let mut tilts = Vec::with_capacity(5);
        for (name, scores) in FACTOR_NAMES.iter().zip(factor_scores) {
            let tilt: f64 = holdings.iter().zip(scores).map(|(h, z)| h.weight * z).sum();
            result.metric(&format!("tilt_{name}"), tilt);
            result.add_series(&format!("z_{name}"), scores.clone());
            tilts.push(tilt);
        }
        result.add_series("tilts", tilts.clone());

        // Diversification: dispersion of the absolute tilts. Uneven tilt
        // magnitudes read as a concentrated style bet; uniform magnitudes
        // read as balanced. Score 1-10, 10 most diverse.
        let abs_tilts: Vec<f64> = tilts.iter().map(|t| t.abs()).collect();
        let mean_abs: f64 = abs_tilts.iter().sum::<f64>() / abs_tilts.len() as f64;
        let variance: f64 =
            abs_tilts.iter().map(|t| (t - mean_abs).powi(2)).sum::<f64>() / abs_tilts.len() as f64;
        let dispersion = variance.sqrt();
        let diversification = if dispersion <= 0.3 {
            10.0 - dispersion / 0.3
        } else if dispersion >= 1.0 {
            (2.0 - (dispersion - 1.0)).max(1.0)
        } else {
            9.0 - (dispersion - 0.3) / 0.7 * 7.0
        };
        result.metric("diversification_score", diversification);
        result.metric("holdings_count", n as f64);

        result.verdict = if diversification >= 8.0 {
            "Well Diversified"
        } else if diversification >= 6.0 {
            "Moderately Diversified"
        } else if diversification >= 4.0 {
            "Style Concentrated"
        } else {
            "Highly Concentrated"
        }
        .to_string();

        Ok(result)
    }
}

impl Default for FactorExposureEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, weight: f64, pe: f64, mcap: f64) -> HoldingFactorInput {
        HoldingFactorInput {
            symbol: symbol.to_string(),
            weight,
            pe_ratio: Some(pe),
            pb_ratio: Some(pe / 4.0),
            momentum_3m: Some(0.05),
            roe: Some(0.15),
            operating_margin: Some(0.20),
            market_cap: Some(mcap),
            volatility: Some(0.25),
        }
    }

    #[test]
    fn too_few_holdings_is_an_error() {
        let holdings: Vec<HoldingFactorInput> =
            (0..4).map(|i| holding(&format!("H{i}"), 0.25, 20.0, 1.0e10)).collect();
        let err = FactorExposureEngine::new().evaluate(&holdings).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[test]
    fn identical_holdings_have_zero_tilts() {
        let holdings: Vec<HoldingFactorInput> =
            (0..6).map(|i| holding(&format!("H{i}"), 1.0 / 6.0, 20.0, 1.0e10)).collect();
        let result = FactorExposureEngine::new().evaluate(&holdings).unwrap();
        for name in FACTOR_NAMES {
            let tilt = result.get_metric(&format!("tilt_{name}")).unwrap();
            assert!(tilt.abs() < 1e-12, "{name} tilt should be 0, got {tilt}");
        }
        assert_eq!(result.verdict, "Well Diversified");
    }

    #[test]
    fn uniform_tilt_magnitudes_score_well_diversified() {
        // One dominant holding that is best on every factor: each factor's
        // cross-section has the same one-outlier shape, so all five |tilts|
        // land at the same magnitude and their dispersion is ~0.
        let mut holdings = vec![HoldingFactorInput {
            symbol: "DOM".to_string(),
            weight: 0.6,
            pe_ratio: Some(5.0),
            pb_ratio: Some(1.0),
            momentum_3m: Some(0.50),
            roe: Some(0.40),
            operating_margin: Some(0.50),
            market_cap: Some(1.0e8),
            volatility: Some(0.10),
        }];
        for i in 0..4 {
            holdings.push(HoldingFactorInput {
                symbol: format!("H{i}"),
                weight: 0.1,
                pe_ratio: Some(30.0),
                pb_ratio: Some(7.5),
                momentum_3m: Some(0.01),
                roe: Some(0.10),
                operating_margin: Some(0.10),
                market_cap: Some(1.0e11),
                volatility: Some(0.40),
            });
        }
        let result = FactorExposureEngine::new().evaluate(&holdings).unwrap();
        for name in FACTOR_NAMES {
            let tilt = result.get_metric(&format!("tilt_{name}")).unwrap();
            assert!((tilt - 1.0).abs() < 1e-9, "{name} tilt should be 1.0, got {tilt}");
        }
        let score = result.get_metric("diversification_score").unwrap();
        assert!(score >= 9.0, "equal tilt magnitudes should score high, got {score}");
        assert_eq!(result.verdict, "Well Diversified");
    }

    #[test]
    fn cheap_heavy_portfolio_tilts_toward_value() {
        let mut holdings: Vec<HoldingFactorInput> = Vec::new();
        // 80% of weight in two cheap names, the rest expensive.
        holdings.push(holding("CHEAP1", 0.4, 8.0, 1.0e10));
        holdings.push(holding("CHEAP2", 0.4, 9.0, 1.0e10));
        holdings.push(holding("EXP1", 0.07, 45.0, 1.0e10));
        holdings.push(holding("EXP2", 0.07, 50.0, 1.0e10));
        holdings.push(holding("EXP3", 0.06, 55.0, 1.0e10));
        let result = FactorExposureEngine::new().evaluate(&holdings).unwrap();
        assert!(result.get_metric("tilt_value").unwrap() > 0.3);
    }

    #[test]
    fn missing_fields_score_neutral() {
        let mut holdings: Vec<HoldingFactorInput> =
            (0..5).map(|i| holding(&format!("H{i}"), 0.2, 15.0 + i as f64 * 5.0, 1.0e10)).collect();
        holdings[0].momentum_3m = None;
        holdings[0].roe = None;
        let result = FactorExposureEngine::new().evaluate(&holdings).unwrap();
        let z_mom = &result.series["z_momentum"];
        assert_eq!(z_mom[0], 0.0);
    }

    #[test]
    fn z_scores_are_clamped() {
        let mut holdings: Vec<HoldingFactorInput> =
            (0..8).map(|i| holding(&format!("H{i}"), 0.125, 20.0, 1.0e10)).collect();
        holdings[0].momentum_3m = Some(50.0); // extreme outlier
        for (i, h) in holdings.iter_mut().enumerate().skip(1) {
            h.momentum_3m = Some(0.01 * i as f64);
        }
        let result = FactorExposureEngine::new().evaluate(&holdings).unwrap();
        let z_mom = &result.series["z_momentum"];
        assert!(z_mom.iter().all(|z| (-2.0..=2.0).contains(z)));
        assert_eq!(z_mom[0], 2.0);
    }
}
