//! Stateless numeric primitives shared by the analysis engines. Pure
//! functions over slices; no error state, only well-defined partial results
//! (outputs are shorter than inputs until enough history exists).

use research_core::PriceBar;


/// Simple Moving Average over each trailing window.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Exponential Moving Average seeded with the simple average of the first
/// `span` values; smoothing factor k = 2/(span+1). The first output value
/// corresponds to input index `span - 1`.
pub fn ema(data: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || data.len() < span {
        return vec![];
    }

    let k = 2.0 / (span as f64 + 1.0);
    let seed: f64 = data[..span].iter().sum::<f64>() / span as f64;

    let mut result = Vec::with_capacity(data.len() - span + 1);
    result.push(seed);
    for &value in &data[span..] {
        let prev = *result.last().unwrap();
        result.push(value * k + prev * (1.0 - k));
    }
    result
}

/// Population standard deviation over each trailing window.
pub fn rolling_std(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let window = &data[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        result.push(variance.sqrt());
    }
    result
}

/// Relative Strength Index with Wilder smoothing. Seeds the average gain and
/// loss over the first `period` changes, then smooths each step with
/// `avg = (avg * (n-1) + value) / n`. RSI is exactly 100 when the smoothed
/// average loss is 0.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return vec![];
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let point = |avg_gain: f64, avg_loss: f64| {
        if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        }
    };

    let mut result = Vec::with_capacity(gains.len() - period + 1);
    result.push(point(avg_gain, avg_loss));
    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result.push(point(avg_gain, avg_loss));
    }
    result
}

/// MACD line (EMA12 - EMA26), its EMA9 signal line, and the histogram.
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    if fast == 0 || signal == 0 || slow <= fast {
        return MacdResult {
            macd_line: vec![],
            signal_line: vec![],
            histogram: vec![],
        };
    }

    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    if ema_slow.is_empty() {
        return MacdResult {
            macd_line: vec![],
            signal_line: vec![],
            histogram: vec![],
        };
    }

    // Both EMAs end at the last close; align them from the back.
    let offset = ema_fast.len() - ema_slow.len();
    let macd_line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, slow_val)| ema_fast[i + offset] - slow_val)
        .collect();

    let signal_line = ema(&macd_line, signal);
    let hist_offset = macd_line.len() - signal_line.len();
    let histogram: Vec<f64> = signal_line
        .iter()
        .enumerate()
        .map(|(i, sig)| macd_line[i + hist_offset] - sig)
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands: SMA middle band with +/- k population stdevs.
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(closes: &[f64], period: usize, k: f64) -> BollingerBands {
    let middle = sma(closes, period);
    let stdev = rolling_std(closes, period);

    let upper: Vec<f64> = middle.iter().zip(&stdev).map(|(m, s)| m + k * s).collect();
    let lower: Vec<f64> = middle.iter().zip(&stdev).map(|(m, s)| m - k * s).collect();

    BollingerBands { upper, middle, lower }
}

/// %B position of a close within its band; 0.5 when the band width is zero.
pub fn percent_b(close: f64, upper: f64, lower: f64) -> f64 {
    let width = upper - lower;
    if width == 0.0 {
        0.5
    } else {
        (close - lower) / width
    }
}

/// Local-extrema support and resistance levels.
pub struct SupportResistance {
    /// Up to 3 lowest support levels found, ascending.
    pub supports: Vec<f64>,
    /// Up to 3 highest resistance levels found, descending.
    pub resistances: Vec<f64>,
}

/// Scan the trailing `lookback` bars (at most) for local extrema: a bar is a
/// support when no bar within `window` positions on either side has a lower
/// low, and a resistance symmetrically on highs.
pub fn support_resistance(bars: &[PriceBar], window: usize, lookback: usize) -> SupportResistance {
    let recent = &bars[bars.len().saturating_sub(lookback)..];
    let mut supports = Vec::new();
    let mut resistances = Vec::new();

    if recent.len() > 2 * window {
        for i in window..recent.len() - window {
            let neighborhood = &recent[i - window..=i + window];
            let is_support = neighborhood.iter().all(|b| b.low >= recent[i].low);
            let is_resistance = neighborhood.iter().all(|b| b.high <= recent[i].high);
            if is_support {
                supports.push(recent[i].low);
            }
            if is_resistance {
                resistances.push(recent[i].high);
            }
        }
    }

    supports.sort_by(|a, b| a.partial_cmp(b).unwrap());
    supports.truncate(3);
    resistances.sort_by(|a, b| b.partial_cmp(a).unwrap());
    resistances.truncate(3);

    SupportResistance { supports, resistances }
}

/// Ordinary-least-squares slope of `values` against index 0..n-1.
/// Returns 0 for fewer than 2 points or zero variance in x.
pub fn linreg_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Cross-sectional z-scores over a set of sibling values. The mean and
/// population stdev are computed over the valid subset; missing inputs map to
/// the neutral score 0, and every score is clamped to [-2, 2].
pub fn cross_sectional_z(values: &[Option<f64>]) -> Vec<f64> {
    let valid: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    if valid.len() < 2 {
        return vec![0.0; values.len()];
    }

    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let variance = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / valid.len() as f64;
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        return vec![0.0; values.len()];
    }

    values
        .iter()
        .map(|v| match v {
            Some(x) => ((x - mean) / stdev).clamp(-2.0, 2.0),
            None => 0.0,
        })
        .collect()
}

/// On-Balance Volume.
pub fn obv(bars: &[PriceBar]) -> Vec<f64> {
    if bars.is_empty() {
        return vec![];
    }

    let mut result = Vec::with_capacity(bars.len());
    result.push(bars[0].volume);
    for w in bars.windows(2) {
        let prev = *result.last().unwrap();
        let next = if w[1].close > w[0].close {
            prev + w[1].volume
        } else if w[1].close < w[0].close {
            prev - w[1].volume
        } else {
            prev
        };
        result.push(next);
    }
    result
}
