//! Trend forecaster agent
//!
//! Buckets the document signal over the window, smooths it with an
//! EWMA (α = 0.3), reads direction from the slope over the last five
//! buckets, and sizes the confidence interval inversely to the
//! signal-to-noise ratio, clamped to [0.1, 0.9]. Drivers are the most
//! recent high-signal documents, each carrying evidence.

use async_trait::async_trait;
use chrono::Utc;
use newsloom_core::outputs::{AgentOutput, ForecastDriver, ForecastOutput, Momentum};
use newsloom_core::routes::TaskKind;
use newsloom_core::types::EvidenceRef;
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};

/// EWMA smoothing factor
pub const EWMA_ALPHA: f64 = 0.3;
/// Buckets the slope is measured over
pub const SLOPE_BUCKETS: usize = 5;
/// Buckets the window is divided into
const BUCKET_COUNT: usize = 10;
/// Relative slope below which the signal reads flat
const FLAT_BAND: f64 = 0.05;
/// Driver count bounds
const MIN_DRIVERS: usize = 3;
const MAX_DRIVERS: usize = 5;

/// EWMA-based publication-volume forecasting
#[derive(Debug, Default)]
pub struct TrendForecasterAgent;

impl TrendForecasterAgent {
    /// Exponentially weighted moving average of a signal
    #[must_use]
    pub fn ewma(signal: &[f64], alpha: f64) -> Vec<f64> {
        let mut smoothed = Vec::with_capacity(signal.len());
        let mut previous: Option<f64> = None;
        for &value in signal {
            let next = match previous {
                Some(prev) => alpha.mul_add(value, (1.0 - alpha) * prev),
                None => value,
            };
            smoothed.push(next);
            previous = Some(next);
        }
        smoothed
    }

    /// Least-squares slope over the last [`SLOPE_BUCKETS`] points
    #[must_use]
    pub fn slope(smoothed: &[f64]) -> f64 {
        let tail: Vec<f64> = smoothed
            .iter()
            .rev()
            .take(SLOPE_BUCKETS)
            .rev()
            .copied()
            .collect();
        let n = tail.len();
        if n < 2 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n_f = n as f64;
        #[allow(clippy::cast_precision_loss)]
        let mean_x = (n as f64 - 1.0) / 2.0;
        let mean_y: f64 = tail.iter().sum::<f64>() / n_f;
        let mut num = 0.0;
        let mut den = 0.0;
        for (i, y) in tail.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f64;
            num += (x - mean_x) * (y - mean_y);
            den += (x - mean_x) * (x - mean_x);
        }
        if den == 0.0 {
            0.0
        } else {
            num / den
        }
    }

    /// Confidence-interval width from the signal-to-noise ratio
    #[must_use]
    pub fn ci_width(signal: &[f64]) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = signal.len().max(1) as f64;
        let mean: f64 = signal.iter().sum::<f64>() / n;
        let variance: f64 = signal.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let snr = if std > f64::EPSILON {
            mean.abs() / std
        } else {
            // constant signal: maximal certainty
            10.0
        };
        (1.0 / (1.0 + snr)).clamp(0.1, 0.9)
    }
}

#[async_trait]
impl Agent for TrendForecasterAgent {
    fn name(&self) -> &'static str {
        "trend_forecaster"
    }

    fn task(&self) -> TaskKind {
        TaskKind::TrendForecast
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to forecast"));
        }

        let now = Utc::now().date_naive();
        let span_days = ctx.params.window.duration().num_days().max(1);
        #[allow(clippy::cast_precision_loss)]
        let bucket_days = (span_days as f64 / BUCKET_COUNT as f64).max(1.0);

        let mut signal = vec![0.0f64; BUCKET_COUNT];
        for doc in ctx.docs.iter() {
            let age = (now - doc.published_date).num_days().max(0);
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bucket_from_end = (age as f64 / bucket_days).floor() as usize;
            if bucket_from_end < BUCKET_COUNT {
                signal[BUCKET_COUNT - 1 - bucket_from_end] += 1.0;
            }
        }

        let smoothed = Self::ewma(&signal, EWMA_ALPHA);
        let slope = Self::slope(&smoothed);
        let mean: f64 = signal.iter().sum::<f64>() / signal.len() as f64;
        let relative = if mean > f64::EPSILON { slope / mean } else { 0.0 };
        let direction = if relative > FLAT_BAND {
            Momentum::Up
        } else if relative < -FLAT_BAND {
            Momentum::Down
        } else {
            Momentum::Flat
        };

        let width = Self::ci_width(&signal);
        let center = 0.5 + 0.4 * relative.tanh();
        let lo = (center - width / 2.0).clamp(0.0, 1.0);
        let hi = (center + width / 2.0).clamp(lo, 1.0);

        // drivers: newest documents first, ties by id
        let mut ranked: Vec<&newsloom_core::Document> = ctx.docs.iter().collect();
        ranked.sort_by(|a, b| {
            b.published_date
                .cmp(&a.published_date)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        let drivers: Vec<ForecastDriver> = ranked
            .into_iter()
            .take(MAX_DRIVERS.min(ctx.docs.len()).max(MIN_DRIVERS.min(ctx.docs.len())))
            .map(|doc| ForecastDriver {
                text: doc.title.clone(),
                evidence_refs: vec![EvidenceRef::from_document(doc)],
            })
            .collect();

        debug!(?direction, slope, lo, hi, "forecast computed");
        Ok(AgentOutput::TrendForecaster(ForecastOutput {
            direction,
            slope,
            drivers,
            confidence_interval: [lo, hi],
        }))
    }
}
