//! Rate: per-second change between the last two samples.
//!
//! Rates are computed across flushes, so the last sample is kept after a
//! flush and becomes the reference point for the next interval.

use crate::core::{Result, TesseraError};
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{ApiMetricType, MetricSample, Point};

#[derive(Debug, Clone, Copy)]
struct Observation {
    value: f64,
    ts: f64,
}

/// Rate of change of a raw counter
#[derive(Debug, Default)]
pub struct Rate {
    previous: Option<Observation>,
    current: Option<Observation>,
}

impl Metric for Rate {
    fn add_sample(&mut self, sample: &MetricSample, timestamp: f64) {
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
        self.current = Some(Observation {
            value: sample.value,
            ts: timestamp,
        });
    }

    fn flush(&mut self, _timestamp: f64) -> Result<Option<Vec<Serie>>> {
        let (previous, current) = match (self.previous, self.current) {
            (Some(p), Some(c)) => (p, c),
            _ => return Ok(None),
        };

        if current.ts == previous.ts {
            return Err(TesseraError::flush(
                "rate was sampled twice at the same timestamp, can't compute a rate",
            ));
        }

        let value = (current.value - previous.value) / (current.ts - previous.ts);
        self.previous = Some(current);
        self.current = None;

        if value < 0.0 {
            return Err(TesseraError::flush(
                "rate value is negative, discarding it (the underlying counter may have been reset)",
            ));
        }
        Ok(Some(vec![Serie::point(ApiMetricType::Gauge, current.ts, value)]))
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn reference(&self) -> Option<Point> {
        self.current.or(self.previous).map(|o| Point {
            ts: o.ts,
            value: o.value,
        })
    }

    fn resume(&mut self, reference: Point) {
        if self.previous.is_none() && self.current.is_some() {
            self.previous = Some(Observation {
                value: reference.value,
                ts: reference.ts,
            });
        }
    }
}
