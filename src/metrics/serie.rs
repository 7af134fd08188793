//! Finalized series.

use crate::ckey::ContextKey;
use crate::metrics::types::{ApiMetricType, Point};
use crate::tagset::Tags;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Points of a serie. Almost every serie carries exactly one.
pub type Points = SmallVec<[Point; 1]>;

/// An aggregated time series produced by flushing an accumulator.
///
/// Accumulators only know their values; the context (name, host, tags) is
/// attached by the store and the sampler once the serie leaves the
/// accumulator.
#[derive(Clone)]
pub struct Serie {
    pub(crate) context_key: ContextKey,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) name_suffix: Cow<'static, str>,
    pub(crate) tags: Tags,
    pub(crate) host: Option<Arc<str>>,
    pub(crate) mtype: ApiMetricType,
    pub(crate) interval: i64,
    pub(crate) points: Points,
}

impl Serie {
    /// A serie with a single point
    pub fn point(mtype: ApiMetricType, ts: f64, value: f64) -> Self {
        Self::with_points(mtype, smallvec::smallvec![Point { ts, value }])
    }

    /// A serie with the given points
    pub fn with_points(mtype: ApiMetricType, points: Points) -> Self {
        Self {
            context_key: ContextKey::default(),
            name: None,
            name_suffix: Cow::Borrowed(""),
            tags: Tags::empty(),
            host: None,
            mtype,
            interval: 0,
            points,
        }
    }

    /// Set the suffix appended to the context name (e.g. `.max`)
    pub fn suffix(mut self, suffix: impl Into<Cow<'static, str>>) -> Self {
        self.name_suffix = suffix.into();
        self
    }

    /// Set the interval, for rates
    pub fn interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    /// Attach the serie to a context key
    #[inline]
    pub(crate) fn bind_key(&mut self, key: ContextKey) {
        self.context_key = key;
    }

    /// Attach the context identity. The final name is the context name
    /// followed by the suffix.
    pub(crate) fn bind_context(&mut self, name: &Arc<str>, host: &Arc<str>, tags: &Tags) {
        self.name = Some(if self.name_suffix.is_empty() {
            Arc::clone(name)
        } else {
            Arc::from(format!("{}{}", name, self.name_suffix))
        });
        self.host = Some(Arc::clone(host));
        self.tags = tags.clone();
    }

    /// Context this serie belongs to
    #[inline]
    pub fn context_key(&self) -> ContextKey {
        self.context_key
    }

    /// Full name, empty until the context is bound
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Suffix added by the accumulator
    pub fn name_suffix(&self) -> &str {
        &self.name_suffix
    }

    /// Tags
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Host, empty until the context is bound
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("")
    }

    /// Intake type
    pub fn mtype(&self) -> ApiMetricType {
        self.mtype
    }

    /// Interval in seconds (0 when not relevant)
    pub fn interval_secs(&self) -> i64 {
        self.interval
    }

    /// Points
    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl fmt::Debug for Serie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serie")
            .field("context_key", &self.context_key)
            .field("name", &self.name())
            .field("suffix", &self.name_suffix)
            .field("tags", &self.tags)
            .field("host", &self.host())
            .field("mtype", &self.mtype)
            .field("interval", &self.interval)
            .field("points", &self.points)
            .finish()
    }
}
