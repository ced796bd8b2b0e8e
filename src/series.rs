use crate::errors::{EngineError, EngineResult};
use chrono::NaiveDate;
use statrs::statistics::Statistics;

/// Dated observations with strictly increasing dates.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
pub struct OrderedSeries {
    points: Vec<(NaiveDate, f64)>,
}

impl OrderedSeries {
    /// Rejects any date that does not come strictly after its predecessor.
    pub fn new(points: Vec<(NaiveDate, f64)>) -> EngineResult<Self> {
        if let Some(idx) = points.windows(2).position(|w| w[1].0 <= w[0].0) {
            return Err(EngineError::invalid(
                "dates",
                (idx + 1) as f64,
                "must be strictly increasing",
            ));
        }
        Ok(Self { points })
    }

    /// `date,value` lines with ISO dates. Blank lines and `#` comments are
    /// skipped, as is a first line whose fields are neither a date nor a number.
    pub fn from_csv(text: &str) -> EngineResult<Self> {
        let mut points = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (date, value) = line
                .split_once(',')
                .ok_or_else(|| EngineError::Parse(format!("line {}: expected `date,value`", lineno + 1)))?;
            let value = value.trim().parse::<f64>();
            let date = match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) if lineno == 0 && value.is_err() => continue,
                Err(e) => return Err(EngineError::Parse(format!("line {}: {e}", lineno + 1))),
            };
            let value = value.map_err(|e| EngineError::Parse(format!("line {}: {e}", lineno + 1)))?;
            points.push((date, value));
        }
        Self::new(points)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|&(_, v)| v)
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.points.last().copied()
    }

    /// Transform every value, keeping dates (and therefore ordering).
    pub fn map_values(&self, mut f: impl FnMut(NaiveDate, f64) -> f64) -> OrderedSeries {
        OrderedSeries {
            points: self.points.iter().map(|&(d, v)| (d, f(d, v))).collect(),
        }
    }

    /// Keep only the points the predicate accepts. A subsequence stays ordered.
    pub fn filter(&self, mut keep: impl FnMut(NaiveDate, f64) -> bool) -> OrderedSeries {
        OrderedSeries {
            points: self.points.iter().copied().filter(|&(d, v)| keep(d, v)).collect(),
        }
    }

    /// None for an empty series. `std_dev` is the n-1 sample deviation (NaN below 2 points).
    pub fn summary(&self) -> Option<SeriesSummary> {
        let (start, _) = *self.points.first()?;
        let (end, _) = *self.points.last()?;
        let values: Vec<f64> = self.values().collect();
        Some(SeriesSummary {
            count: values.len(),
            mean: values.iter().mean(),
            std_dev: values.iter().std_dev(),
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
            start,
            end,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Daily series starting 2024-01-01.
    pub(crate) fn daily(values: &[f64]) -> OrderedSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + chrono::Days::new(i as u64), v))
            .collect();
        OrderedSeries::new(points).expect("ordered")
    }

    #[test]
    fn test_rejects_unordered_dates() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date");
        let err = OrderedSeries::new(vec![(d(1), 1.0), (d(3), 2.0), (d(3), 3.0)]);
        assert!(matches!(err, Err(EngineError::InvalidParameter { field: "dates", value, .. }) if value == 2.0));

        let err = OrderedSeries::new(vec![(d(5), 1.0), (d(4), 2.0)]);
        assert!(err.is_err(), "descending dates must be rejected");
    }

    #[test]
    fn test_from_csv() {
        let text = "date,ghi\n2024-01-01,5.5\n\n# gap\n2024-01-03, 6.25\n";
        let s = OrderedSeries::from_csv(text).expect("parsed");
        assert_eq!(s.len(), 2);
        assert_eq!(s.last(), Some((NaiveDate::from_ymd_opt(2024, 1, 3).expect("valid date"), 6.25)));

        assert!(matches!(
            OrderedSeries::from_csv("2024-01-01,1.0\n2024-01-02,abc\n"),
            Err(EngineError::Parse(msg)) if msg.starts_with("line 2")
        ));
        assert!(matches!(
            OrderedSeries::from_csv("2024-01-02,1.0\n2024-01-01,2.0\n"),
            Err(EngineError::InvalidParameter { field: "dates", .. })
        ));
    }

    #[test]
    fn test_bad_date_on_first_row_is_an_error() {
        assert!(matches!(
            OrderedSeries::from_csv("2024-13-01,5.0\n2024-01-02,6.0\n"),
            Err(EngineError::Parse(msg)) if msg.starts_with("line 1")
        ));
        assert!(matches!(
            OrderedSeries::from_csv("2024-01-01,5.0\n2024-13-02,6.0\n"),
            Err(EngineError::Parse(msg)) if msg.starts_with("line 2")
        ));
    }

    #[test]
    fn test_summary() {
        let s = daily(&[1.0, 2.0, 3.0, 4.0]);
        let summary = s.summary().expect("non-empty");
        assert_eq!(summary.count, 4);
        assert!((summary.mean - 2.5).abs() < 1e-12);
        assert!((summary.std_dev - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12, "sample std: {}", summary.std_dev);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.end, NaiveDate::from_ymd_opt(2024, 1, 4).expect("valid date"));

        assert!(OrderedSeries::default().summary().is_none());
    }

    #[test]
    fn test_map_and_filter_keep_dates() {
        let s = daily(&[1.0, -2.0, 3.0]);
        let doubled = s.map_values(|_, v| v * 2.0);
        assert_eq!(doubled.values().collect::<Vec<_>>(), vec![2.0, -4.0, 6.0]);
        assert_eq!(doubled.points()[2].0, s.points()[2].0);

        let positive = s.filter(|_, v| v > 0.0);
        assert_eq!(positive.len(), 2);
        assert_eq!(positive.last(), s.last());
    }
}
