use std::fmt::{Display, Formatter};

/// How a series is reduced to a single value before it is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    /// Nearest-rank percentile, `0..=100`
    Percentile(f64),
    /// Fraction of matching observations in a rate series
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    Lt(f64),
    Le(f64),
    Gt(f64),
    Ge(f64),
    Eq(f64),
    Ne(f64),
}

impl Comparison {
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Comparison::Lt(limit) => value < limit,
            Comparison::Le(limit) => value <= limit,
            Comparison::Gt(limit) => value > limit,
            Comparison::Ge(limit) => value >= limit,
            Comparison::Eq(limit) => value == limit,
            Comparison::Ne(limit) => value != limit,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThresholdParseError {
    #[error("threshold '{0}' has no comparison operator")]
    MissingOperator(String),
    #[error("threshold '{0}' uses an unknown aggregation")]
    UnknownAggregation(String),
    #[error("threshold '{0}' has an invalid percentile, expected p(0..=100)")]
    InvalidPercentile(String),
    #[error("threshold '{0}' does not compare against a number")]
    InvalidLimit(String),
}

/// A pass/fail gate on one series, written the way k6 writes them: `p(95)<500`, `rate<0.1`,
/// `avg<=200`.
///
/// Thresholds are only checked once the run has finished. They never stop a run early.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    metric: String,
    expression: String,
    aggregation: Aggregation,
    comparison: Comparison,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        let compact = expression
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>();

        // Two character operators must be tried before their one character prefixes.
        let (position, operator) = ["<=", ">=", "==", "!=", "<", ">"]
            .iter()
            .filter_map(|op| compact.find(op).map(|position| (position, *op)))
            .min_by_key(|(position, op)| (*position, std::cmp::Reverse(op.len())))
            .ok_or_else(|| ThresholdParseError::MissingOperator(expression.to_string()))?;

        let aggregation = parse_aggregation(&compact[..position], expression)?;
        let limit = compact[position + operator.len()..]
            .parse::<f64>()
            .ok()
            .filter(|l| l.is_finite())
            .ok_or_else(|| ThresholdParseError::InvalidLimit(expression.to_string()))?;

        let comparison = match operator {
            "<=" => Comparison::Le(limit),
            ">=" => Comparison::Ge(limit),
            "==" => Comparison::Eq(limit),
            "!=" => Comparison::Ne(limit),
            "<" => Comparison::Lt(limit),
            _ => Comparison::Gt(limit),
        };

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            aggregation,
            comparison,
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }
}

impl Display for Threshold {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.metric, self.expression)
    }
}

fn parse_aggregation(input: &str, expression: &str) -> Result<Aggregation, ThresholdParseError> {
    match input {
        "avg" => Ok(Aggregation::Avg),
        "min" => Ok(Aggregation::Min),
        "max" => Ok(Aggregation::Max),
        "med" => Ok(Aggregation::Med),
        "rate" => Ok(Aggregation::Rate),
        _ => {
            let inner = input
                .strip_prefix("p(")
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| ThresholdParseError::UnknownAggregation(expression.to_string()))?;
            inner
                .parse::<f64>()
                .ok()
                .filter(|p| (0.0..=100.0).contains(p))
                .map(Aggregation::Percentile)
                .ok_or_else(|| ThresholdParseError::InvalidPercentile(expression.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_percentile_threshold() {
        let threshold = Threshold::parse("wallet_balance_latency", "p(95)<500").unwrap();

        assert_eq!("wallet_balance_latency", threshold.metric());
        assert_eq!(Aggregation::Percentile(95.0), threshold.aggregation());
        assert_eq!(Comparison::Lt(500.0), threshold.comparison());
    }

    #[test]
    fn parse_rate_threshold_with_spaces() {
        let threshold = Threshold::parse("wallet_failed_requests", "rate < 0.1").unwrap();

        assert_eq!(Aggregation::Rate, threshold.aggregation());
        assert_eq!(Comparison::Lt(0.1), threshold.comparison());
        assert_eq!("rate < 0.1", threshold.expression());
    }

    #[test]
    fn parse_two_character_operators() {
        assert_eq!(
            Comparison::Le(200.0),
            Threshold::parse("x", "avg<=200").unwrap().comparison()
        );
        assert_eq!(
            Comparison::Ge(1.0),
            Threshold::parse("x", "min>=1").unwrap().comparison()
        );
        assert_eq!(
            Comparison::Ne(0.0),
            Threshold::parse("x", "max!=0").unwrap().comparison()
        );
        assert_eq!(
            Comparison::Gt(0.9),
            Threshold::parse("x", "rate>0.9").unwrap().comparison()
        );
    }

    #[test]
    fn reject_malformed_thresholds() {
        assert_eq!(
            ThresholdParseError::MissingOperator("p(95)".to_string()),
            Threshold::parse("x", "p(95)").unwrap_err()
        );
        assert_eq!(
            ThresholdParseError::UnknownAggregation("mode<3".to_string()),
            Threshold::parse("x", "mode<3").unwrap_err()
        );
        assert_eq!(
            ThresholdParseError::InvalidPercentile("p(101)<3".to_string()),
            Threshold::parse("x", "p(101)<3").unwrap_err()
        );
        assert_eq!(
            ThresholdParseError::InvalidLimit("avg<fast".to_string()),
            Threshold::parse("x", "avg<fast").unwrap_err()
        );
    }

    #[test]
    fn comparison_holds() {
        assert!(Comparison::Lt(500.0).holds(499.9));
        assert!(!Comparison::Lt(500.0).holds(500.0));
        assert!(Comparison::Le(500.0).holds(500.0));
        assert!(Comparison::Eq(0.0).holds(0.0));
    }
}
