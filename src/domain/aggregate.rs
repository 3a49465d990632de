//! Reductions summarizing an attribute over the samples of a node.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::domain::entities::Value;
use crate::domain::error::ConfigurationError;

/// Supported aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Median,
    Mode,
    Min,
    Max,
    Sum,
    /// Number of non-missing values
    Count,
    /// Number of distinct values
    Distinct,
}

impl Aggregation {
    pub const ALL: [Aggregation; 8] = [
        Aggregation::Mean,
        Aggregation::Median,
        Aggregation::Mode,
        Aggregation::Min,
        Aggregation::Max,
        Aggregation::Sum,
        Aggregation::Count,
        Aggregation::Distinct,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::Mode => "mode",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Distinct => "distinct",
        }
    }

    /// Whether the function is only defined over numbers.
    pub fn requires_numeric(&self) -> bool {
        matches!(
            self,
            Aggregation::Mean
                | Aggregation::Median
                | Aggregation::Min
                | Aggregation::Max
                | Aggregation::Sum
        )
    }

    /// Reduce the values of one node. Returns `None` for an empty input.
    ///
    /// Numeric functions skip text values; callers validate the column type
    /// beforehand.
    pub fn apply(&self, values: &[&Value]) -> Option<Value> {
        if values.is_empty() {
            return None;
        }
        match self {
            Aggregation::Count => Some(Value::Number(values.len() as f64)),
            Aggregation::Distinct => {
                let sorted = sorted_naturally(values);
                Some(Value::Number(sorted.into_iter().dedup().count() as f64))
            }
            Aggregation::Mode => mode(values),
            Aggregation::Mean => {
                let numbers = numbers(values);
                if numbers.is_empty() {
                    return None;
                }
                Some(Value::Number(
                    numbers.iter().sum::<f64>() / numbers.len() as f64,
                ))
            }
            Aggregation::Median => median(numbers(values)).map(Value::Number),
            Aggregation::Min => numbers(values)
                .into_iter()
                .reduce(f64::min)
                .map(Value::Number),
            Aggregation::Max => numbers(values)
                .into_iter()
                .reduce(f64::max)
                .map(Value::Number),
            Aggregation::Sum => {
                let numbers = numbers(values);
                if numbers.is_empty() {
                    None
                } else {
                    Some(Value::Number(numbers.iter().sum()))
                }
            }
        }
    }
}

/// Numeric values in ascending order, so sums do not depend on row order.
fn numbers(values: &[&Value]) -> Vec<f64> {
    let mut numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
    numbers.sort_by(f64::total_cmp);
    numbers
}

fn sorted_naturally<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.natural_cmp(b));
    sorted
}

/// Expects `numbers` sorted ascending.
fn median(numbers: Vec<f64>) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    let mid = numbers.len() / 2;
    if numbers.len() % 2 == 0 {
        Some((numbers[mid - 1] + numbers[mid]) / 2.0)
    } else {
        Some(numbers[mid])
    }
}

/// Most frequent value; ties go to the value that sorts first.
fn mode(values: &[&Value]) -> Option<Value> {
    let mut best: Option<(usize, &Value)> = None;
    for (count, value) in sorted_naturally(values).into_iter().dedup_with_count() {
        if best.map_or(true, |(n, _)| count > n) {
            best = Some((count, value));
        }
    }
    best.map(|(_, v)| v.clone())
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregation {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| ConfigurationError::UnknownAggregation(s.to_string()))
    }
}

/// One attribute/function pair to evaluate per node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub attribute: String,
    pub function: Aggregation,
}

impl AggregateRequest {
    pub fn new(attribute: impl Into<String>, function: Aggregation) -> Self {
        Self {
            attribute: attribute.into(),
            function,
        }
    }

    /// Key under which the result is stored on a node, e.g. `mean_age`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.function, self.attribute)
    }
}

impl fmt::Display for AggregateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.attribute, self.function)
    }
}

/// Parses `attribute:function`, e.g. `age:mean`.
impl FromStr for AggregateRequest {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (attribute, function) =
            s.rsplit_once(':')
                .ok_or_else(|| ConfigurationError::InvalidParameter {
                    name: "aggregation",
                    message: format!("expected 'attribute:function', got '{}'", s),
                })?;
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                name: "aggregation",
                message: format!("missing attribute in '{}'", s),
            });
        }
        Ok(Self::new(attribute, function.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|&v| Value::Number(v)).collect()
    }

    fn apply(function: Aggregation, values: &[Value]) -> Option<Value> {
        let refs: Vec<&Value> = values.iter().collect();
        function.apply(&refs)
    }

    #[rstest]
    #[case(Aggregation::Mean, 2.5)]
    #[case(Aggregation::Median, 2.5)]
    #[case(Aggregation::Min, 1.0)]
    #[case(Aggregation::Max, 4.0)]
    #[case(Aggregation::Sum, 10.0)]
    #[case(Aggregation::Count, 4.0)]
    #[case(Aggregation::Distinct, 4.0)]
    fn given_numbers_when_aggregating_then_returns_expected(
        #[case] function: Aggregation,
        #[case] expected: f64,
    ) {
        let values = nums(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(apply(function, &values), Some(Value::Number(expected)));
    }

    #[rstest]
    #[case(Aggregation::Mean)]
    #[case(Aggregation::Sum)]
    fn given_fractions_in_any_order_when_summing_then_same_bits(#[case] function: Aggregation) {
        let forward = apply(function, &nums(&[0.1, 0.2, 0.3]));
        let backward = apply(function, &nums(&[0.3, 0.2, 0.1]));

        assert_eq!(forward, backward);
    }

    #[test]
    fn given_odd_count_when_median_then_returns_middle() {
        assert_eq!(
            apply(Aggregation::Median, &nums(&[9.0, 1.0, 5.0])),
            Some(Value::Number(5.0))
        );
    }

    #[test]
    fn given_categories_when_mode_then_most_frequent_wins() {
        let values: Vec<Value> = ["b", "a", "b", "c"]
            .iter()
            .map(|s| Value::Text(s.to_string()))
            .collect();
        assert_eq!(
            apply(Aggregation::Mode, &values),
            Some(Value::Text("b".into()))
        );
    }

    #[test]
    fn given_tied_mode_when_aggregating_then_first_in_natural_order_wins() {
        let values: Vec<Value> = ["z", "y", "z", "y"]
            .iter()
            .map(|s| Value::Text(s.to_string()))
            .collect();
        assert_eq!(
            apply(Aggregation::Mode, &values),
            Some(Value::Text("y".into()))
        );
    }

    #[test]
    fn given_no_values_when_aggregating_then_missing() {
        for function in Aggregation::ALL {
            assert_eq!(apply(function, &[]), None, "{}", function);
        }
    }

    #[test]
    fn given_request_string_when_parsing_then_splits_attribute_and_function() {
        let request: AggregateRequest = "cell:type:mode".parse().unwrap();
        assert_eq!(request.attribute, "cell:type");
        assert_eq!(request.function, Aggregation::Mode);
        assert_eq!(request.key(), "mode_cell:type");
    }

    #[rstest]
    #[case("age")]
    #[case(":mean")]
    #[case("age:average")]
    fn given_bad_request_string_when_parsing_then_errors(#[case] input: &str) {
        assert!(input.parse::<AggregateRequest>().is_err());
    }

    #[test]
    fn given_function_name_in_any_case_when_parsing_then_accepts() {
        assert_eq!("MEAN".parse::<Aggregation>().unwrap(), Aggregation::Mean);
    }
}
