//! Constraint matching.
//!
//! Checks a machine's hardware against a service's constraint set, one
//! dimension at a time:
//! - **Numeric** dimensions (`cpu_cores`, `mem`, ...): machine value must be
//!   at least the required value
//! - **Everything else**: values must be equal
//! - **Wildcard** `*` on either side matches
//!
//! Every failing dimension is reported, not just the first.

use std::fmt;

use cloudplace_core::{ConstraintValue, Constraints, Machine, NUMERIC_DIMENSIONS};

/// One dimension a machine failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub dimension: String,
    pub required: ConstraintValue,
    /// `None` when the machine does not report the dimension at all.
    pub actual: Option<ConstraintValue>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) if is_numeric(&self.dimension) => write!(
                f,
                "{}: needs at least {}, machine has {}",
                self.dimension, self.required, actual
            ),
            Some(actual) => write!(
                f,
                "{}: needs {}, machine has {}",
                self.dimension, self.required, actual
            ),
            None => write!(
                f,
                "{}: needs {}, machine does not report it",
                self.dimension, self.required
            ),
        }
    }
}

/// Outcome of matching one machine against one constraint set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub failures: Vec<Mismatch>,
}

impl MatchReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable failure reasons, one per dimension.
    pub fn reasons(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

fn is_numeric(dimension: &str) -> bool {
    NUMERIC_DIMENSIONS.contains(&dimension)
}

/// Compare a single dimension.
fn dimension_ok(dimension: &str, actual: &ConstraintValue, required: &ConstraintValue) -> bool {
    if required.is_wildcard() || actual.is_wildcard() {
        return true;
    }

    if is_numeric(dimension) {
        if let (Some(have), Some(need)) = (actual.quantity(), required.quantity()) {
            return have >= need;
        }
    }

    actual.to_string() == required.to_string()
}

/// Match `machine` against `constraints`. An empty set always matches.
pub fn satisfies(machine: &Machine, constraints: &Constraints) -> MatchReport {
    let mut report = MatchReport::default();

    for (dimension, required) in constraints {
        let ok = match machine.constraints.get(dimension) {
            Some(actual) => dimension_ok(dimension, actual, required),
            // Placeholders have no hardware data; they match what they
            // don't contradict.
            None => required.is_wildcard() || machine.is_placeholder(),
        };

        if !ok {
            report.failures.push(Mismatch {
                dimension: dimension.clone(),
                required: required.clone(),
                actual: machine.constraints.get(dimension).cloned(),
            });
        }
    }

    report
}

/// Shorthand for `satisfies(..).is_ok()`.
pub fn is_satisfied(machine: &Machine, constraints: &Constraints) -> bool {
    satisfies(machine, constraints).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(pairs: &[(&str, ConstraintValue)]) -> Constraints {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn node() -> Machine {
        Machine::new("m1", "node-1")
            .with_constraint("arch", "amd64")
            .with_constraint("cpu_cores", 4u64)
            .with_constraint("mem", 8192u64)
            .with_constraint("storage", "100G")
    }

    #[test]
    fn empty_constraints_always_match() {
        assert!(is_satisfied(&node(), &Constraints::new()));
        assert!(is_satisfied(&Machine::new("bare", "bare"), &Constraints::new()));
    }

    #[test]
    fn numeric_dimensions_need_at_least() {
        let m = node();
        assert!(is_satisfied(&m, &constraints(&[("mem", 8192u64.into())])));
        assert!(is_satisfied(&m, &constraints(&[("mem", "4G".into())])));
        assert!(!is_satisfied(&m, &constraints(&[("mem", "16G".into())])));
        assert!(is_satisfied(&m, &constraints(&[("cpu_cores", 2u64.into())])));
        assert!(is_satisfied(&m, &constraints(&[("storage", "20G".into())])));
    }

    #[test]
    fn text_dimensions_need_equality() {
        let m = node();
        assert!(is_satisfied(&m, &constraints(&[("arch", "amd64".into())])));
        assert!(!is_satisfied(&m, &constraints(&[("arch", "arm64".into())])));
    }

    #[test]
    fn wildcard_matches_on_either_side() {
        let m = node().with_constraint("arch", "*");
        assert!(is_satisfied(&m, &constraints(&[("arch", "arm64".into())])));
        assert!(is_satisfied(&node(), &constraints(&[("arch", "*".into())])));
        assert!(is_satisfied(&node(), &constraints(&[("zone", "*".into())])));
    }

    #[test]
    fn reports_every_failing_dimension() {
        let report = satisfies(
            &node(),
            &constraints(&[
                ("arch", "arm64".into()),
                ("cpu_cores", 16u64.into()),
                ("mem", 1024u64.into()),
                ("zone", "rack-2".into()),
            ]),
        );

        assert!(!report.is_ok());
        let dims: Vec<&str> = report.failures.iter().map(|f| f.dimension.as_str()).collect();
        assert_eq!(dims, vec!["arch", "cpu_cores", "zone"]);

        let reasons = report.reasons();
        assert_eq!(reasons[0], "arch: needs arm64, machine has amd64");
        assert_eq!(reasons[1], "cpu_cores: needs at least 16, machine has 4");
        assert_eq!(reasons[2], "zone: needs rack-2, machine does not report it");
    }

    #[test]
    fn placeholder_matches_unknown_dimensions() {
        let mut snapshot = Constraints::new();
        snapshot.insert("cpu_cores".to_string(), 8u64.into());
        let m = Machine::placeholder("iid", "iid", snapshot);

        assert!(is_satisfied(&m, &constraints(&[("arch", "arm64".into())])));
        assert!(is_satisfied(&m, &constraints(&[("cpu_cores", 4u64.into())])));
        assert!(!is_satisfied(&m, &constraints(&[("cpu_cores", 16u64.into())])));
    }

    #[test]
    fn unparseable_numbers_fall_back_to_text() {
        let m = Machine::new("m", "m").with_constraint("mem", "lots");
        assert!(is_satisfied(&m, &constraints(&[("mem", "lots".into())])));
        assert!(!is_satisfied(&m, &constraints(&[("mem", 1024u64.into())])));
    }
}
