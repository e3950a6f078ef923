//! Threshold step lookups shared by the timing and allocation tables.

/// Which side of a threshold fires a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// Steps ordered by descending threshold; first `x > threshold` wins.
    Above,
    /// Steps ordered by ascending threshold; first `x < threshold` wins.
    Below,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepTable {
    pub direction: StepDirection,
    pub steps: Vec<(f64, f64)>,
    pub otherwise: f64,
}

impl StepTable {
    pub fn above(steps: &[(f64, f64)], otherwise: f64) -> Self {
        Self {
            direction: StepDirection::Above,
            steps: steps.to_vec(),
            otherwise,
        }
    }

    pub fn below(steps: &[(f64, f64)], otherwise: f64) -> Self {
        Self {
            direction: StepDirection::Below,
            steps: steps.to_vec(),
            otherwise,
        }
    }

    pub fn lookup(&self, x: f64) -> f64 {
        let hit = self.steps.iter().find(|(threshold, _)| match self.direction {
            StepDirection::Above => x > *threshold,
            StepDirection::Below => x < *threshold,
        });
        hit.map(|(_, value)| *value).unwrap_or(self.otherwise)
    }

    /// Thresholds must be strictly monotone in the direction of evaluation.
    pub fn is_ordered(&self) -> bool {
        self.steps.windows(2).all(|pair| match self.direction {
            StepDirection::Above => pair[0].0 > pair[1].0,
            StepDirection::Below => pair[0].0 < pair[1].0,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.steps
            .iter()
            .map(|(_, v)| *v)
            .chain(std::iter::once(self.otherwise))
    }

    /// Parse `threshold:value` pairs separated by commas, e.g. `5:100, 3:75`.
    pub fn parse_steps(input: &str) -> Result<Vec<(f64, f64)>, String> {
        let mut steps = Vec::new();
        for token in input.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (threshold, value) = token
                .split_once(':')
                .ok_or_else(|| format!("expected threshold:value, got '{token}'"))?;
            let threshold: f64 = threshold
                .trim()
                .parse()
                .map_err(|_| format!("invalid threshold '{}'", threshold.trim()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| format!("invalid value '{}'", value.trim()))?;
            steps.push((threshold, value));
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn premium_table() -> StepTable {
        StepTable::above(&[(5.0, 100.0), (3.0, 75.0), (1.0, 25.0)], -100.0)
    }

    #[test]
    fn above_uses_first_strictly_exceeded_threshold() {
        let table = premium_table();
        assert_eq!(table.lookup(6.0), 100.0);
        assert_eq!(table.lookup(5.0), 75.0);
        assert_eq!(table.lookup(1.5), 25.0);
        assert_eq!(table.lookup(1.0), -100.0);
    }

    #[test]
    fn below_uses_first_strictly_undercut_threshold() {
        let table = StepTable::below(&[(150.0, 100.0), (250.0, 50.0)], -100.0);
        assert_eq!(table.lookup(100.0), 100.0);
        assert_eq!(table.lookup(150.0), 50.0);
        assert_eq!(table.lookup(250.0), -100.0);
    }

    #[test]
    fn empty_table_always_returns_otherwise() {
        let table = StepTable::above(&[], 7.0);
        assert_eq!(table.lookup(1e9), 7.0);
        assert!(table.is_ordered());
    }

    #[test]
    fn ordering_check_respects_direction() {
        assert!(premium_table().is_ordered());
        let reversed = StepTable::above(&[(1.0, 25.0), (5.0, 100.0)], 0.0);
        assert!(!reversed.is_ordered());
        let below = StepTable::below(&[(6.0, 100.0), (9.0, 50.0)], 0.0);
        assert!(below.is_ordered());
    }

    #[test]
    fn parse_steps_accepts_negative_values() {
        let steps = StepTable::parse_steps("5:100, -1:0, -3 : -25").unwrap();
        assert_eq!(steps, vec![(5.0, 100.0), (-1.0, 0.0), (-3.0, -25.0)]);
    }

    #[test]
    fn parse_steps_rejects_malformed_pairs() {
        assert!(StepTable::parse_steps("5=100").is_err());
        assert!(StepTable::parse_steps("five:100").is_err());
        assert!(StepTable::parse_steps("5:lots").is_err());
    }

    #[test]
    fn values_include_otherwise() {
        let values: Vec<f64> = premium_table().values().collect();
        assert_eq!(values, vec![100.0, 75.0, 25.0, -100.0]);
    }
}
