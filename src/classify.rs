use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Unknown,
    Nominal,
    Warning,
    Critical,
}

/// Zero and NaN count as missing and map to [`Tier::Unknown`], same as an
/// absent value.
pub fn classify(percent: Option<f64>) -> Tier {
    match percent {
        Some(p) if is_present(p) => {
            if p > 80.0 {
                Tier::Critical
            } else if p > 60.0 {
                Tier::Warning
            } else {
                Tier::Nominal
            }
        }
        _ => Tier::Unknown,
    }
}

pub fn is_present(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(classify(Some(80.01)), Tier::Critical);
        assert_eq!(classify(Some(80.0)), Tier::Warning);
        assert_eq!(classify(Some(60.5)), Tier::Warning);
        assert_eq!(classify(Some(60.0)), Tier::Nominal);
        assert_eq!(classify(Some(0.1)), Tier::Nominal);
        assert_eq!(classify(Some(250.0)), Tier::Critical);
    }

    #[test]
    fn zero_and_absent_are_unknown() {
        assert_eq!(classify(None), Tier::Unknown);
        assert_eq!(classify(Some(0.0)), Tier::Unknown);
        assert_eq!(classify(Some(-0.0)), Tier::Unknown);
        assert_eq!(classify(Some(f64::NAN)), Tier::Unknown);
    }

    #[test]
    fn negative_values_are_nominal() {
        assert_eq!(classify(Some(-5.0)), Tier::Nominal);
    }
}
