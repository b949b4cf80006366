/// Probability above which a prediction is labelled high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.65;

/// Probability above which a prediction is labelled medium risk.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.35;

/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TypesError {
    /// The value was NaN or infinite
    #[error("probability must be a finite number")]
    NotFinite,
    /// The value fell outside the closed unit interval
    #[error("probability {0} is outside [0, 1]")]
    OutOfRange(f64),
    /// The text did not name a known risk bucket
    #[error("unknown risk label: {0}")]
    UnknownRiskLabel(String),
}

/// A readmission probability that is guaranteed to lie within `[0, 1]`.
///
/// Construction rejects NaN, infinities and anything outside the unit interval, so
/// downstream code (KPI averaging, sorting, formatting) never needs to re-check.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Probability(f64);

impl Probability {
    /// Creates a new `Probability` from the given value.
    ///
    /// # Arguments
    ///
    /// * `value` - The raw probability.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Probability)` when `value` is finite and within `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::NotFinite`] or [`TypesError::OutOfRange`] otherwise.
    pub fn new(value: f64) -> Result<Self, TypesError> {
        if !value.is_finite() {
            return Err(TypesError::NotFinite);
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(TypesError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Creates a `Probability`, clamping finite values into `[0, 1]`.
    ///
    /// NaN maps to zero.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Returns the inner value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Derives the risk bucket for this probability.
    pub fn risk_label(self) -> RiskLabel {
        RiskLabel::from_probability(self)
    }
}

impl std::fmt::Display for Probability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Probability {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Probability {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Probability::new(value).map_err(serde::de::Error::custom)
    }
}

/// Categorical risk bucket shown alongside a readmission probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "Low risk")]
    Low,
    #[serde(rename = "Medium risk")]
    Medium,
    #[serde(rename = "High risk")]
    High,
}

impl RiskLabel {
    /// Buckets a probability using the fixed thresholds.
    ///
    /// High when `p > 0.65`, Medium when `0.35 < p <= 0.65`, Low otherwise. Both
    /// boundaries belong to the lower bucket.
    pub fn from_probability(probability: Probability) -> Self {
        let p = probability.value();
        if p > HIGH_RISK_THRESHOLD {
            RiskLabel::High
        } else if p > MEDIUM_RISK_THRESHOLD {
            RiskLabel::Medium
        } else {
            RiskLabel::Low
        }
    }

    /// The display text, e.g. `"High risk"`.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLabel::Low => "Low risk",
            RiskLabel::Medium => "Medium risk",
            RiskLabel::High => "High risk",
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLabel {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Low risk" => Ok(RiskLabel::Low),
            "Medium risk" => Ok(RiskLabel::Medium),
            "High risk" => Ok(RiskLabel::High),
            other => Err(TypesError::UnknownRiskLabel(other.to_string())),
        }
    }
}
