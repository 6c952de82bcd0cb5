use crate::{entity::EntityKind, error::LocusError};

/// Default search radius around the reference point, in kilometres.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;
/// Default cap on candidates taken from the text index.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 50;

/// Parameters of a street resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveConfig {
    /// Great-circle radius of the candidate filter.
    pub radius_km: f64,
    /// Maximum number of candidates passed to distance ranking.
    pub candidate_limit: usize,
    /// Add typo-tolerant term matching to the candidate query.
    pub fuzzy_search: bool,
    /// Entity kind the candidate query is restricted to.
    pub street_kind: EntityKind,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            fuzzy_search: false,
            street_kind: EntityKind::Street,
        }
    }
}

impl ResolveConfig {
    /// Reject a non-positive or non-finite radius and a zero candidate limit.
    pub fn validate(&self) -> Result<(), LocusError> {
        let radius = self.radius_km;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(LocusError::ConfigError(format!(
                "radius_km must be a positive number of kilometres, got {radius}"
            )));
        }
        if self.candidate_limit == 0 {
            return Err(LocusError::ConfigError(
                "candidate_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for resolution configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct ResolveConfigBuilder {
    config: ResolveConfig,
}

impl ResolveConfigBuilder {
    /// Create a new builder with the default radius and candidate limit
    pub fn new() -> Self {
        Self {
            config: ResolveConfig::default(),
        }
    }

    /// Exact name matching only
    pub fn strict() -> Self {
        let mut builder = Self::new();
        builder.config.fuzzy_search = false;
        builder
    }

    /// Tolerate single-character typos in the street name
    pub fn typo_tolerant() -> Self {
        let mut builder = Self::new();
        builder.config.fuzzy_search = true;
        builder
    }

    /// Set the candidate search radius in kilometres
    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.config.radius_km = radius_km;
        self
    }

    /// Set the maximum number of candidates to rank
    pub fn candidate_limit(mut self, limit: usize) -> Self {
        self.config.candidate_limit = limit;
        self
    }

    pub fn fuzzy_search(mut self, enabled: bool) -> Self {
        self.config.fuzzy_search = enabled;
        self
    }

    /// Resolve against another entity kind, e.g. neighborhoods
    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.config.street_kind = kind;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResolveConfig {
        self.config
    }

    /// Build the configuration, rejecting values that can never match anything
    pub fn try_build(self) -> Result<ResolveConfig, LocusError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolveConfigBuilder::new().build();
        assert_eq!(config, ResolveConfig::default());
        assert_eq!(config.radius_km, 10.0);
        assert_eq!(config.candidate_limit, 50);
        assert!(!config.fuzzy_search);
        assert_eq!(config.street_kind, EntityKind::Street);
    }

    #[test]
    fn test_presets() {
        assert!(!ResolveConfigBuilder::strict().build().fuzzy_search);
        assert!(ResolveConfigBuilder::typo_tolerant().build().fuzzy_search);
    }

    #[test]
    fn test_override_presets() {
        let config = ResolveConfigBuilder::typo_tolerant()
            .radius_km(2.5)
            .candidate_limit(10)
            .kind(EntityKind::Neighborhood)
            .build();

        assert_eq!(config.radius_km, 2.5);
        assert_eq!(config.candidate_limit, 10);
        assert_eq!(config.street_kind, EntityKind::Neighborhood);
        assert!(config.fuzzy_search); // Should keep the preset value
    }

    #[test]
    fn test_try_build_rejects_unusable_values() {
        assert!(ResolveConfigBuilder::new().try_build().is_ok());
        for radius in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ResolveConfigBuilder::new().radius_km(radius).try_build(),
                Err(LocusError::ConfigError(_))
            ));
        }
        assert!(matches!(
            ResolveConfigBuilder::new().candidate_limit(0).try_build(),
            Err(LocusError::ConfigError(_))
        ));
    }
}
