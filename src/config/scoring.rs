use crate::models::{UserRole, VillagePriority};
use std::env;

/// Inputs to base-weight and decay computation. All multipliers live
/// here so tests can exercise edge cases by constructing a config
/// instead of patching globals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightConfig {
    pub role_user: f64,
    pub role_pm: f64,
    pub role_po: f64,
    pub role_researcher: f64,
    pub role_moderator: f64,
    pub role_admin: f64,
    pub village_high: f64,
    pub village_medium: f64,
    pub village_low: f64,
    /// Flat bonus applied once when the voter holds at least one
    /// active panel membership.
    pub panel_boost: f64,
    /// Half-life of a vote's weight, in days.
    pub half_life_days: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            role_user: 1.0,
            role_pm: 2.0,
            role_po: 3.0,
            role_researcher: 1.5,
            role_moderator: 1.0,
            role_admin: 1.0,
            village_high: 1.5,
            village_medium: 1.0,
            village_low: 0.5,
            panel_boost: 0.3,
            half_life_days: 180.0,
        }
    }
}

impl WeightConfig {
    pub fn role_multiplier(&self, role: UserRole) -> f64 {
        match role {
            UserRole::User => self.role_user,
            UserRole::Pm => self.role_pm,
            UserRole::Po => self.role_po,
            UserRole::Researcher => self.role_researcher,
            UserRole::Moderator => self.role_moderator,
            UserRole::Admin => self.role_admin,
        }
    }

    /// Feedback without a village (or with a village the store no
    /// longer knows) counts as medium priority.
    pub fn village_multiplier(&self, priority: Option<VillagePriority>) -> f64 {
        match priority {
            Some(VillagePriority::High) => self.village_high,
            Some(VillagePriority::Medium) | None => self.village_medium,
            Some(VillagePriority::Low) => self.village_low,
        }
    }
}

/// Defaults for the trending query; callers may override per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendingConfig {
    pub max_age_days: f64,
    pub limit: u64,
    pub min_votes: u64,
    /// Floor on the age divisor so items created seconds ago do not
    /// blow up the score.
    pub age_floor_days: f64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            max_age_days: 14.0,
            limit: 10,
            min_votes: 1,
            age_floor_days: 0.1,
        }
    }
}

/// Deviation margins for quota health classification, in percentage
/// points: within `on_track_margin` is on track, within
/// `warning_margin` is a warning, beyond is critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaConfig {
    pub on_track_margin: f64,
    pub warning_margin: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            on_track_margin: 5.0,
            warning_margin: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityConfig {
    /// Minimum dice coefficient for a title to count as a duplicate.
    pub duplicate_threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.86,
        }
    }
}

/// All scoring knobs, bundled for injection into the services.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoringConfig {
    pub weight: WeightConfig,
    pub trending: TrendingConfig,
    pub quota: QuotaConfig,
    pub similarity: SimilarityConfig,
}

impl ScoringConfig {
    /// Defaults with selected knobs overridable from the environment.
    /// Invalid values are logged and ignored rather than failing boot.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.weight.half_life_days = parse_f64_env(
            "VOTE_HALF_LIFE_DAYS",
            cfg.weight.half_life_days,
            |v| v > 0.0,
        );
        cfg.weight.panel_boost =
            parse_f64_env("PANEL_MEMBER_BOOST", cfg.weight.panel_boost, |v| v >= 0.0);
        cfg.similarity.duplicate_threshold = parse_f64_env(
            "DUPLICATE_THRESHOLD",
            cfg.similarity.duplicate_threshold,
            |v| (0.0..=1.0).contains(&v),
        );
        cfg.trending.max_age_days = parse_f64_env(
            "TRENDING_MAX_AGE_DAYS",
            cfg.trending.max_age_days,
            |v| v > 0.0,
        );
        cfg.trending.limit = parse_u64_env("TRENDING_LIMIT", cfg.trending.limit, |v| v > 0);
        cfg.trending.min_votes = parse_u64_env("TRENDING_MIN_VOTES", cfg.trending.min_votes, |_| true);
        cfg
    }
}

fn parse_f64_env(var_name: &str, default: f64, valid: impl Fn(f64) -> bool) -> f64 {
    match env::var(var_name) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if valid(v) => v,
            _ => {
                tracing::warn!("Invalid {} '{}', using {}", var_name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_u64_env(var_name: &str, default: u64, valid: impl Fn(u64) -> bool) -> u64 {
    match env::var(var_name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(v) if valid(v) => v,
            _ => {
                tracing::warn!("Invalid {} '{}', using {}", var_name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
