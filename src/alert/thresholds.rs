//! Risk tier thresholds and de-escalation hysteresis.
//!
//! Escalation applies on a single crossing. De-escalation needs the score to
//! stay below the current tier for `confirmations` consecutive windows; the
//! site then drops to the highest tier seen among those confirming scores.

use chrono::{DateTime, Utc};

use crate::config::AlertConfig;
use crate::model::{AlertState, Tier};

/// Lower bounds of the YELLOW and RED tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub yellow: f64,
    pub red: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { yellow: 0.30, red: 0.70 }
    }
}

impl Thresholds {
    /// GREEN [0, yellow), YELLOW [yellow, red), RED [red, 1].
    pub fn tier_for(&self, probability: f64) -> Tier {
        if probability >= self.red {
            Tier::Red
        } else if probability >= self.yellow {
            Tier::Yellow
        } else {
            Tier::Green
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertClassifier {
    thresholds: Thresholds,
    confirmations: u32,
}

impl AlertClassifier {
    pub fn new(thresholds: Thresholds, confirmations: u32) -> Self {
        Self {
            thresholds,
            confirmations: confirmations.max(1),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(
            Thresholds {
                yellow: config.yellow_threshold,
                red: config.red_threshold,
            },
            config.deescalation_confirmations,
        )
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Produces the next alert state for `site_id` from a new probability.
    ///
    /// `at` is the timestamp of the scored window. With no previous state the
    /// site starts directly in the tier of `probability`.
    pub fn classify(
        &self,
        site_id: &str,
        probability: f64,
        at: DateTime<Utc>,
        previous: Option<&AlertState>,
    ) -> AlertState {
        let target = self.thresholds.tier_for(probability);

        let Some(prev) = previous else {
            return AlertState {
                site_id: site_id.to_string(),
                tier: target,
                since: at,
                last_probability: probability,
                below_threshold_count: 0,
                pending_tier: None,
                updated_at: at,
            };
        };

        let mut next = AlertState {
            last_probability: probability,
            updated_at: at,
            ..prev.clone()
        };

        if target > prev.tier {
            next.tier = target;
            next.since = at;
            next.below_threshold_count = 0;
            next.pending_tier = None;
        } else if target == prev.tier {
            next.below_threshold_count = 0;
            next.pending_tier = None;
        } else {
            let count = prev.below_threshold_count + 1;
            let pending = prev.pending_tier.map_or(target, |p| p.max(target));
            if count >= self.confirmations {
                next.tier = pending;
                next.since = at;
                next.below_threshold_count = 0;
                next.pending_tier = None;
            } else {
                next.below_threshold_count = count;
                next.pending_tier = Some(pending);
            }
        }

        next
    }
}

/// Clears a pending de-escalation, e.g. after the window was reset.
pub fn reset_hysteresis(state: &mut AlertState) {
    state.below_threshold_count = 0;
    state.pending_tier = None;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn classifier() -> AlertClassifier {
        AlertClassifier::new(Thresholds::default(), 2)
    }

    /// Feeds probabilities one per day and returns the tier after each.
    fn run(probabilities: &[f64], start: Option<AlertState>) -> (Vec<Tier>, AlertState) {
        let c = classifier();
        let mut state = start;
        let mut tiers = Vec::new();
        for (i, &p) in probabilities.iter().enumerate() {
            let next = c.classify("SP001", p, day(i as i64 + 1), state.as_ref());
            tiers.push(next.tier);
            state = Some(next);
        }
        (tiers, state.unwrap())
    }

    fn red_state() -> AlertState {
        classifier().classify("SP001", 0.85, day(0), None)
    }

    // --- Thresholds ---------------------------------------------------------

    #[test]
    fn test_tier_boundaries() {
        let t = Thresholds::default();
        assert_eq!(t.tier_for(0.0), Tier::Green);
        assert_eq!(t.tier_for(0.2999), Tier::Green);
        assert_eq!(t.tier_for(0.30), Tier::Yellow);
        assert_eq!(t.tier_for(0.6999), Tier::Yellow);
        assert_eq!(t.tier_for(0.70), Tier::Red);
        assert_eq!(t.tier_for(1.0), Tier::Red);
    }

    // --- Escalation ---------------------------------------------------------

    #[test]
    fn test_first_score_sets_tier_directly() {
        let state = classifier().classify("SP001", 0.5, day(0), None);
        assert_eq!(state.tier, Tier::Yellow);
        assert_eq!(state.since, day(0));
        assert_eq!(state.below_threshold_count, 0);
    }

    #[test]
    fn test_escalation_is_immediate() {
        let green = classifier().classify("SP001", 0.1, day(0), None);
        let next = classifier().classify("SP001", 0.72, day(1), Some(&green));
        assert_eq!(next.tier, Tier::Red, "a single crossing must escalate");
        assert_eq!(next.since, day(1));
    }

    #[test]
    fn test_rising_probabilities_follow_thresholds() {
        let (tiers, _) = run(&[0.10, 0.15, 0.20, 0.35, 0.50, 0.72, 0.80], None);
        use Tier::*;
        assert_eq!(tiers, vec![Green, Green, Green, Yellow, Yellow, Red, Red]);
    }

    // --- De-escalation ------------------------------------------------------

    #[test]
    fn test_single_low_score_does_not_deescalate() {
        let (tiers, state) = run(&[0.20], Some(red_state()));
        assert_eq!(tiers, vec![Tier::Red]);
        assert_eq!(state.below_threshold_count, 1);
        assert_eq!(state.pending_tier, Some(Tier::Green));
        assert_eq!(state.since, day(0), "tier start time is unchanged while pending");
    }

    #[test]
    fn test_second_consecutive_low_score_deescalates() {
        let (tiers, state) = run(&[0.25, 0.28, 0.15], Some(red_state()));
        assert_eq!(tiers, vec![Tier::Red, Tier::Green, Tier::Green]);
        assert_eq!(state.below_threshold_count, 0);
        assert_eq!(state.since, day(2), "drop takes effect on the confirming score");
    }

    #[test]
    fn test_deescalation_lands_on_highest_confirming_tier() {
        let (tiers, _) = run(&[0.50, 0.10], Some(red_state()));
        assert_eq!(tiers, vec![Tier::Red, Tier::Yellow]);
    }

    #[test]
    fn test_score_back_in_tier_resets_the_count() {
        let (tiers, state) = run(&[0.20, 0.75, 0.20], Some(red_state()));
        assert_eq!(tiers, vec![Tier::Red, Tier::Red, Tier::Red]);
        assert_eq!(state.below_threshold_count, 1, "count restarted after the in-tier score");
    }

    #[test]
    fn test_yellow_to_green_needs_confirmation() {
        let yellow = classifier().classify("SP001", 0.4, day(0), None);
        let (tiers, _) = run(&[0.1, 0.1], Some(yellow));
        assert_eq!(tiers, vec![Tier::Yellow, Tier::Green]);
    }

    #[test]
    fn test_escalation_during_pending_drop_clears_hysteresis() {
        let yellow = classifier().classify("SP001", 0.4, day(0), None);
        let (tiers, state) = run(&[0.1, 0.9], Some(yellow));
        assert_eq!(tiers, vec![Tier::Yellow, Tier::Red]);
        assert_eq!(state.below_threshold_count, 0);
        assert_eq!(state.pending_tier, None);
    }

    #[test]
    fn test_single_confirmation_policy_drops_immediately() {
        let c = AlertClassifier::new(Thresholds::default(), 1);
        let red = c.classify("SP001", 0.9, day(0), None);
        let next = c.classify("SP001", 0.1, day(1), Some(&red));
        assert_eq!(next.tier, Tier::Green);
    }

    #[test]
    fn test_reset_hysteresis_clears_pending_drop() {
        let (_, mut state) = run(&[0.2], Some(red_state()));
        reset_hysteresis(&mut state);
        assert_eq!(state.below_threshold_count, 0);
        assert_eq!(state.pending_tier, None);
        assert_eq!(state.tier, Tier::Red, "reset never changes the tier itself");
    }
}
