//! Rule-based intervention decision.
//!
//! Four risk signals are evaluated independently, each worth one point. An
//! intervention needs at least [`INTERVENTION_THRESHOLD`] points, so a single
//! noisy metric never triggers one on its own. Every comparison is strict:
//! a metric sitting exactly on its threshold scores nothing.

use serde::Serialize;

use crate::session_metrics::SessionMetrics;

pub const LONG_SESSION_MIN: f64 = 20.0;
pub const RAPID_SWITCH_FREQUENCY: f64 = 1.5;
pub const NEGATIVE_EMOTION_SCORE: f64 = -0.2;
pub const SHORT_VIDEO_RATIO: f64 = 0.9;

/// Minimum number of fired signals for an intervention.
pub const INTERVENTION_THRESHOLD: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    LongSession,
    RapidSwitching,
    NegativeContent,
    ShortVideoBinge,
}

impl RiskSignal {
    pub const ALL: [RiskSignal; 4] = [
        RiskSignal::LongSession,
        RiskSignal::RapidSwitching,
        RiskSignal::NegativeContent,
        RiskSignal::ShortVideoBinge,
    ];

    pub fn fires(self, metrics: &SessionMetrics) -> bool {
        match self {
            RiskSignal::LongSession => metrics.session_duration_min > LONG_SESSION_MIN,
            RiskSignal::RapidSwitching => metrics.switch_frequency > RAPID_SWITCH_FREQUENCY,
            RiskSignal::NegativeContent => metrics.content_emotion_score < NEGATIVE_EMOTION_SCORE,
            RiskSignal::ShortVideoBinge => metrics.short_video_ratio > SHORT_VIDEO_RATIO,
        }
    }
}

/// Breakdown of a decision, used for logs and the offline `score` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub signals: Vec<RiskSignal>,
    pub intervene: bool,
}

pub struct InterventionPolicy;

impl InterventionPolicy {
    pub fn assess(metrics: &SessionMetrics) -> RiskAssessment {
        let signals: Vec<RiskSignal> = RiskSignal::ALL
            .into_iter()
            .filter(|signal| signal.fires(metrics))
            .collect();
        let score = signals.len() as u8;

        RiskAssessment {
            score,
            signals,
            intervene: score >= INTERVENTION_THRESHOLD,
        }
    }

    pub fn decide(metrics: &SessionMetrics) -> bool {
        Self::assess(metrics).intervene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_metrics::fixtures::calm_session;

    fn with_signals(long: bool, switching: bool, negative: bool, binge: bool) -> SessionMetrics {
        let mut metrics = calm_session();
        if long {
            metrics.session_duration_min = 25.0;
        }
        if switching {
            metrics.switch_frequency = 2.0;
        }
        if negative {
            metrics.content_emotion_score = -0.3;
        }
        if binge {
            metrics.short_video_ratio = 0.95;
        }
        metrics
    }

    #[test]
    fn every_signal_combination_follows_two_of_four() {
        for mask in 0u8..16 {
            let flags = [mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0];
            let metrics = with_signals(flags[0], flags[1], flags[2], flags[3]);
            let expected_score = flags.iter().filter(|f| **f).count() as u8;

            let assessment = InterventionPolicy::assess(&metrics);
            assert_eq!(assessment.score, expected_score, "mask {mask:04b}");
            assert_eq!(
                InterventionPolicy::decide(&metrics),
                expected_score >= 2,
                "mask {mask:04b}"
            );
        }
    }

    #[test]
    fn threshold_values_do_not_score() {
        let mut metrics = calm_session();
        metrics.session_duration_min = 20.0;
        metrics.switch_frequency = 1.5;
        metrics.content_emotion_score = -0.2;
        metrics.short_video_ratio = 0.9;

        let assessment = InterventionPolicy::assess(&metrics);
        assert_eq!(assessment.score, 0);
        assert!(!assessment.intervene);
    }

    #[test]
    fn each_boundary_alone_scores_zero() {
        let cases: [fn(&mut SessionMetrics); 4] = [
            |m| m.session_duration_min = LONG_SESSION_MIN,
            |m| m.switch_frequency = RAPID_SWITCH_FREQUENCY,
            |m| m.content_emotion_score = NEGATIVE_EMOTION_SCORE,
            |m| m.short_video_ratio = SHORT_VIDEO_RATIO,
        ];
        for set_boundary in cases {
            // One real signal plus one boundary value must stay below threshold.
            let mut metrics = with_signals(false, false, false, false);
            set_boundary(&mut metrics);
            if metrics.session_duration_min == LONG_SESSION_MIN {
                metrics.switch_frequency = 2.0;
            } else {
                metrics.session_duration_min = 30.0;
            }
            assert_eq!(InterventionPolicy::assess(&metrics).score, 1);
            assert!(!InterventionPolicy::decide(&metrics));
        }
    }

    #[test]
    fn single_signal_never_intervenes() {
        let metrics = with_signals(true, false, false, false);
        let assessment = InterventionPolicy::assess(&metrics);
        assert_eq!(assessment.signals, vec![RiskSignal::LongSession]);
        assert!(!assessment.intervene);
    }

    #[test]
    fn scenario_a_scores_four() {
        let metrics = with_signals(true, true, true, true);
        let assessment = InterventionPolicy::assess(&metrics);
        assert_eq!(assessment.score, 4);
        assert_eq!(assessment.signals, RiskSignal::ALL.to_vec());
        assert!(assessment.intervene);
    }

    #[test]
    fn decision_ignores_personal_fields() {
        let mut metrics = with_signals(true, true, false, false);
        metrics.self_reported_goal.clear();
        metrics.ai_tone_description = "anything".to_string();
        assert!(InterventionPolicy::decide(&metrics));
    }
}
