//! Target selection.
//!
//! Selection looks only at identity, priority and confidence. Face size and
//! position never influence which face is tracked.

use std::collections::HashSet;

use gaze_models::TrackingPriority;

use crate::config::{TargetAbsentPolicy, TrackingConfig};
use crate::context::ConversationContext;
use crate::face::DetectedFace;

/// The face chosen for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub face: DetectedFace,
    pub priority: TrackingPriority,
}

/// Picks which face the gimbal follows.
#[derive(Debug, Clone)]
pub struct TargetSelector {
    priority_identities: HashSet<String>,
    min_recognition_confidence: f64,
    conversation_boost: f64,
    absent_policy: TargetAbsentPolicy,
}

impl TargetSelector {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            priority_identities: config.normalized_priority_identities().into_iter().collect(),
            min_recognition_confidence: config.min_recognition_confidence,
            conversation_boost: config.conversation_confidence_boost,
            absent_policy: config.target_absent_policy,
        }
    }

    /// Priority class of a face.
    pub fn classify(&self, face: &DetectedFace) -> TrackingPriority {
        if self.priority_identities.contains(&face.identity) {
            TrackingPriority::Highest
        } else if face.is_recognized() && face.confidence >= self.min_recognition_confidence {
            TrackingPriority::High
        } else {
            TrackingPriority::Medium
        }
    }

    /// Select the face to follow, if any.
    pub fn select(&self, faces: &[DetectedFace], context: &ConversationContext) -> Option<Selection> {
        if faces.is_empty() {
            return None;
        }

        // The conversation partner always wins while present
        if let Some(target) = context.active_target() {
            if let Some(face) = faces.iter().find(|f| f.identity == target) {
                return Some(Selection {
                    face: face.clone(),
                    priority: self.classify(face),
                });
            }
            if self.absent_policy == TargetAbsentPolicy::Search {
                return None;
            }
        }

        // Highest (weight, confidence) wins; max_by keeps the last maximum,
        // so iterate in reverse for a lowest-index tie-break.
        faces
            .iter()
            .enumerate()
            .rev()
            .map(|(index, face)| {
                let priority = self.classify(face);
                let score = self.ranking_confidence(face, context);
                (index, face, priority, score)
            })
            .max_by(|a, b| {
                a.2.weight()
                    .cmp(&b.2.weight())
                    .then(a.3.total_cmp(&b.3))
            })
            .map(|(_, face, priority, _)| Selection {
                face: face.clone(),
                priority,
            })
    }

    /// Confidence used for ranking. During a conversation, known partners
    /// get a bounded boost; the face's own confidence is left untouched.
    fn ranking_confidence(&self, face: &DetectedFace, context: &ConversationContext) -> f64 {
        if context.active && self.priority_identities.contains(&face.identity) {
            (face.confidence + self.conversation_boost).min(1.0)
        } else {
            face.confidence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaze_models::BoundingBox;
    use tokio::time::Instant;

    fn face(identity: &str, confidence: f64, x: f64) -> DetectedFace {
        DetectedFace::new(
            identity,
            confidence,
            BoundingBox::from_xywh(x, 100.0, 50.0, 50.0),
            Instant::now(),
        )
    }

    fn selector(policy: TargetAbsentPolicy) -> TargetSelector {
        let config = TrackingConfig {
            target_absent_policy: policy,
            ..TrackingConfig::default().with_priority_identities(["sophia", "eladriel"])
        };
        TargetSelector::new(&config)
    }

    #[test]
    fn test_classify() {
        let s = selector(TargetAbsentPolicy::Search);
        assert_eq!(s.classify(&face("Sophia", 0.1, 0.0)), TrackingPriority::Highest);
        assert_eq!(s.classify(&face("marcus", 0.8, 0.0)), TrackingPriority::High);
        assert_eq!(s.classify(&face("marcus", 0.4, 0.0)), TrackingPriority::Medium);
        assert_eq!(s.classify(&face("unknown", 0.99, 0.0)), TrackingPriority::Medium);
    }

    #[test]
    fn test_priority_beats_confidence() {
        let s = selector(TargetAbsentPolicy::Search);
        let faces = vec![face("unknown", 0.95, 0.0), face("sophia", 0.9, 200.0)];

        let selection = s.select(&faces, &ConversationContext::default()).unwrap();
        assert_eq!(selection.face.identity, "sophia");
        assert_eq!(selection.priority, TrackingPriority::Highest);
    }

    #[test]
    fn test_confidence_breaks_priority_ties() {
        let s = selector(TargetAbsentPolicy::Search);
        let faces = vec![face("marcus", 0.7, 0.0), face("lena", 0.9, 200.0)];

        let selection = s.select(&faces, &ConversationContext::default()).unwrap();
        assert_eq!(selection.face.identity, "lena");
    }

    #[test]
    fn test_lowest_index_breaks_full_ties() {
        let s = selector(TargetAbsentPolicy::Search);
        let faces = vec![
            face("unknown", 0.5, 0.0),
            face("unknown", 0.5, 200.0),
            face("unknown", 0.5, 400.0),
        ];

        for _ in 0..10 {
            let selection = s.select(&faces, &ConversationContext::default()).unwrap();
            assert_eq!(selection.face.bounding_box.left, 0.0);
        }
    }

    #[test]
    fn test_conversation_partner_wins() {
        let s = selector(TargetAbsentPolicy::Search);
        let mut ctx = ConversationContext::default();
        ctx.set_mode(true, Some("marcus"));
        let faces = vec![face("sophia", 0.99, 0.0), face("marcus", 0.3, 200.0)];

        let selection = s.select(&faces, &ctx).unwrap();
        assert_eq!(selection.face.identity, "marcus");
        assert_eq!(selection.priority, TrackingPriority::Medium);
    }

    #[test]
    fn test_absent_partner_with_search_policy() {
        let s = selector(TargetAbsentPolicy::Search);
        let mut ctx = ConversationContext::default();
        ctx.set_mode(true, Some("eladriel"));

        assert!(s.select(&[face("sophia", 0.99, 0.0)], &ctx).is_none());
    }

    #[test]
    fn test_absent_partner_with_rank_others_policy() {
        let s = selector(TargetAbsentPolicy::RankOthers);
        let mut ctx = ConversationContext::default();
        ctx.set_mode(true, Some("eladriel"));

        let selection = s.select(&[face("sophia", 0.99, 0.0)], &ctx).unwrap();
        assert_eq!(selection.face.identity, "sophia");
    }

    #[test]
    fn test_conversation_boost_ranks_partners_without_changing_confidence() {
        let s = selector(TargetAbsentPolicy::RankOthers);
        let mut ctx = ConversationContext::default();
        ctx.set_mode(true, None);
        let faces = vec![face("eladriel", 0.85, 0.0), face("sophia", 0.7, 200.0)];

        let selection = s.select(&faces, &ctx).unwrap();
        assert_eq!(selection.face.identity, "eladriel");
        assert_eq!(selection.face.confidence, 0.85);
    }

    #[test]
    fn test_empty_list() {
        let s = selector(TargetAbsentPolicy::RankOthers);
        assert!(s.select(&[], &ConversationContext::new(true)).is_none());
    }
}
