//! Selection properties over generated face lists.

use tokio::time::Instant;

use gaze_models::{BoundingBox, TrackingPriority};
use gaze_tracker::{ConversationContext, DetectedFace, TargetAbsentPolicy, TargetSelector, TrackingConfig};

const NAMES: &[&str] = &["sophia", "eladriel", "marcus", "lena", "unknown"];

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn unit(&mut self) -> f64 {
        (self.next() % 1000) as f64 / 1000.0
    }
}

fn selector(policy: TargetAbsentPolicy) -> TargetSelector {
    TargetSelector::new(&TrackingConfig {
        target_absent_policy: policy,
        ..TrackingConfig::default().with_priority_identities(["sophia", "eladriel"])
    })
}

fn random_faces(rng: &mut Lcg, now: Instant) -> Vec<DetectedFace> {
    let count = 1 + (rng.next() % 5) as usize;
    (0..count)
        .map(|i| {
            let name = NAMES[(rng.next() % NAMES.len() as u64) as usize];
            DetectedFace::new(
                name,
                rng.unit(),
                BoundingBox::from_xywh(i as f64 * 100.0, 50.0, 60.0, 60.0),
                now,
            )
        })
        .collect()
}

#[test]
fn test_selection_is_deterministic() {
    let selector = selector(TargetAbsentPolicy::RankOthers);
    let mut rng = Lcg(7);
    let now = Instant::now();

    for _ in 0..500 {
        let faces = random_faces(&mut rng, now);
        let mut ctx = ConversationContext::default();
        if rng.next() % 2 == 0 {
            ctx.set_mode(true, Some(NAMES[(rng.next() % 4) as usize]));
        }

        let first = selector.select(&faces, &ctx);
        let second = selector.select(&faces, &ctx);
        assert_eq!(first, second);
    }
}

#[test]
fn test_highest_priority_always_wins_without_conversation() {
    let selector = selector(TargetAbsentPolicy::Search);
    let mut rng = Lcg(42);
    let now = Instant::now();
    let ctx = ConversationContext::default();

    for _ in 0..500 {
        let faces = random_faces(&mut rng, now);
        let selection = selector.select(&faces, &ctx).unwrap();
        assert_eq!(
            selection.priority.weight(),
            faces.iter().map(|f| selector.classify(f).weight()).max().unwrap()
        );
        if faces.iter().any(|f| selector.classify(f) == TrackingPriority::Highest) {
            assert_eq!(selection.priority, TrackingPriority::Highest);
        }
    }
}

#[test]
fn test_present_partner_always_wins() {
    let selector = selector(TargetAbsentPolicy::Search);
    let mut rng = Lcg(1234);
    let now = Instant::now();

    for _ in 0..500 {
        let faces = random_faces(&mut rng, now);
        let partner = faces[(rng.next() % faces.len() as u64) as usize].identity.clone();
        if partner == "unknown" {
            continue;
        }
        let mut ctx = ConversationContext::default();
        ctx.set_mode(true, Some(partner.as_str()));

        let selection = selector.select(&faces, &ctx).unwrap();
        assert_eq!(selection.face.identity, partner);
    }
}

#[test]
fn test_example_scenarios() {
    let now = Instant::now();
    let bbox = BoundingBox::from_xywh(0.0, 0.0, 50.0, 50.0);

    let faces = vec![
        DetectedFace::new("sophia", 0.9, bbox, now),
        DetectedFace::new("unknown", 0.95, bbox, now),
    ];
    let selection = selector(TargetAbsentPolicy::Search)
        .select(&faces, &ConversationContext::default())
        .unwrap();
    assert_eq!(selection.face.identity, "sophia");

    let mut ctx = ConversationContext::default();
    ctx.set_mode(true, Some("eladriel"));
    let faces = vec![DetectedFace::new("sophia", 0.99, bbox, now)];
    assert!(selector(TargetAbsentPolicy::Search).select(&faces, &ctx).is_none());
    assert!(selector(TargetAbsentPolicy::RankOthers).select(&faces, &ctx).is_some());
}
