//! Bounded scores for ranking candidate accounts and posts.
//!
//! Raw signals (counts, ages) are unbounded and not comparable across
//! families. Each is mapped through a parameterized logistic curve onto
//! `[0, max_score]` and the results are summed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: i64 = 86_400;

/// Standard logistic function `e^x / (e^x + 1)`.
///
/// Evaluated so that large `|x|` saturates to 0 or 1 instead of NaN.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (e + 1.0)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parameters of a scaled sigmoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidCurve {
    /// Upper bound of the score.
    pub max_score: f64,
    /// Width of the transition from 0 to `max_score`.
    pub stretch: f64,
    /// Shift of the transition point; the midpoint sits at `x = -center`.
    pub center: f64,
}

impl SigmoidCurve {
    pub const fn new(max_score: f64, stretch: f64, center: f64) -> Self {
        Self {
            max_score,
            stretch,
            center,
        }
    }

    pub fn score(&self, x: f64) -> f64 {
        scaled_sigmoid(x, self.max_score, self.stretch, self.center)
    }

    /// Finite parameters and a non-negative ceiling. Anything else can
    /// produce NaN scores.
    pub fn is_valid(&self) -> bool {
        self.max_score.is_finite()
            && self.max_score >= 0.0
            && self.stretch.is_finite()
            && self.center.is_finite()
    }
}

impl Default for SigmoidCurve {
    fn default() -> Self {
        Self::new(20.0, 10.0, 0.0)
    }
}

/// Map `x` onto `[0, max_score]`, rounded to two decimals.
///
/// `x` is shifted by `center` and divided by `stretch / 5` before the
/// logistic. Negate "smaller is better" signals before calling. A stretch that
/// is not a positive finite number collapses the curve into a step at
/// `-center`.
pub fn scaled_sigmoid(x: f64, max_score: f64, stretch: f64, center: f64) -> f64 {
    let shifted = x + center;
    let unit = if stretch.is_finite() && stretch > 0.0 {
        sigmoid(shifted / (stretch / 5.0))
    } else if shifted > 0.0 {
        1.0
    } else if shifted < 0.0 {
        0.0
    } else {
        0.5
    };
    round2(unit * max_score)
}

/// Reward accounts that follow more accounts than follow them.
///
/// `10 * ln(friends / followers)` floored at 0. Zero friends scores 0; zero
/// followers scores as if there were one.
pub fn followed_to_following_ratio(friends_count: u64, followers_count: u64) -> f64 {
    if friends_count == 0 {
        return 0.0;
    }
    let ratio = friends_count as f64 / followers_count.max(1) as f64;
    let score = round2(ratio.ln() * 10.0);
    if score.is_finite() {
        score.max(0.0)
    } else {
        0.0
    }
}

/// Whole days between `created_at` and `now`, rounded down.
pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_seconds().div_euclid(SECS_PER_DAY)
}

/// Decaying recency score: close to `max_score` for fresh items, falling
/// towards 0 once the age passes `center` days.
pub fn created_at_score(created_at: DateTime<Utc>, now: DateTime<Utc>, curve: &SigmoidCurve) -> f64 {
    curve.score(-(age_in_days(created_at, now) as f64))
}

/// Engagement signals of a post.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostSignals {
    pub favorite_count: u64,
    pub repost_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Audience signals of an account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserSignals {
    pub friends_count: u64,
    pub followers_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Curves used for the composite post and user scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringProfile {
    /// Applied to the negated favorite count: quiet posts score high.
    pub favorites: SigmoidCurve,
    /// Applied to the negated repost count.
    pub reposts: SigmoidCurve,
    pub post_age: SigmoidCurve,
    /// Applied to the negated follower count: small accounts score high.
    pub followers: SigmoidCurve,
    pub account_age: SigmoidCurve,
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self {
            favorites: SigmoidCurve::new(50.0, 2.0, 3.0),
            reposts: SigmoidCurve::new(50.0, 1.0, 2.0),
            post_age: SigmoidCurve::new(30.0, 2.0, 3.0),
            followers: SigmoidCurve::new(100.0, 200.0, 300.0),
            account_age: SigmoidCurve::new(30.0, 50.0, 60.0),
        }
    }
}

impl ScoringProfile {
    /// Every curve with its config key.
    pub fn curves(&self) -> [(&'static str, &SigmoidCurve); 5] {
        [
            ("favorites", &self.favorites),
            ("reposts", &self.reposts),
            ("post_age", &self.post_age),
            ("followers", &self.followers),
            ("account_age", &self.account_age),
        ]
    }

    pub fn score_post(&self, post: &PostSignals, now: DateTime<Utc>) -> f64 {
        self.favorites.score(-(post.favorite_count as f64))
            + self.reposts.score(-(post.repost_count as f64))
            + created_at_score(post.created_at, now, &self.post_age)
    }

    pub fn score_user(&self, user: &UserSignals, now: DateTime<Utc>) -> f64 {
        followed_to_following_ratio(user.friends_count, user.followers_count)
            + self.followers.score(-(user.followers_count as f64))
            + created_at_score(user.created_at, now, &self.account_age)
    }
}

/// Pair each item with its score and sort descending. The sort is stable,
/// so equal scores keep their input order.
pub fn rank_by<T, F>(items: Vec<T>, mut score: F) -> Vec<(T, f64)>
where
    F: FnMut(&T) -> f64,
{
    let mut scored: Vec<(T, f64)> = items
        .into_iter()
        .map(|item| {
            let s = score(&item);
            (item, s)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sigmoid_midpoint_and_saturation() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_eq!(sigmoid(1000.0), 1.0);
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scaled_sigmoid_reference_values() {
        assert_eq!(scaled_sigmoid(0.0, 20.0, 10.0, 0.0), 10.0);
        assert_eq!(scaled_sigmoid(5.0, 20.0, 10.0, 0.0), 18.48);
        assert_eq!(scaled_sigmoid(5.0, 20.0, 20.0, 0.0), 15.55);
        assert_eq!(scaled_sigmoid(20.0, 20.0, 10.0, 0.0), 20.0);
        assert_eq!(scaled_sigmoid(20.0, 20.0, 100.0, 0.0), 14.62);
    }

    #[test]
    fn scaled_sigmoid_is_bounded_and_monotonic() {
        let curve = SigmoidCurve::new(50.0, 2.0, 3.0);
        let mut previous = f64::NEG_INFINITY;
        let mut x = -1e6;
        while x <= 1e6 {
            let s = curve.score(x);
            assert!((0.0..=50.0).contains(&s), "score {s} out of bounds at {x}");
            assert!(s >= previous, "not monotonic at {x}");
            previous = s;
            x += 997.3;
        }
        for x in [f64::MIN, -1e300, 0.0, 1e300, f64::MAX] {
            let s = curve.score(x);
            assert!((0.0..=50.0).contains(&s));
        }
    }

    #[test]
    fn degenerate_stretch_is_a_step() {
        assert_eq!(scaled_sigmoid(-5.0, 10.0, 0.0, 3.0), 0.0);
        assert_eq!(scaled_sigmoid(-3.0, 10.0, 0.0, 3.0), 5.0);
        assert_eq!(scaled_sigmoid(1.0, 10.0, -4.0, 3.0), 10.0);
    }

    #[test]
    fn ratio_guards() {
        assert_eq!(followed_to_following_ratio(0, 0), 0.0);
        assert_eq!(followed_to_following_ratio(0, 5000), 0.0);
        assert_eq!(followed_to_following_ratio(100, 0), 46.05);
        assert_eq!(followed_to_following_ratio(300, 100), 10.99);
        assert_eq!(followed_to_following_ratio(50, 100), 0.0);
        assert_eq!(followed_to_following_ratio(1, 1), 0.0);
    }

    #[test]
    fn age_rounds_down_to_whole_days() {
        let created = now() - Duration::hours(47);
        assert_eq!(age_in_days(created, now()), 1);
        let future = now() + Duration::hours(1);
        assert_eq!(age_in_days(future, now()), -1);
    }

    #[test]
    fn fresh_items_outscore_old_ones() {
        let curve = SigmoidCurve::new(30.0, 2.0, 3.0);
        let fresh = created_at_score(now(), now(), &curve);
        let old = created_at_score(now() - Duration::days(10), now(), &curve);
        assert_eq!(fresh, 29.98);
        assert_eq!(old, 0.0);
    }

    #[test]
    fn quiet_recent_posts_score_highest() {
        let profile = ScoringProfile::default();
        let quiet = PostSignals {
            favorite_count: 0,
            repost_count: 0,
            created_at: now(),
        };
        let viral = PostSignals {
            favorite_count: 5000,
            repost_count: 900,
            created_at: now() - Duration::days(30),
        };
        let quiet_score = profile.score_post(&quiet, now());
        assert!(quiet_score > 120.0 && quiet_score <= 130.0);
        assert_eq!(profile.score_post(&viral, now()), 0.0);
    }

    #[test]
    fn user_score_sums_three_families() {
        let profile = ScoringProfile::default();
        let user = UserSignals {
            friends_count: 100,
            followers_count: 0,
            created_at: now() - Duration::days(3650),
        };
        let expected = 46.05 + profile.followers.score(0.0) + 0.0;
        assert!((profile.score_user(&user, now()) - expected).abs() < 1e-9);
    }

    #[test]
    fn rank_is_descending_and_stable() {
        let ranked = rank_by(vec![("a", 1.0), ("b", 3.0), ("c", 1.0), ("d", 2.0)], |(_, s)| *s);
        let order: Vec<&str> = ranked.iter().map(|((name, _), _)| *name).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn rank_tolerates_nan_scores() {
        let ranked = rank_by(
            vec![("a", 1.0), ("nan", f64::NAN), ("b", 3.0), ("c", 2.0)],
            |(_, s)| *s,
        );
        let finite: Vec<&str> = ranked
            .iter()
            .filter(|(_, s)| !s.is_nan())
            .map(|((name, _), _)| *name)
            .collect();
        assert_eq!(ranked.len(), 4);
        assert_eq!(finite, vec!["b", "c", "a"]);
    }

    #[test]
    fn unbounded_curves_are_invalid() {
        let infinite = SigmoidCurve::new(f64::INFINITY, 2.0, 3.0);
        assert!(infinite.score(-1e6).is_nan());
        assert!(!infinite.is_valid());
        assert!(!SigmoidCurve::new(-1.0, 2.0, 3.0).is_valid());
        assert!(!SigmoidCurve::new(10.0, f64::NAN, 3.0).is_valid());
        assert!(SigmoidCurve::new(10.0, 0.0, 3.0).is_valid());
        assert!(ScoringProfile::default().curves().iter().all(|(_, c)| c.is_valid()));
    }
}
