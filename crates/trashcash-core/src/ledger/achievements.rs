//! ============================================================================
//! Achievements - Milestones derived from stats at render time
//! ============================================================================
//! Every milestone is a threshold on one stats metric. Unlocked milestones
//! come first in catalog order; after them, each metric contributes at most
//! its next unmet milestone together with a progress percentage.
//! ============================================================================

use serde::Serialize;

use super::stats::Stats;

/// Stats field a milestone is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    TotalRecycled,
    TotalTransactions,
    TotalRewards,
    Level,
}

impl Metric {
    pub fn value(&self, stats: &Stats) -> f64 {
        match self {
            Metric::TotalRecycled => stats.total_recycled,
            Metric::TotalTransactions => stats.total_transactions as f64,
            Metric::TotalRewards => stats.total_rewards as f64,
            Metric::Level => stats.level as f64,
        }
    }
}

/// Static milestone definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MilestoneDef {
    pub id: &'static str,
    pub title: &'static str,
    /// Shown once unlocked
    pub achieved: &'static str,
    /// Shown while pending
    pub goal: &'static str,
    pub icon: &'static str,
    pub metric: Metric,
    pub threshold: f64,
}

impl MilestoneDef {
    pub fn is_met(&self, stats: &Stats) -> bool {
        self.metric.value(stats) >= self.threshold
    }
}

/// Default milestone catalog, in display order
pub const DEFAULT_CATALOG: &[MilestoneDef] = &[
    MilestoneDef {
        id: "first_10kg",
        title: "First 10 kg",
        achieved: "Recycled 10 kg",
        goal: "Recycle 10 kg",
        icon: "🌱",
        metric: Metric::TotalRecycled,
        threshold: 10.0,
    },
    MilestoneDef {
        id: "eco_warrior",
        title: "Eco Warrior",
        achieved: "Recycled 50 kg",
        goal: "Recycle 50 kg",
        icon: "🛡️",
        metric: Metric::TotalRecycled,
        threshold: 50.0,
    },
    MilestoneDef {
        id: "eco_hero",
        title: "Eco Hero",
        achieved: "Recycled 100 kg",
        goal: "Recycle 100 kg",
        icon: "🦸",
        metric: Metric::TotalRecycled,
        threshold: 100.0,
    },
    MilestoneDef {
        id: "eco_legend",
        title: "Eco Legend",
        achieved: "Recycled 500 kg",
        goal: "Recycle 500 kg",
        icon: "👑",
        metric: Metric::TotalRecycled,
        threshold: 500.0,
    },
    MilestoneDef {
        id: "regular",
        title: "Regular",
        achieved: "Made 10 drop-offs",
        goal: "Make 10 drop-offs",
        icon: "⭐",
        metric: Metric::TotalTransactions,
        threshold: 10.0,
    },
    MilestoneDef {
        id: "reward_collector",
        title: "Reward Collector",
        achieved: "Collected 5 rewards",
        goal: "Collect 5 rewards",
        icon: "🎁",
        metric: Metric::TotalRewards,
        threshold: 5.0,
    },
    MilestoneDef {
        id: "level_master",
        title: "Level Master",
        achieved: "Reached level 5",
        goal: "Reach level 5",
        icon: "🏅",
        metric: Metric::Level,
        threshold: 5.0,
    },
];

/// One rendered achievement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub unlocked: bool,
    /// Percent toward the threshold, only on pending entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

/// Evaluate a catalog against a stats snapshot.
pub fn compute_achievements(stats: &Stats, catalog: &[MilestoneDef]) -> Vec<Achievement> {
    let mut out: Vec<Achievement> = catalog
        .iter()
        .filter(|def| def.is_met(stats))
        .map(|def| Achievement {
            id: def.id,
            title: def.title,
            description: def.achieved,
            icon: def.icon,
            unlocked: true,
            progress: None,
        })
        .collect();

    // Lowest unmet threshold per metric
    let mut next: Vec<(Metric, f64)> = Vec::new();
    for def in catalog.iter().filter(|def| !def.is_met(stats)) {
        match next.iter_mut().find(|(metric, _)| *metric == def.metric) {
            Some((_, lowest)) if def.threshold < *lowest => *lowest = def.threshold,
            Some(_) => {}
            None => next.push((def.metric, def.threshold)),
        }
    }

    for def in catalog.iter().filter(|def| !def.is_met(stats)) {
        let Some(pos) = next
            .iter()
            .position(|(metric, lowest)| *metric == def.metric && *lowest == def.threshold)
        else {
            continue;
        };
        // one pending entry per metric
        next.remove(pos);

        let current = def.metric.value(stats);
        out.push(Achievement {
            id: def.id,
            title: def.title,
            description: def.goal,
            icon: def.icon,
            unlocked: false,
            progress: Some(progress_percent(current, def.threshold)),
        });
    }

    out
}

fn progress_percent(current: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 100.0;
    }
    (current * 100.0 / threshold).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(recycled: f64, transactions: u32, rewards: u32, level: u32) -> Stats {
        Stats {
            total_recycled: recycled,
            total_transactions: transactions,
            total_rewards: rewards,
            level,
            points: 0,
        }
    }

    fn ids(list: &[Achievement]) -> Vec<&'static str> {
        list.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_12kg_scenario() {
        let list = compute_achievements(&stats(12.0, 1, 0, 1), DEFAULT_CATALOG);

        let first = &list[0];
        assert_eq!(first.id, "first_10kg");
        assert!(first.unlocked);
        assert_eq!(first.progress, None);

        let warrior = list.iter().find(|a| a.id == "eco_warrior").unwrap();
        assert!(!warrior.unlocked);
        assert_eq!(warrior.progress, Some(24.0));
    }

    #[test]
    fn test_exact_order() {
        let list = compute_achievements(&stats(12.0, 10, 0, 1), DEFAULT_CATALOG);
        assert_eq!(
            ids(&list),
            vec![
                "first_10kg",
                "regular",
                "eco_warrior",
                "reward_collector",
                "level_master",
            ]
        );
        assert!(list[..2].iter().all(|a| a.unlocked));
        assert!(list[2..].iter().all(|a| !a.unlocked));
    }

    #[test]
    fn test_fresh_user_has_one_pending_per_metric() {
        let list = compute_achievements(&Stats::default(), DEFAULT_CATALOG);
        assert_eq!(
            ids(&list),
            vec!["first_10kg", "regular", "reward_collector", "level_master"]
        );
        assert_eq!(list[0].progress, Some(0.0));
        // level starts at 1
        assert_eq!(list[3].progress, Some(20.0));
    }

    #[test]
    fn test_no_pending_once_track_is_complete() {
        let list = compute_achievements(&stats(620.0, 40, 7, 7), DEFAULT_CATALOG);
        assert_eq!(list.len(), DEFAULT_CATALOG.len());
        assert!(list.iter().all(|a| a.unlocked && a.progress.is_none()));
    }

    #[test]
    fn test_unlocked_set_is_monotonic() {
        let samples = [
            stats(0.0, 0, 0, 1),
            stats(9.9, 3, 1, 1),
            stats(10.0, 9, 4, 1),
            stats(55.0, 10, 5, 1),
            stats(120.0, 20, 5, 2),
            stats(480.0, 30, 6, 5),
        ];
        for pair in samples.windows(2) {
            let before = compute_achievements(&pair[0], DEFAULT_CATALOG);
            let after = compute_achievements(&pair[1], DEFAULT_CATALOG);
            for a in before.iter().filter(|a| a.unlocked) {
                assert!(
                    after.iter().any(|b| b.id == a.id && b.unlocked),
                    "{} lost between {:?} and {:?}",
                    a.id,
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn test_progress_is_capped() {
        assert_eq!(progress_percent(75.0, 50.0), 100.0);
        assert_eq!(progress_percent(0.0, 10.0), 0.0);
    }

    #[test]
    fn test_copy_switches_with_state() {
        let locked = compute_achievements(&stats(1.0, 0, 0, 1), DEFAULT_CATALOG);
        assert_eq!(locked[0].description, "Recycle 10 kg");
        let unlocked = compute_achievements(&stats(10.0, 0, 0, 1), DEFAULT_CATALOG);
        assert_eq!(unlocked[0].description, "Recycled 10 kg");
    }
}
