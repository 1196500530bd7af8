//! Team aggregation
//!
//! Computes per-team averages of cumulative user metrics. This is the
//! client-side counterpart of the `team_averages` SQL view. The view only
//! groups and sums; averaging and rounding for both paths happen in
//! [`TeamSums::averages`].

use std::collections::HashMap;

use crate::models::metrics::{TeamAverages, UserMetricTotals};
use crate::models::team::Team;

use super::estimate::{round_to, COST_DECIMALS};

/// Compensated running sum.
///
/// Uses the Kahan-Babuska-Neumaier step that SQLite's `SUM()` applies to
/// floating point input, so a sum taken here matches one read from the
/// `team_averages` view.
#[derive(Debug, Clone, Copy, Default)]
struct CompensatedSum {
    sum: f64,
    err: f64,
}

impl CompensatedSum {
    fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() > value.abs() {
            self.err += (self.sum - t) + value;
        } else {
            self.err += (value - t) + self.sum;
        }
        self.sum = t;
    }

    fn value(&self) -> f64 {
        self.sum + self.err
    }
}

/// Member count and unrounded metric sums for one team
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeamSums {
    pub count: u32,
    pub co2: f64,
    pub cost: f64,
    pub latency: f64,
}

impl TeamSums {
    /// Average and round the sums. Both aggregation paths end here.
    pub fn averages(&self, team: Team) -> TeamAverages {
        if self.count == 0 {
            return TeamAverages::empty(team);
        }

        let n = self.count as f64;
        TeamAverages {
            team,
            count: self.count,
            avg_co2: round_to(self.co2 / n, COST_DECIMALS),
            avg_cost: round_to(self.cost / n, COST_DECIMALS),
            avg_latency: (self.latency / n).round(),
        }
    }
}

/// Running sums for one team
#[derive(Debug, Clone, Copy, Default)]
struct TeamAccumulator {
    count: u32,
    co2: CompensatedSum,
    cost: CompensatedSum,
    latency: CompensatedSum,
}

impl TeamAccumulator {
    fn add(&mut self, totals: &UserMetricTotals) {
        self.count += 1;
        self.co2.add(totals.total_co2);
        self.cost.add(totals.total_cost);
        self.latency.add(totals.total_latency);
    }

    fn sums(&self) -> TeamSums {
        TeamSums {
            count: self.count,
            co2: self.co2.value(),
            cost: self.cost.value(),
            latency: self.latency.value(),
        }
    }
}

/// Aggregate user totals into one row per team, in enumeration order.
///
/// Users without a team mapping are skipped. Teams without members get an
/// all-zero row.
pub fn aggregate_team_averages(
    totals: &[UserMetricTotals],
    membership: &HashMap<String, Team>,
) -> Vec<TeamAverages> {
    let mut groups: HashMap<Team, TeamAccumulator> = HashMap::new();
    let mut unmapped = 0usize;

    for user in totals {
        match membership.get(&user.user_id) {
            Some(team) => groups.entry(*team).or_default().add(user),
            None => unmapped += 1,
        }
    }

    if unmapped > 0 {
        tracing::debug!("{} users without a team were excluded from aggregation", unmapped);
    }

    Team::ALL
        .iter()
        .map(|team| {
            groups
                .get(team)
                .copied()
                .unwrap_or_default()
                .sums()
                .averages(*team)
        })
        .collect()
}
