use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use serde::Serialize;

use crate::path::TilePath;
use crate::tileset::TileSet;

/// Limits of the work split between render workers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Deepest zoom level tried for distribution.
    pub max_zoom: usize,
    /// A level is balanced once the largest deviation from the mean load is
    /// at most this fraction of the total.
    pub threshold_fraction: f64,
    /// ... or at most this many render tiles.
    pub threshold_tiles: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_zoom: 6,
            threshold_fraction: 0.05,
            threshold_tiles: 50,
        }
    }
}

/// Composite tiles assigned to one worker, each with its required render
/// tile count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerTasks {
    pub tiles: BTreeMap<TilePath, usize>,
    pub cost: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    /// Zoom level of the distributed subtrees. `None` when the tree is too
    /// shallow to split.
    pub level: Option<usize>,
    /// Required composite tiles above `level` that are rendered once all
    /// workers are done.
    pub remaining: usize,
    /// Largest deviation from the mean load as a fraction of the total.
    pub deviation: f64,
    pub workers: Vec<WorkerTasks>,
}

impl RenderPlan {
    pub fn total_cost(&self) -> usize {
        self.workers.iter().map(|worker| worker.cost).sum()
    }
}

struct Assignment {
    workers: Vec<WorkerTasks>,
    max_diff: usize,
    deviation: f64,
}

/// Greedy split: cheapest task first, always to the least loaded worker.
fn assign_tasks(mut tasks: Vec<(TilePath, usize)>, worker_count: usize) -> Assignment {
    tasks.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut workers = vec![WorkerTasks::default(); worker_count];
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> =
        (0..worker_count).map(|index| Reverse((0, index))).collect();
    for (tile, cost) in tasks {
        let Some(Reverse((load, index))) = heap.pop() else {
            break;
        };
        workers[index].tiles.insert(tile, cost);
        workers[index].cost += cost;
        heap.push(Reverse((load + cost, index)));
    }

    let total: usize = workers.iter().map(|worker| worker.cost).sum();
    let mean = total as f64 / worker_count as f64;
    let max_diff_f = workers
        .iter()
        .map(|worker| (worker.cost as f64 - mean).abs())
        .fold(0.0, f64::max);
    let deviation = if total > 0 { max_diff_f / total as f64 } else { 0.0 };
    Assignment {
        workers,
        max_diff: max_diff_f.ceil() as usize,
        deviation,
    }
}

impl TileSet {
    /// Splits the required composite tiles into subtrees for `worker_count`
    /// workers.
    ///
    /// Zoom levels are tried from the top down to `max_zoom`; the first
    /// balanced one wins. If none is balanced, the level with the lowest
    /// deviation is used.
    pub fn find_render_tasks(&self, worker_count: usize, config: &SchedulerConfig) -> RenderPlan {
        let worker_count = worker_count.max(1);
        let depth = self.depth();

        let mut tiles_by_zoom: Vec<Vec<&TilePath>> = vec![Vec::new(); depth + 1];
        for path in self.required_composite_tiles() {
            tiles_by_zoom[path.depth()].push(path);
        }

        let mut remaining = tiles_by_zoom[0].len();
        let mut best: Option<(usize, usize, Assignment)> = None;
        for zoom in (1..=config.max_zoom).take_while(|&zoom| zoom < depth) {
            let tasks = tiles_by_zoom[zoom]
                .iter()
                .map(|&path| (path.clone(), self.containing_render_tiles(path)))
                .collect();
            let assignment = assign_tasks(tasks, worker_count);
            log::debug!(
                "Zoom level {zoom}: {} tasks, deviation {:.3}",
                tiles_by_zoom[zoom].len(),
                assignment.deviation
            );

            let balanced = assignment.deviation <= config.threshold_fraction
                || assignment.max_diff <= config.threshold_tiles;
            let better = best
                .as_ref()
                .is_none_or(|(_, _, current)| assignment.deviation < current.deviation);
            if balanced || better {
                best = Some((zoom, remaining, assignment));
            }
            if balanced {
                break;
            }
            remaining += tiles_by_zoom[zoom].len();
        }

        match best {
            Some((level, remaining, assignment)) => RenderPlan {
                level: Some(level),
                remaining,
                deviation: assignment.deviation,
                workers: assignment.workers,
            },
            None => RenderPlan {
                level: None,
                remaining: self.required_composite_tiles_count(),
                deviation: 0.0,
                workers: vec![WorkerTasks::default(); worker_count],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(path: &str, cost: usize) -> (TilePath, usize) {
        (path.parse().unwrap(), cost)
    }

    #[test]
    fn test_greedy_assignment() {
        let tasks = vec![task("1", 5), task("2", 1), task("3", 3), task("4", 2)];
        let assignment = assign_tasks(tasks, 2);
        let loads: Vec<_> = assignment.workers.iter().map(|w| w.cost).collect();
        // Costs 1, 2, 3, 5 go to w0, w1, w0, w1.
        assert_eq!(loads, vec![4, 7]);
        assert!(assignment.workers[1].tiles.contains_key(&"1".parse().unwrap()));
        assert!(assignment.workers[0].tiles.contains_key(&"3".parse().unwrap()));
    }

    #[test]
    fn test_empty_assignment() {
        let assignment = assign_tasks(Vec::new(), 3);
        assert_eq!(assignment.workers.len(), 3);
        assert_eq!(assignment.deviation, 0.0);
        assert_eq!(assignment.max_diff, 0);
    }

    #[test]
    fn test_shallow_tree_is_not_split() {
        let mut set = TileSet::default();
        set.add_render_tile(crate::TilePos::new(0, 0), 1);
        set.finish();
        let plan = set.find_render_tasks(4, &SchedulerConfig::default());
        assert_eq!(plan.level, None);
        assert_eq!(plan.workers.len(), 4);
        assert_eq!(plan.total_cost(), 0);
    }
}
