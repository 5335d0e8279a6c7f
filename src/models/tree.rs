//! CART regression trees for the boosting ensemble
//!
//! A tree is grown greedily: at every node each candidate feature is sorted, every
//! boundary between distinct values is scored, and the best boundary becomes an
//! axis-aligned split `x[feature] <= threshold`. What the leaves estimate is
//! abstracted behind [`SplitTarget`].

use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::pipeline::FeatureMatrix;

/// Gains at or below this are treated as "no improvement"
const MIN_GAIN: f64 = 1e-12;

/// What a tree is fitted to.
///
/// Splits are scored on an additive purity term: the gain of splitting a node is
/// `purity(left) + purity(right) - purity(parent)`. For real-valued targets the term
/// `sum^2 / n` makes the gain equal to the squared-error decrease.
pub trait SplitTarget: Sync {
    type Leaf: Copy + Send + Sync + std::fmt::Debug;
    type Stats: Clone;

    fn empty_stats(&self) -> Self::Stats;
    fn add(&self, stats: &mut Self::Stats, row: usize);
    fn remove(&self, stats: &mut Self::Stats, row: usize);
    fn purity(&self, stats: &Self::Stats) -> f64;
    fn is_pure(&self, stats: &Self::Stats) -> bool;
    fn leaf(&self, rows: &[usize], stats: &Self::Stats) -> Self::Leaf;
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features drawn at random at each node (`None` = all)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 64,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node<L> {
    Leaf(L),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree stored as a flat node arena; node 0 is the root
#[derive(Debug, Clone)]
pub struct DecisionTree<L> {
    nodes: Vec<Node<L>>,
    n_features: usize,
}

impl<L: Copy> DecisionTree<L> {
    pub fn predict_row(&self, row: &[f64]) -> L {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    /// Number of split levels on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        fn walk<L>(nodes: &[Node<L>], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grow a tree on the given rows of `x`.
///
/// `rows` may contain duplicates (bootstrap samples).
pub fn grow_tree<T: SplitTarget>(
    x: &FeatureMatrix,
    target: &T,
    rows: Vec<usize>,
    params: &TreeParams,
    rng: &mut StdRng,
) -> DecisionTree<T::Leaf> {
    let mut nodes = Vec::new();
    grow_node(x, target, rows, 0, params, rng, &mut nodes);
    DecisionTree {
        nodes,
        n_features: x.ncols(),
    }
}

fn grow_node<T: SplitTarget>(
    x: &FeatureMatrix,
    target: &T,
    rows: Vec<usize>,
    depth: usize,
    params: &TreeParams,
    rng: &mut StdRng,
    nodes: &mut Vec<Node<T::Leaf>>,
) -> usize {
    let mut stats = target.empty_stats();
    for &row in &rows {
        target.add(&mut stats, row);
    }

    let idx = nodes.len();
    nodes.push(Node::Leaf(target.leaf(&rows, &stats)));

    let min_rows = params
        .min_samples_split
        .max(2 * params.min_samples_leaf)
        .max(2);
    if depth >= params.max_depth || rows.len() < min_rows || target.is_pure(&stats) {
        return idx;
    }

    let n_features = x.ncols();
    let candidates: Vec<usize> = match params.max_features {
        Some(m) if m < n_features => sample(rng, n_features, m.max(1)).into_vec(),
        _ => (0..n_features).collect(),
    };

    let Some(split) = find_best_split(x, target, &rows, &stats, &candidates, params.min_samples_leaf)
    else {
        return idx;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .into_iter()
        .partition(|&row| x.get(row, split.feature) <= split.threshold);

    let left = grow_node(x, target, left_rows, depth + 1, params, rng, nodes);
    let right = grow_node(x, target, right_rows, depth + 1, params, rng, nodes);

    nodes[idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };
    idx
}

/// Scan every boundary between distinct values of every candidate feature
fn find_best_split<T: SplitTarget>(
    x: &FeatureMatrix,
    target: &T,
    rows: &[usize],
    stats: &T::Stats,
    candidates: &[usize],
    min_samples_leaf: usize,
) -> Option<Split> {
    let n = rows.len();
    let min_leaf = min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let parent = target.purity(stats);
    let mut best: Option<Split> = None;
    let mut order = rows.to_vec();

    for &feature in candidates {
        order.sort_unstable_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

        let mut left = target.empty_stats();
        let mut right = stats.clone();

        for i in 0..n - 1 {
            let row = order[i];
            target.add(&mut left, row);
            target.remove(&mut right, row);

            let left_count = i + 1;
            let right_count = n - left_count;
            if left_count < min_leaf {
                continue;
            }
            if right_count < min_leaf {
                break;
            }

            // Never split between equal values
            let value = x.get(row, feature);
            let next = x.get(order[i + 1], feature);
            if next <= value {
                continue;
            }

            let gain = target.purity(&left) + target.purity(&right) - parent;
            if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
    }

    best
}
