/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides a KD-tree neighbour index over samples under an anisotropic metric.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # neighbours
//!
//! Radius and k-nearest queries over sample positions. Positions are transformed
//! once into the metric's ellipsoid-normalised space, where the anisotropic
//! distance is the Euclidean distance, and an ordinary KD-tree is built there.
//! Every reported distance is therefore a normalised distance: `1.0` lies on the
//! ellipsoid boundary.
//!
//! Results are ordered by distance, with ties broken by input order. Inputs of up
//! to [`LINEAR_SCAN_THRESHOLD`] points skip the tree and are scanned directly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::metric::AnisotropicMetric;
use crate::samples::SampleSet;

/// Point counts at or below this are scanned linearly instead of building a tree.
pub const LINEAR_SCAN_THRESHOLD: usize = 32;

/// A sample found by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Index of the sample in the set the index was built from.
    pub index: usize,

    /// Normalised distance from the query point.
    pub distance: f64,
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    /// Orders by distance, then by input index.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// A node in the KDTree
#[derive(Debug, Clone)]
struct Node {
    index: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// KD-tree over points stored in a flat vector.
#[derive(Debug, Clone, Default)]
struct KDTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KDTree {
    fn new(points: &[[f64; 3]]) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut tree = KDTree { nodes: Vec::with_capacity(points.len()), root: None };
        tree.root = tree.build_tree(points, &mut order, 0);
        tree
    }

    /// Recursively builds the KDTree and stores nodes in a flat vector.
    fn build_tree(&mut self, points: &[[f64; 3]], order: &mut [usize], depth: usize) -> Option<usize> {
        if order.is_empty() {
            return None;
        }

        let axis = depth % 3;

        order.sort_by(|&a, &b| {
            points[a][axis]
                .total_cmp(&points[b][axis])
                .then(a.cmp(&b))
        });

        // Choose the median as the pivot
        let mid = order.len() / 2;

        let node_index = self.nodes.len();
        self.nodes.push(Node { index: order[mid], left: None, right: None });

        let (lower, rest) = order.split_at_mut(mid);
        let upper = &mut rest[1..];
        self.nodes[node_index].left = self.build_tree(points, lower, depth + 1);
        self.nodes[node_index].right = self.build_tree(points, upper, depth + 1);

        Some(node_index)
    }

    fn radius_search(&self, points: &[[f64; 3]], target: &[f64; 3], radius: f64, out: &mut Vec<Neighbour>) {
        if let Some(root) = self.root {
            self.radius_search_impl(points, root, target, radius, 0, out);
        }
    }

    fn radius_search_impl(
        &self,
        points: &[[f64; 3]],
        node_index: usize,
        target: &[f64; 3],
        radius: f64,
        depth: usize,
        out: &mut Vec<Neighbour>,
    ) {
        let node = &self.nodes[node_index];
        let point = &points[node.index];
        let distance = euclidean(target, point);

        if distance <= radius {
            out.push(Neighbour { index: node.index, distance });
        }

        let axis = depth % 3;
        let diff = target[axis] - point[axis];

        // |diff| <= radius => the sphere intersects the splitting plane
        let (near, far) = if diff < 0.0 { (node.left, node.right) } else { (node.right, node.left) };
        if let Some(near) = near {
            self.radius_search_impl(points, near, target, radius, depth + 1, out);
        }
        if diff.abs() <= radius {
            if let Some(far) = far {
                self.radius_search_impl(points, far, target, radius, depth + 1, out);
            }
        }
    }

    fn k_nearest(&self, points: &[[f64; 3]], target: &[f64; 3], k: usize, heap: &mut BinaryHeap<Neighbour>) {
        if let Some(root) = self.root {
            self.k_nearest_impl(points, root, target, k, 0, heap);
        }
    }

    fn k_nearest_impl(
        &self,
        points: &[[f64; 3]],
        node_index: usize,
        target: &[f64; 3],
        k: usize,
        depth: usize,
        heap: &mut BinaryHeap<Neighbour>,
    ) {
        let node = &self.nodes[node_index];
        let point = &points[node.index];
        push_bounded(heap, k, Neighbour { index: node.index, distance: euclidean(target, point) });

        let axis = depth % 3;
        let diff = target[axis] - point[axis];

        let (near, far) = if diff < 0.0 { (node.left, node.right) } else { (node.right, node.left) };

        if let Some(near) = near {
            self.k_nearest_impl(points, near, target, k, depth + 1, heap);
        }

        if let Some(far) = far {
            // Inclusive bound so equal-distance points with lower indices are still found.
            let worst = heap.peek().map_or(f64::INFINITY, |n| n.distance);
            if heap.len() < k || diff.abs() <= worst {
                self.k_nearest_impl(points, far, target, k, depth + 1, heap);
            }
        }
    }
}

/// Keeps the `k` smallest neighbours in a max-heap.
#[inline]
fn push_bounded(heap: &mut BinaryHeap<Neighbour>, k: usize, candidate: Neighbour) {
    if heap.len() < k {
        heap.push(candidate);
    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
        heap.pop();
        heap.push(candidate);
    }
}

#[inline]
fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let (dx, dy, dz) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Read-only spatial index over sample positions under an anisotropic metric.
///
/// Safe to share between threads once built.
#[derive(Debug, Clone)]
pub struct NeighbourIndex {
    metric: AnisotropicMetric,
    points: Vec<[f64; 3]>,
    tree: Option<KDTree>,
}

impl NeighbourIndex {
    /// Indexes the positions of a sample set.
    pub fn build(samples: &SampleSet, metric: &AnisotropicMetric) -> Self {
        let positions: Vec<[f64; 3]> = samples.iter().map(|s| s.position).collect();
        Self::from_positions(&positions, metric)
    }

    /// Indexes raw world positions.
    pub fn from_positions(positions: &[[f64; 3]], metric: &AnisotropicMetric) -> Self {
        let points: Vec<[f64; 3]> = positions.iter().map(|p| metric.transform_point(p)).collect();
        let tree = match points.len() > LINEAR_SCAN_THRESHOLD {
            true => Some(KDTree::new(&points)),
            false => None,
        };
        Self { metric: metric.clone(), points, tree }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The metric distances are measured in.
    pub fn metric(&self) -> &AnisotropicMetric {
        &self.metric
    }

    /// All points within normalised distance `radius` of `point`, nearest first.
    pub fn query_radius(&self, point: &[f64; 3], radius: f64) -> Vec<Neighbour> {
        let mut out = Vec::new();
        if !(radius >= 0.0) {
            return out;
        }

        let target = self.metric.transform_point(point);
        match &self.tree {
            Some(tree) => tree.radius_search(&self.points, &target, radius, &mut out),
            None => out.extend(
                self.points
                    .iter()
                    .enumerate()
                    .map(|(index, p)| Neighbour { index, distance: euclidean(&target, p) })
                    .filter(|n| n.distance <= radius),
            ),
        }
        out.sort();
        out
    }

    /// All points inside or on the metric's ellipsoid centred at `point`.
    pub fn query_ellipsoid(&self, point: &[f64; 3]) -> Vec<Neighbour> {
        self.query_radius(point, 1.0)
    }

    /// The `k` nearest points to `point`, nearest first, ties broken by index.
    pub fn query_knn(&self, point: &[f64; 3], k: usize) -> Vec<Neighbour> {
        if k == 0 || self.points.is_empty() {
            return Vec::new();
        }

        let target = self.metric.transform_point(point);
        let mut heap = BinaryHeap::with_capacity(k + 1);
        match &self.tree {
            Some(tree) => tree.k_nearest(&self.points, &target, k, &mut heap),
            None => self.points.iter().enumerate().for_each(|(index, p)| {
                push_bounded(&mut heap, k, Neighbour { index, distance: euclidean(&target, p) })
            }),
        }
        heap.into_sorted_vec()
    }

    /// The closest point to `point`.
    pub fn nearest(&self, point: &[f64; 3]) -> Option<Neighbour> {
        self.query_knn(point, 1).into_iter().next()
    }

    /// Mean distance from each point to its nearest other point, or `None` with
    /// fewer than two points.
    pub fn mean_nearest_spacing(&self) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }

        let total: f64 = (0..self.points.len())
            .map(|i| {
                let target = self.points[i];
                let mut heap = BinaryHeap::with_capacity(3);
                match &self.tree {
                    Some(tree) => tree.k_nearest(&self.points, &target, 2, &mut heap),
                    None => self.points.iter().enumerate().for_each(|(index, p)| {
                        push_bounded(&mut heap, 2, Neighbour { index, distance: euclidean(&target, p) })
                    }),
                }
                heap.into_sorted_vec()
                    .into_iter()
                    .find(|n| n.index != i)
                    .map_or(0.0, |n| n.distance)
            })
            .sum();

        Some(total / self.points.len() as f64)
    }
}
