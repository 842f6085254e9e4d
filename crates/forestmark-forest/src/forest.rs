//! Partitioned forests
//!
//! A [`Forest`] is the local shard of a distributed forest. Global element
//! order is tree by tree, depth-first inside each tree; rank `r` owns one
//! contiguous range of that order. Every operation that changes the element
//! set consumes the forest and returns the new one, so a superseded forest
//! can never be used or released twice.

use crate::cmesh::CoarseMesh;
use crate::element::{Element, ENCODED_LEN, MAX_LEVEL};
use crate::error::ForestError;
use crate::shape::{ElementShape, Vertices};
use forestmark_comm::Communicator;
use std::sync::Arc;
use tracing::debug;

/// Per-element adaptation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapt {
    /// Leave the element as it is
    Keep,
    /// Replace the element by its eight children
    Refine,
}

/// Local shard of a forest
#[derive(Debug)]
pub struct Forest {
    mesh: Arc<CoarseMesh>,
    elements: Vec<Element>,
    global_num_elements: u64,
    global_offset: u64,
}

impl Forest {
    /// Uniformly refined forest, partitioned evenly across the group
    ///
    /// Needs no communication: every rank derives its range from the global
    /// element count.
    pub fn new_uniform(
        mesh: Arc<CoarseMesh>,
        level: u8,
        comm: &dyn Communicator,
    ) -> Result<Self, ForestError> {
        if mesh.num_trees() == 0 {
            return Err(ForestError::EmptyMesh);
        }
        if level > MAX_LEVEL {
            return Err(ForestError::LevelTooDeep {
                level,
                max: MAX_LEVEL,
            });
        }

        let per_tree = 1u128 << (3 * u32::from(level));
        let total = per_tree * mesh.num_trees() as u128;
        let global_num_elements = u64::try_from(total).map_err(|_| ForestError::TooManyElements {
            trees: mesh.num_trees(),
            level,
        })?;

        let (start, end) = owned_range(global_num_elements, comm.rank(), comm.size());
        let elements = (start..end)
            .map(|global| {
                let global = u128::from(global);
                Element::from_parts((global / per_tree) as u32, level, (global % per_tree) as u64)
            })
            .collect();

        debug!(
            level,
            global_num_elements,
            local = end - start,
            "uniform forest created"
        );

        Ok(Self {
            mesh,
            elements,
            global_num_elements,
            global_offset: start,
        })
    }

    /// One adaptation pass (collective)
    ///
    /// `decide` is called once for every local element. With `recursive`
    /// unset, a refined element contributes exactly its eight children;
    /// otherwise `decide` is asked again about each child. The source forest
    /// is consumed. Element order is preserved, so the result is not
    /// balanced; call [`Forest::partition`] afterwards.
    pub fn adapt<F>(
        self,
        comm: &dyn Communicator,
        recursive: bool,
        mut decide: F,
    ) -> Result<Self, ForestError>
    where
        F: FnMut(&Element, ElementShape) -> Adapt,
    {
        let local = self.adapt_local(recursive, &mut decide);

        // everyone learns about a local failure before the count exchange
        if !comm.vote(local.is_ok())? {
            return Err(local.err().unwrap_or(ForestError::PeerFailed));
        }
        let elements = local?;

        let counts = comm.all_gather_u64(elements.len() as u64)?;
        let global_num_elements = counts.iter().sum();
        let global_offset = counts[..comm.rank()].iter().sum();

        debug!(
            before = self.elements.len(),
            after = elements.len(),
            global_num_elements,
            "adaptation committed"
        );

        Ok(Self {
            mesh: self.mesh,
            elements,
            global_num_elements,
            global_offset,
        })
    }

    fn adapt_local<F>(&self, recursive: bool, decide: &mut F) -> Result<Vec<Element>, ForestError>
    where
        F: FnMut(&Element, ElementShape) -> Adapt,
    {
        let mut adapted = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let shape = self.shape_of(element);
            match decide(element, shape) {
                Adapt::Keep => adapted.push(*element),
                Adapt::Refine => refine_into(element, shape, recursive, decide, &mut adapted)?,
            }
        }
        Ok(adapted)
    }

    /// Rebalance so rank `r` owns elements `[N*r/p, N*(r+1)/p)` (collective)
    pub fn partition(self, comm: &dyn Communicator) -> Result<Self, ForestError> {
        let size = comm.size();
        let mut outgoing = vec![Vec::new(); size];
        let mut destination = 0;
        for (i, element) in self.elements.iter().enumerate() {
            let global = self.global_offset + i as u64;
            while owned_range(self.global_num_elements, destination, size).1 <= global {
                destination += 1;
            }
            element.encode(&mut outgoing[destination]);
        }

        let incoming = comm.exchange(outgoing)?;

        let (start, end) = owned_range(self.global_num_elements, comm.rank(), size);
        let mut elements = Vec::with_capacity((end - start) as usize);
        for (source_rank, payload) in incoming.iter().enumerate() {
            if payload.len() % ENCODED_LEN != 0 {
                return Err(ForestError::CorruptPartition {
                    source_rank,
                    detail: format!("{} bytes is not a whole number of elements", payload.len()),
                });
            }
            for chunk in payload.chunks_exact(ENCODED_LEN) {
                let element = Element::decode(chunk).ok_or_else(|| ForestError::CorruptPartition {
                    source_rank,
                    detail: "undecodable element".to_string(),
                })?;
                if element.tree() as usize >= self.mesh.num_trees() {
                    return Err(ForestError::CorruptPartition {
                        source_rank,
                        detail: format!("tree {} outside the mesh", element.tree()),
                    });
                }
                elements.push(element);
            }
        }
        if elements.len() as u64 != end - start {
            return Err(ForestError::CorruptPartition {
                source_rank: comm.rank(),
                detail: format!("expected {} elements, received {}", end - start, elements.len()),
            });
        }

        debug!(
            before = self.elements.len(),
            after = elements.len(),
            "partition committed"
        );

        Ok(Self {
            mesh: self.mesh,
            elements,
            global_num_elements: self.global_num_elements,
            global_offset: start,
        })
    }

    /// The coarse mesh
    #[inline]
    #[must_use]
    pub fn mesh(&self) -> &CoarseMesh {
        &self.mesh
    }

    /// Local elements in global order
    #[inline]
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Number of local elements
    #[inline]
    #[must_use]
    pub fn local_num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Number of elements across the group
    #[inline]
    #[must_use]
    pub fn global_num_elements(&self) -> u64 {
        self.global_num_elements
    }

    /// Global index of the first local element
    #[inline]
    #[must_use]
    pub fn global_offset(&self) -> u64 {
        self.global_offset
    }

    /// Sum of the vertex counts of the local elements
    #[must_use]
    pub fn local_num_vertices(&self) -> u64 {
        self.elements
            .iter()
            .map(|e| self.shape_of(e).vertex_count() as u64)
            .sum()
    }

    /// Shape of an element of this forest
    #[inline]
    #[must_use]
    pub fn shape_of(&self, element: &Element) -> ElementShape {
        self.coarse_tree(element).shape()
    }

    /// Corner coordinates of an element of this forest
    #[must_use]
    pub fn vertices_of(&self, element: &Element) -> Vertices {
        let tree = self.coarse_tree(element);
        let mut vertices: Vertices = tree.vertices().iter().copied().collect();
        for depth in 0..element.level() {
            vertices = tree
                .shape()
                .child_vertices(&vertices, element.child_index_at(depth));
        }
        vertices
    }

    fn coarse_tree(&self, element: &Element) -> &crate::cmesh::CoarseTree {
        // elements are only ever created from trees of this mesh
        self.mesh
            .tree(element.tree() as usize)
            .unwrap_or_else(|| unreachable!("element of tree {} outside the mesh", element.tree()))
    }
}

fn refine_into<F>(
    element: &Element,
    shape: ElementShape,
    recursive: bool,
    decide: &mut F,
    out: &mut Vec<Element>,
) -> Result<(), ForestError>
where
    F: FnMut(&Element, ElementShape) -> Adapt,
{
    let children = element.children().ok_or(ForestError::LevelTooDeep {
        level: element.level().saturating_add(1),
        max: MAX_LEVEL,
    })?;
    for child in &children {
        if recursive && decide(child, shape) == Adapt::Refine {
            refine_into(child, shape, recursive, decide, out)?;
        } else {
            out.push(*child);
        }
    }
    Ok(())
}

/// Global index range `[start, end)` owned by `rank`
fn owned_range(total: u64, rank: usize, size: usize) -> (u64, u64) {
    let bound = |r: usize| (u128::from(total) * r as u128 / size as u128) as u64;
    (bound(rank), bound(rank + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::tests::volume;
    use forestmark_comm::SelfComm;

    fn hypercube() -> Arc<CoarseMesh> {
        Arc::new(CoarseMesh::hybrid_hypercube())
    }

    #[test]
    fn owned_ranges_cover_everything() {
        let ranges: Vec<_> = (0..3).map(|r| owned_range(10, r, 3)).collect();
        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 10)]);
        assert_eq!(owned_range(2, 2, 4), (1, 1));
    }

    #[test]
    fn uniform_counts() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(hypercube(), 2, &comm).unwrap();
        assert_eq!(forest.global_num_elements(), 16 * 64);
        assert_eq!(forest.local_num_elements(), 16 * 64);
        assert_eq!(forest.global_offset(), 0);
        assert!(forest.elements().iter().all(|e| e.level() == 2));
    }

    #[test]
    fn uniform_rejects_deep_levels() {
        let comm = SelfComm::new();
        assert!(matches!(
            Forest::new_uniform(hypercube(), MAX_LEVEL + 1, &comm),
            Err(ForestError::LevelTooDeep { .. })
        ));
        assert!(matches!(
            Forest::new_uniform(Arc::new(CoarseMesh::default()), 0, &comm),
            Err(ForestError::EmptyMesh)
        ));
    }

    #[test]
    fn level_zero_vertex_total() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(hypercube(), 0, &comm).unwrap();
        assert_eq!(forest.local_num_vertices(), 4 * 8 + 6 * 6 + 6 * 4);
    }

    #[test]
    fn non_recursive_adapt_refines_once() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(hypercube(), 0, &comm).unwrap();
        let mut calls = 0;
        let adapted = forest
            .adapt(&comm, false, |_, _| {
                calls += 1;
                Adapt::Refine
            })
            .unwrap();
        assert_eq!(calls, 16);
        assert_eq!(adapted.global_num_elements(), 128);
        assert!(adapted.elements().iter().all(|e| e.level() == 1));
    }

    #[test]
    fn recursive_adapt_follows_callback() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(hypercube(), 0, &comm).unwrap();
        let adapted = forest
            .adapt(&comm, true, |e, _| {
                if e.level() < 2 {
                    Adapt::Refine
                } else {
                    Adapt::Keep
                }
            })
            .unwrap();
        assert_eq!(adapted.global_num_elements(), 16 * 64);
    }

    #[test]
    fn adapt_keeps_depth_first_order() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(hypercube(), 0, &comm).unwrap();
        let adapted = forest
            .adapt(&comm, false, |e, _| {
                if e.tree() == 0 {
                    Adapt::Refine
                } else {
                    Adapt::Keep
                }
            })
            .unwrap();
        assert_eq!(adapted.local_num_elements(), 8 + 15);
        let head: Vec<_> = adapted.elements()[..9].iter().map(|e| (e.tree(), e.level())).collect();
        assert!(head[..8].iter().all(|&(tree, level)| tree == 0 && level == 1));
        assert_eq!(head[8], (1, 0));
    }

    #[test]
    fn refined_geometry_preserves_volume() {
        let comm = SelfComm::new();
        let forest = Forest::new_uniform(hypercube(), 2, &comm).unwrap();
        let total: f64 = forest
            .elements()
            .iter()
            .map(|e| volume(forest.shape_of(e), &forest.vertices_of(e)))
            .sum();
        assert!((total - 1.0).abs() < 1e-9, "total volume {total}");
    }
}
