//! Element shapes and their 1:8 refinement rules

use smallvec::SmallVec;
use std::fmt;

/// Largest vertex count of any supported shape
pub const MAX_VERTICES: usize = 8;

/// Corner coordinates of one element
pub type Vertices = SmallVec<[[f64; 3]; MAX_VERTICES]>;

/// Shape of a tree and of every element refined from it
///
/// All shapes refine into eight children of the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementShape {
    /// Four vertices
    Tetrahedron,
    /// Six vertices: bottom triangle then top triangle
    Prism,
    /// Eight vertices in lexicographic (x fastest) order
    Hexahedron,
}

impl ElementShape {
    /// Number of corner vertices
    #[inline]
    #[must_use]
    pub const fn vertex_count(self) -> usize {
        match self {
            Self::Tetrahedron => 4,
            Self::Prism => 6,
            Self::Hexahedron => 8,
        }
    }

    /// Number of children produced by one refinement
    #[inline]
    #[must_use]
    pub const fn num_children(self) -> usize {
        8
    }

    /// VTK cell type identifier written as the element's shape tag
    #[inline]
    #[must_use]
    pub const fn vtk_type(self) -> i32 {
        match self {
            Self::Tetrahedron => 10,
            Self::Hexahedron => 12,
            Self::Prism => 13,
        }
    }

    /// Corner coordinates of child `child` of an element with corners `parent`
    #[must_use]
    pub fn child_vertices(self, parent: &[[f64; 3]], child: usize) -> Vertices {
        debug_assert_eq!(parent.len(), self.vertex_count());
        debug_assert!(child < self.num_children());
        match self {
            Self::Hexahedron => hex_child(parent, child),
            Self::Prism => prism_child(parent, child),
            Self::Tetrahedron => tet_child(parent, child),
        }
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tetrahedron => write!(f, "tetrahedron"),
            Self::Prism => write!(f, "prism"),
            Self::Hexahedron => write!(f, "hexahedron"),
        }
    }
}

fn bit(value: usize, index: usize) -> f64 {
    if value >> index & 1 == 1 {
        1.0
    } else {
        0.0
    }
}

fn trilinear(corners: &[[f64; 3]], u: f64, v: f64, w: f64) -> [f64; 3] {
    let mut point = [0.0; 3];
    for (k, corner) in corners.iter().enumerate() {
        let weight = (if k & 1 == 1 { u } else { 1.0 - u })
            * (if k & 2 == 2 { v } else { 1.0 - v })
            * (if k & 4 == 4 { w } else { 1.0 - w });
        for axis in 0..3 {
            point[axis] += weight * corner[axis];
        }
    }
    point
}

fn hex_child(parent: &[[f64; 3]], child: usize) -> Vertices {
    (0..8)
        .map(|k| {
            trilinear(
                parent,
                (bit(child, 0) + bit(k, 0)) * 0.5,
                (bit(child, 1) + bit(k, 1)) * 0.5,
                (bit(child, 2) + bit(k, 2)) * 0.5,
            )
        })
        .collect()
}

/// Barycentric corners of the four red-refinement children of a triangle
const TRIANGLE_CHILDREN: [[[f64; 3]; 3]; 4] = [
    [[1.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5]],
    [[0.5, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.5, 0.5]],
    [[0.5, 0.0, 0.5], [0.0, 0.5, 0.5], [0.0, 0.0, 1.0]],
    [[0.5, 0.5, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5]],
];

fn prism_point(parent: &[[f64; 3]], bary: [f64; 3], height: f64) -> [f64; 3] {
    let mut point = [0.0; 3];
    for (corner, weight) in bary.iter().enumerate() {
        for axis in 0..3 {
            point[axis] += weight
                * ((1.0 - height) * parent[corner][axis] + height * parent[corner + 3][axis]);
        }
    }
    point
}

fn prism_child(parent: &[[f64; 3]], child: usize) -> Vertices {
    let triangle = &TRIANGLE_CHILDREN[child & 3];
    let layer = (child >> 2) as f64;
    [layer * 0.5, (layer + 1.0) * 0.5]
        .into_iter()
        .flat_map(|height| triangle.iter().map(move |bary| prism_point(parent, *bary, height)))
        .collect()
}

/// Bey's red refinement: each corner is the midpoint of parent corners `(i, j)`
const TET_CHILDREN: [[(usize, usize); 4]; 8] = [
    [(0, 0), (0, 1), (0, 2), (0, 3)],
    [(0, 1), (1, 1), (1, 2), (1, 3)],
    [(0, 2), (1, 2), (2, 2), (2, 3)],
    [(0, 3), (1, 3), (2, 3), (3, 3)],
    [(0, 1), (0, 2), (0, 3), (1, 3)],
    [(0, 1), (0, 2), (1, 2), (1, 3)],
    [(0, 2), (0, 3), (1, 3), (2, 3)],
    [(0, 2), (1, 2), (1, 3), (2, 3)],
];

fn tet_child(parent: &[[f64; 3]], child: usize) -> Vertices {
    TET_CHILDREN[child]
        .iter()
        .map(|&(i, j)| {
            let (a, b) = (parent[i], parent[j]);
            [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5, (a[2] + b[2]) * 0.5]
        })
        .collect()
}
