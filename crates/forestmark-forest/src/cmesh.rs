//! Coarse meshes: the level-0 trees of a forest

use crate::shape::{ElementShape, Vertices};

/// One level-0 tree
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseTree {
    shape: ElementShape,
    vertices: Vertices,
}

impl CoarseTree {
    /// Create a tree; `vertices` must match the shape's vertex count
    #[must_use]
    pub fn new(shape: ElementShape, vertices: Vertices) -> Self {
        debug_assert_eq!(vertices.len(), shape.vertex_count());
        Self { shape, vertices }
    }

    /// Tree shape
    #[inline]
    #[must_use]
    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    /// Corner coordinates
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }
}

/// The coarse mesh shared by every rank
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoarseMesh {
    trees: Vec<CoarseTree>,
}

impl CoarseMesh {
    /// Create a mesh from trees
    #[must_use]
    pub fn new(trees: Vec<CoarseTree>) -> Self {
        Self { trees }
    }

    /// Unit cube made of 16 trees of three shapes
    ///
    /// The four lower octants are hexahedra, three upper octants are each
    /// split into two prisms along their xy diagonal, and the last octant is
    /// split into six tetrahedra sharing its main diagonal.
    #[must_use]
    pub fn hybrid_hypercube() -> Self {
        const H: f64 = 0.5;
        let at = |origin: [f64; 3], dx: f64, dy: f64, dz: f64| {
            [origin[0] + H * dx, origin[1] + H * dy, origin[2] + H * dz]
        };

        let mut trees = Vec::with_capacity(16);

        for octant in 0..4usize {
            let origin = [H * (octant & 1) as f64, H * (octant >> 1) as f64, 0.0];
            let vertices = (0..8usize)
                .map(|k| at(origin, (k & 1) as f64, (k >> 1 & 1) as f64, (k >> 2) as f64))
                .collect();
            trees.push(CoarseTree::new(ElementShape::Hexahedron, vertices));
        }

        for (ox, oy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            let origin = [H * ox, H * oy, H];
            for base in [[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)], [(0.0, 0.0), (1.0, 1.0), (0.0, 1.0)]] {
                let vertices = [0.0, 1.0]
                    .into_iter()
                    .flat_map(|dz| base.iter().map(move |&(dx, dy)| at(origin, dx, dy, dz)))
                    .collect();
                trees.push(CoarseTree::new(ElementShape::Prism, vertices));
            }
        }

        let origin = [H, H, H];
        for axes in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            let mut corner = [0.0; 3];
            let mut vertices = Vertices::new();
            vertices.push(at(origin, 0.0, 0.0, 0.0));
            for axis in &axes[..2] {
                corner[*axis] = 1.0;
                vertices.push(at(origin, corner[0], corner[1], corner[2]));
            }
            vertices.push(at(origin, 1.0, 1.0, 1.0));
            trees.push(CoarseTree::new(ElementShape::Tetrahedron, vertices));
        }

        Self { trees }
    }

    /// Number of trees
    #[inline]
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Tree by index
    #[inline]
    #[must_use]
    pub fn tree(&self, index: usize) -> Option<&CoarseTree> {
        self.trees.get(index)
    }

    /// All trees in index order
    #[inline]
    pub fn trees(&self) -> impl Iterator<Item = &CoarseTree> {
        self.trees.iter()
    }
}
