//! Index-based triangle connectivity.
//!
//! Vertices and triangles live in flat arrays and are referred to by their
//! position. Deleting entities is a two step affair: the engine marks them
//! dead and [`Connectivity::compact`] squeezes the arrays afterwards, handing
//! back the old-to-new index maps so that per-vertex and per-triangle side
//! arrays can follow.
//!
//! Conventions:
//! - `triangle_vertices[t]` is counter-clockwise.
//! - `triangle_neighbors[t][i]` is the triangle across edge
//!   `(triangle_vertices[t][i], triangle_vertices[t][(i + 1) % 3])`, or `None`
//!   on the hull.
//! - `segments` are constrained edges; every segment is an edge of the mesh.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::predicates::{ExactPredicates, Predicates};
use crate::mesh_error::MeshError;
use hashbrown::{HashMap, HashSet};

/// Triangle mesh stored as plain index arenas.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Connectivity {
    pub vertex_coordinates: Vec<[f64; 2]>,
    pub triangle_vertices: Vec<[usize; 3]>,
    pub triangle_neighbors: Vec<[Option<usize>; 3]>,
    pub segments: Vec<[usize; 2]>,
}

/// Old-to-new index maps produced by [`Connectivity::compact`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompactionMap {
    pub vertex: Vec<Option<usize>>,
    pub triangle: Vec<Option<usize>>,
}

/// Triangles incident to a vertex, in counter-clockwise order.
///
/// For an open star (vertex on the hull) the first triangle is the one whose
/// clockwise side is on the hull and the last the one whose counter-clockwise
/// side is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Star {
    pub vertex: usize,
    pub triangles: Vec<usize>,
    /// Position of `vertex` inside each triangle of `triangles`.
    pub local: Vec<usize>,
    pub closed: bool,
}

#[inline]
pub(crate) fn next(i: usize) -> usize {
    (i + 1) % 3
}

#[inline]
pub(crate) fn prev(i: usize) -> usize {
    (i + 2) % 3
}

#[inline]
pub(crate) fn edge_key(a: usize, b: usize) -> [usize; 2] {
    if a < b { [a, b] } else { [b, a] }
}

/// Moves the live entries of `values` to the front, preserving order, and
/// drops the rest.
pub fn retain_live<T>(values: &mut Vec<T>, dead: &[bool]) {
    let mut i = 0;
    values.retain(|_| {
        let keep = !dead[i];
        i += 1;
        keep
    });
}

fn index_map(dead: &[bool]) -> Vec<Option<usize>> {
    let mut next_index = 0;
    dead.iter()
        .map(|&d| {
            if d {
                None
            } else {
                next_index += 1;
                Some(next_index - 1)
            }
        })
        .collect()
}

impl Star {
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Vertices adjacent to the star centre, counter-clockwise.
    ///
    /// A closed star of `k` triangles has `k` link vertices, an open one
    /// `k + 1`, the first and last of which are on the hull.
    pub fn link(&self, connectivity: &Connectivity) -> Vec<usize> {
        let mut link: Vec<usize> = self
            .triangles
            .iter()
            .zip(&self.local)
            .map(|(&t, &i)| connectivity.triangle_vertices[t][next(i)])
            .collect();
        if !self.closed {
            if let (Some(&t), Some(&i)) = (self.triangles.last(), self.local.last()) {
                link.push(connectivity.triangle_vertices[t][prev(i)]);
            }
        }
        link
    }
}

impl Connectivity {
    /// Builds a mesh from coordinates, triangles and constrained segments.
    ///
    /// Triangles are reoriented counter-clockwise and adjacency is derived
    /// from shared edges.
    ///
    /// # Errors
    /// Out-of-range indices, non-finite coordinates, degenerate triangles,
    /// edges used by more than two triangles and segments that are not mesh
    /// edges.
    pub fn new(
        vertex_coordinates: Vec<[f64; 2]>,
        mut triangle_vertices: Vec<[usize; 3]>,
        segments: Vec<[usize; 2]>,
    ) -> Result<Self, MeshError> {
        let n_vertex = vertex_coordinates.len();
        if let Some(v) = vertex_coordinates
            .iter()
            .position(|p| !(p[0].is_finite() && p[1].is_finite()))
        {
            return Err(MeshError::InvalidGeometry(format!(
                "vertex {v} has non-finite coordinates {:?}",
                vertex_coordinates[v]
            )));
        }
        let predicates = ExactPredicates;
        for (t, tv) in triangle_vertices.iter_mut().enumerate() {
            for &vertex in tv.iter() {
                if vertex >= n_vertex {
                    return Err(MeshError::VertexOutOfRange {
                        triangle: t,
                        vertex,
                        n_vertex,
                    });
                }
            }
            let [a, b, c] = tv.map(|v| vertex_coordinates[v]);
            let o = predicates.orient2d(a, b, c);
            if o == 0.0 {
                return Err(MeshError::InvalidGeometry(format!(
                    "triangle {t} {tv:?} is degenerate"
                )));
            }
            if o < 0.0 {
                tv.swap(1, 2);
            }
        }
        for (s, seg) in segments.iter().enumerate() {
            for &vertex in seg {
                if vertex >= n_vertex {
                    return Err(MeshError::SegmentOutOfRange {
                        segment: s,
                        vertex,
                        n_vertex,
                    });
                }
            }
        }

        let mut mesh = Self {
            vertex_coordinates,
            triangle_neighbors: vec![[None; 3]; triangle_vertices.len()],
            triangle_vertices,
            segments,
        };
        mesh.rebuild_neighbors()?;
        mesh.check_segments_are_edges()?;
        Ok(mesh)
    }

    pub fn n_vertex(&self) -> usize {
        self.vertex_coordinates.len()
    }

    pub fn n_triangle(&self) -> usize {
        self.triangle_vertices.len()
    }

    pub fn triangle_coordinates(&self, t: usize) -> [[f64; 2]; 3] {
        self.triangle_vertices[t].map(|v| self.vertex_coordinates[v])
    }

    /// Position of `vertex` inside triangle `t`.
    ///
    /// # Errors
    /// [`MeshError::TriangleOutOfRange`] for an unknown `t`,
    /// [`MeshError::VertexNotInTriangle`] when `vertex` is not a corner.
    pub fn local_index(&self, t: usize, vertex: usize) -> Result<usize, MeshError> {
        let corners = self
            .triangle_vertices
            .get(t)
            .ok_or(MeshError::TriangleOutOfRange {
                triangle: t,
                n_triangle: self.n_triangle(),
            })?;
        corners
            .iter()
            .position(|&v| v == vertex)
            .ok_or(MeshError::VertexNotInTriangle {
                vertex,
                triangle: t,
            })
    }

    /// Recomputes `triangle_neighbors` from shared edges.
    pub fn rebuild_neighbors(&mut self) -> Result<(), MeshError> {
        let mut edges: HashMap<(usize, usize), (usize, usize)> =
            HashMap::with_capacity(3 * self.n_triangle());
        for (t, tv) in self.triangle_vertices.iter().enumerate() {
            for i in 0..3 {
                let (a, b) = (tv[i], tv[next(i)]);
                if edges.insert((a, b), (t, i)).is_some() {
                    return Err(MeshError::NonManifoldEdge(a, b));
                }
            }
        }
        let mut neighbors = vec![[None; 3]; self.n_triangle()];
        for (&(a, b), &(t, i)) in &edges {
            neighbors[t][i] = edges.get(&(b, a)).map(|&(n, _)| n);
        }
        self.triangle_neighbors = neighbors;
        Ok(())
    }

    /// Normalised (`[min, max]`) set of constrained edges.
    pub fn segment_set(&self) -> HashSet<[usize; 2]> {
        self.segments.iter().map(|s| edge_key(s[0], s[1])).collect()
    }

    fn check_segments_are_edges(&self) -> Result<(), MeshError> {
        let edges: HashSet<[usize; 2]> = self
            .triangle_vertices
            .iter()
            .flat_map(|tv| (0..3).map(move |i| edge_key(tv[i], tv[next(i)])))
            .collect();
        for (s, seg) in self.segments.iter().enumerate() {
            if !edges.contains(&edge_key(seg[0], seg[1])) {
                return Err(MeshError::InvalidGeometry(format!(
                    "segment {s} {seg:?} is not an edge of the mesh"
                )));
            }
        }
        Ok(())
    }

    /// Collects the star of `vertex`, starting from `seed`.
    ///
    /// # Errors
    /// [`MeshError::TriangleOutOfRange`] for an unknown `seed`,
    /// [`MeshError::VertexNotInTriangle`] when `seed` does not contain
    /// `vertex`, [`MeshError::CorruptStar`] when the walk exceeds `capacity`
    /// triangles (the adjacency loops without returning to `seed`).
    pub fn star(&self, vertex: usize, seed: usize, capacity: usize) -> Result<Star, MeshError> {
        let mut triangles = vec![seed];
        let mut local = vec![self.local_index(seed, vertex)?];

        let mut closed = false;
        let mut cur = self.triangle_neighbors[seed][prev(local[0])];
        while let Some(t) = cur {
            if t == seed {
                closed = true;
                break;
            }
            if triangles.len() >= capacity {
                return Err(MeshError::CorruptStar {
                    vertex,
                    steps: triangles.len(),
                });
            }
            let i = self.local_index(t, vertex)?;
            triangles.push(t);
            local.push(i);
            cur = self.triangle_neighbors[t][prev(i)];
        }

        if !closed {
            let mut cw = Vec::new();
            let mut cw_local = Vec::new();
            let mut cur = self.triangle_neighbors[seed][local[0]];
            while let Some(t) = cur {
                if triangles.len() + cw.len() >= capacity || t == seed {
                    return Err(MeshError::CorruptStar {
                        vertex,
                        steps: triangles.len() + cw.len(),
                    });
                }
                let i = self.local_index(t, vertex)?;
                cw.push(t);
                cw_local.push(i);
                cur = self.triangle_neighbors[t][i];
            }
            cw.reverse();
            cw_local.reverse();
            cw.extend(triangles);
            cw_local.extend(local);
            triangles = cw;
            local = cw_local;
        }

        Ok(Star {
            vertex,
            triangles,
            local,
            closed,
        })
    }

    /// Removes dead vertices and triangles, renumbering the survivors in
    /// their original order.
    ///
    /// Adjacency pointing at a dead triangle becomes `None`; segments with a
    /// dead endpoint are dropped.
    pub fn compact(&mut self, dead_vertices: &[bool], dead_triangles: &[bool]) -> CompactionMap {
        let vertex = index_map(dead_vertices);
        let triangle = index_map(dead_triangles);

        retain_live(&mut self.vertex_coordinates, dead_vertices);
        retain_live(&mut self.triangle_vertices, dead_triangles);
        retain_live(&mut self.triangle_neighbors, dead_triangles);

        for tv in &mut self.triangle_vertices {
            for v in tv.iter_mut() {
                debug_assert!(vertex[*v].is_some(), "live triangle uses dead vertex {v}");
                *v = vertex[*v].unwrap_or(*v);
            }
        }
        for tn in &mut self.triangle_neighbors {
            for n in tn.iter_mut() {
                *n = n.and_then(|old| triangle[old]);
            }
        }
        self.segments = self
            .segments
            .iter()
            .filter_map(|s| Some([vertex[s[0]]?, vertex[s[1]]?]))
            .collect();

        CompactionMap { vertex, triangle }
    }
}

impl DebugInvariants for Connectivity {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Connectivity");
    }

    /// Checks index ranges, distinct corners, symmetric adjacency and that
    /// no directed edge is used twice.
    fn validate_invariants(&self) -> Result<(), MeshError> {
        let n_vertex = self.n_vertex();
        let n_triangle = self.n_triangle();
        if self.triangle_neighbors.len() != n_triangle {
            return Err(MeshError::InvalidGeometry(format!(
                "{} neighbour triples for {n_triangle} triangles",
                self.triangle_neighbors.len()
            )));
        }
        let mut directed = HashSet::with_capacity(3 * n_triangle);
        for (t, tv) in self.triangle_vertices.iter().enumerate() {
            for &vertex in tv {
                if vertex >= n_vertex {
                    return Err(MeshError::VertexOutOfRange {
                        triangle: t,
                        vertex,
                        n_vertex,
                    });
                }
            }
            if tv[0] == tv[1] || tv[1] == tv[2] || tv[2] == tv[0] {
                return Err(MeshError::InvalidGeometry(format!(
                    "triangle {t} has repeated corners {tv:?}"
                )));
            }
            for i in 0..3 {
                let (a, b) = (tv[i], tv[next(i)]);
                if !directed.insert((a, b)) {
                    return Err(MeshError::NonManifoldEdge(a, b));
                }
                let Some(neighbor) = self.triangle_neighbors[t][i] else {
                    continue;
                };
                if neighbor >= n_triangle {
                    return Err(MeshError::NeighborOutOfRange {
                        triangle: t,
                        edge: i,
                        neighbor,
                        n_triangle,
                    });
                }
                let nv = self.triangle_vertices[neighbor];
                let back = (0..3).find(|&j| nv[j] == b && nv[next(j)] == a);
                match back {
                    Some(j) if self.triangle_neighbors[neighbor][j] == Some(t) => {}
                    _ => {
                        return Err(MeshError::AsymmetricAdjacency {
                            triangle: t,
                            edge: i,
                            neighbor,
                        });
                    }
                }
            }
        }
        for (s, seg) in self.segments.iter().enumerate() {
            for &vertex in seg {
                if vertex >= n_vertex {
                    return Err(MeshError::SegmentOutOfRange {
                        segment: s,
                        vertex,
                        n_vertex,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hexagon fan around vertex 0 plus one extra triangle on the outside.
    fn hexagon() -> Connectivity {
        let mut coords = vec![[0.0, 0.0]];
        for k in 0..6 {
            let a = std::f64::consts::PI / 3.0 * f64::from(k);
            coords.push([a.cos(), a.sin()]);
        }
        coords.push([2.0, 0.5]);
        let mut tris: Vec<[usize; 3]> = (0..6).map(|k| [0, 1 + k, 1 + (k + 1) % 6]).collect();
        tris.push([1, 2, 7]);
        Connectivity::new(coords, tris, vec![[1, 7]]).unwrap()
    }

    #[test]
    fn new_orients_and_links() {
        let mesh = hexagon();
        mesh.validate_invariants().unwrap();
        // [1, 2, 7] is clockwise and gets flipped.
        assert_eq!(mesh.triangle_vertices[6], [1, 7, 2]);
        assert_eq!(mesh.triangle_neighbors[0][1], Some(6));
    }

    #[test]
    fn closed_star_walk() {
        let mesh = hexagon();
        let star = mesh.star(0, 3, 16).unwrap();
        assert!(star.closed);
        assert_eq!(star.triangles, vec![3, 4, 5, 0, 1, 2]);
        assert_eq!(star.link(&mesh), vec![4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn open_star_walk() {
        let mesh = hexagon();
        let star = mesh.star(1, 6, 16).unwrap();
        assert!(!star.closed);
        assert_eq!(star.triangles, vec![6, 0, 5]);
        assert_eq!(star.link(&mesh), vec![7, 2, 0, 6]);
    }

    #[test]
    fn star_capacity_exceeded_is_corruption() {
        let mesh = hexagon();
        assert!(matches!(
            mesh.star(0, 0, 3),
            Err(MeshError::CorruptStar { vertex: 0, .. })
        ));
        assert!(matches!(
            mesh.star(7, 0, 3),
            Err(MeshError::VertexNotInTriangle { vertex: 7, triangle: 0 })
        ));
    }

    #[test]
    fn unknown_triangles_are_errors() {
        let mut mesh = hexagon();
        let out_of_range = Err(MeshError::TriangleOutOfRange {
            triangle: 7,
            n_triangle: 7,
        });
        assert_eq!(mesh.local_index(7, 0), out_of_range);
        assert!(matches!(mesh.star(0, 7, 16), Err(MeshError::TriangleOutOfRange { .. })));

        // A dangling neighbour index stops the walk with an error.
        mesh.triangle_neighbors[0][2] = Some(42);
        assert_eq!(
            mesh.star(0, 0, 16).unwrap_err(),
            MeshError::TriangleOutOfRange {
                triangle: 42,
                n_triangle: 7
            }
        );
    }

    #[test]
    fn compaction_renumbers() {
        let mut mesh = hexagon();
        let mut dead_v = vec![false; mesh.n_vertex()];
        let mut dead_t = vec![false; mesh.n_triangle()];
        dead_v[7] = true;
        dead_t[6] = true;
        let map = mesh.compact(&dead_v, &dead_t);
        assert_eq!(map.vertex[7], None);
        assert_eq!(map.triangle[5], Some(5));
        assert_eq!(mesh.n_triangle(), 6);
        assert!(mesh.segments.is_empty());
        assert_eq!(mesh.triangle_neighbors[0][1], None);
        mesh.validate_invariants().unwrap();
    }

    #[test]
    fn asymmetric_adjacency_is_detected() {
        let mut mesh = hexagon();
        mesh.triangle_neighbors[0][2] = Some(3);
        assert!(matches!(
            mesh.validate_invariants(),
            Err(MeshError::AsymmetricAdjacency { triangle: 0, .. })
        ));
    }

    #[test]
    fn bad_input_is_rejected() {
        let coords = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        assert!(matches!(
            Connectivity::new(coords.clone(), vec![[0, 1, 2]], vec![]),
            Err(MeshError::InvalidGeometry(_))
        ));
        assert!(matches!(
            Connectivity::new(coords, vec![[0, 1, 5]], vec![]),
            Err(MeshError::VertexOutOfRange { vertex: 5, .. })
        ));
    }
}
