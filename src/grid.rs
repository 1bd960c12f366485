//! Rectangular spring grids.
//!
//! An `nx × ny` cell grid has `(nx + 1)(ny + 1)` vertices at integer
//! coordinates, indexed row by row: vertex `(i, j)` is `(nx + 1) j + i`.
//! Each cell contributes its bottom and left edges (rest length 1) and both
//! diagonals (rest length √2); the right-most column and the top row are
//! closed separately.  All stiffnesses are 1.

use crate::element::SpringElement;
use crate::problem::MassSpringProblem;
use crate::types::{HessianStorage, SpringError, CONSTRAINT_WEIGHT};

/// One grid edge `(from, to, stiffness, rest_length)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEdge {
    pub from: usize,
    pub to: usize,
    pub stiffness: f64,
    pub rest_length: f64,
}

/// Which vertices get pinned, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinScenario {
    /// The four corners, pulled to the corners of a rectangle twice the
    /// grid's size.
    Corners,
    /// Every bottom vertex `(i, 0)` to `(i, 0)` and every top vertex
    /// `(i, ny)` to `(i, 2 ny)`.
    BottomAndTop,
}

#[derive(Debug, Clone)]
pub struct SpringGrid {
    nx: usize,
    ny: usize,
    edges: Vec<GridEdge>,
}

impl SpringGrid {
    pub fn new(nx: usize, ny: usize) -> Self {
        let mut grid = Self {
            nx,
            ny,
            edges: Vec::new(),
        };
        let diagonal = std::f64::consts::SQRT_2;
        for j in 0..ny {
            for i in 0..nx {
                grid.push(grid.index(i, j), grid.index(i + 1, j), 1.0);
                grid.push(grid.index(i, j), grid.index(i, j + 1), 1.0);
                grid.push(grid.index(i, j), grid.index(i + 1, j + 1), diagonal);
                grid.push(grid.index(i + 1, j), grid.index(i, j + 1), diagonal);
            }
        }
        for j in 0..ny {
            grid.push(grid.index(nx, j), grid.index(nx, j + 1), 1.0);
        }
        for i in 0..nx {
            grid.push(grid.index(i, ny), grid.index(i + 1, ny), 1.0);
        }
        grid
    }

    fn push(&mut self, from: usize, to: usize, rest_length: f64) {
        self.edges.push(GridEdge {
            from,
            to,
            stiffness: 1.0,
            rest_length,
        });
    }

    /// Vertex index of grid position `(i, j)`.
    pub fn index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i <= self.nx && j <= self.ny);
        (self.nx + 1) * j + i
    }

    pub fn n_vertices(&self) -> usize {
        (self.nx + 1) * (self.ny + 1)
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[GridEdge] {
        &self.edges
    }

    /// Unknown vector with every vertex at its integer grid position.
    pub fn rest_positions(&self) -> Vec<f64> {
        let mut x = vec![0.0; 2 * self.n_vertices()];
        for j in 0..=self.ny {
            for i in 0..=self.nx {
                let v = self.index(i, j);
                x[2 * v] = i as f64;
                x[2 * v + 1] = j as f64;
            }
        }
        x
    }

    /// A problem with one spring per grid edge.
    pub fn build_problem(&self, element: SpringElement, storage: HessianStorage) -> Result<MassSpringProblem, SpringError> {
        let mut problem = MassSpringProblem::new(element, self.n_vertices(), storage);
        for e in &self.edges {
            problem.add_element(e.from, e.to, e.stiffness, e.rest_length)?;
        }
        Ok(problem)
    }

    /// Add the pins of `scenario` with weight [`CONSTRAINT_WEIGHT`].
    pub fn add_pins(&self, problem: &mut MassSpringProblem, scenario: PinScenario) -> Result<(), SpringError> {
        let w = CONSTRAINT_WEIGHT;
        let (nx, ny) = (self.nx, self.ny);
        let (wx, wy) = (2.0 * nx as f64, 2.0 * ny as f64);
        match scenario {
            PinScenario::Corners => {
                problem.add_constraint(self.index(0, 0), w, 0.0, 0.0)?;
                problem.add_constraint(self.index(nx, ny), w, wx, wy)?;
                problem.add_constraint(self.index(nx, 0), w, wx, 0.0)?;
                problem.add_constraint(self.index(0, ny), w, 0.0, wy)?;
            }
            PinScenario::BottomAndTop => {
                for i in 0..=nx {
                    problem.add_constraint(self.index(i, 0), w, i as f64, 0.0)?;
                    problem.add_constraint(self.index(i, ny), w, i as f64, wy)?;
                }
            }
        }
        Ok(())
    }
}
