use eqp::assembly::local::DofMap;
use eqp::sample::IntegratorCategory;

pub const BOTTOM: usize = 1;
pub const RIGHT: usize = 2;
pub const TOP: usize = 3;
pub const LEFT: usize = 4;

/// A uniform grid of `nx x ny` axis-aligned rectangles covering `[0, width] x [0, height]`.
///
/// Elements are numbered `i + nx * j`. Interior faces are numbered with all vertical faces first
/// (normal `+x`), then all horizontal faces (normal `+y`). Boundary faces are numbered bottom,
/// right, top, left, with attributes [`BOTTOM`], [`RIGHT`], [`TOP`] and [`LEFT`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StructuredQuadMesh {
    nx: usize,
    ny: usize,
    width: f64,
    height: f64,
}

/// A face between element `minus` and element `plus`, with normal pointing from minus to plus.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InteriorFace {
    pub minus: usize,
    pub plus: usize,
    pub normal: [f64; 2],
    pub length: f64,
}

impl InteriorFace {
    /// Reference coordinates of the face parameter `s` in the minus and plus elements.
    pub fn reference_points(&self, s: f64) -> ([f64; 2], [f64; 2]) {
        if self.normal[0] > 0.0 {
            ([1.0, s], [-1.0, s])
        } else {
            ([s, 1.0], [s, -1.0])
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundaryFace {
    pub element: usize,
    pub attribute: usize,
    /// Outward normal.
    pub normal: [f64; 2],
    pub length: f64,
}

impl BoundaryFace {
    /// Reference coordinates of the face parameter `s` in the adjacent element.
    pub fn reference_point(&self, s: f64) -> [f64; 2] {
        match self.attribute {
            BOTTOM => [s, -1.0],
            RIGHT => [1.0, s],
            TOP => [s, 1.0],
            _ => [-1.0, s],
        }
    }
}

impl StructuredQuadMesh {
    pub fn new(nx: usize, ny: usize, width: f64, height: f64) -> Self {
        assert!(nx > 0 && ny > 0, "Mesh must have at least one element in each direction.");
        Self { nx, ny, width, height }
    }

    pub fn unit_square(n: usize) -> Self {
        Self::new(n, n, 1.0, 1.0)
    }

    pub fn num_elements(&self) -> usize {
        self.nx * self.ny
    }

    pub fn element_index(&self, i: usize, j: usize) -> usize {
        i + self.nx * j
    }

    pub fn element_size(&self) -> [f64; 2] {
        [self.width / self.nx as f64, self.height / self.ny as f64]
    }

    fn num_vertical_faces(&self) -> usize {
        (self.nx - 1) * self.ny
    }

    pub fn num_interior_faces(&self) -> usize {
        self.num_vertical_faces() + self.nx * (self.ny - 1)
    }

    pub fn interior_face(&self, face: usize) -> InteriorFace {
        let [hx, hy] = self.element_size();
        if face < self.num_vertical_faces() {
            let (i, j) = (face % (self.nx - 1), face / (self.nx - 1));
            InteriorFace {
                minus: self.element_index(i, j),
                plus: self.element_index(i + 1, j),
                normal: [1.0, 0.0],
                length: hy,
            }
        } else {
            let local = face - self.num_vertical_faces();
            let (i, j) = (local % self.nx, local / self.nx);
            InteriorFace {
                minus: self.element_index(i, j),
                plus: self.element_index(i, j + 1),
                normal: [0.0, 1.0],
                length: hx,
            }
        }
    }

    pub fn num_boundary_faces(&self) -> usize {
        2 * (self.nx + self.ny)
    }

    pub fn boundary_face(&self, face: usize) -> BoundaryFace {
        let (nx, ny) = (self.nx, self.ny);
        let [hx, hy] = self.element_size();
        if face < nx {
            BoundaryFace {
                element: self.element_index(face, 0),
                attribute: BOTTOM,
                normal: [0.0, -1.0],
                length: hx,
            }
        } else if face < nx + ny {
            BoundaryFace {
                element: self.element_index(nx - 1, face - nx),
                attribute: RIGHT,
                normal: [1.0, 0.0],
                length: hy,
            }
        } else if face < 2 * nx + ny {
            BoundaryFace {
                element: self.element_index(face - nx - ny, ny - 1),
                attribute: TOP,
                normal: [0.0, 1.0],
                length: hx,
            }
        } else {
            BoundaryFace {
                element: self.element_index(0, face - 2 * nx - ny),
                attribute: LEFT,
                normal: [-1.0, 0.0],
                length: hy,
            }
        }
    }
}

/// Reference nodes of the bilinear quadrilateral.
const NODES: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Values of the four bilinear basis functions at a reference point.
pub fn q1_values(p: [f64; 2]) -> [f64; 4] {
    NODES.map(|[xi, eta]| 0.25 * (1.0 + xi * p[0]) * (1.0 + eta * p[1]))
}

/// Physical gradients of the four bilinear basis functions on an element of the given size.
pub fn q1_gradients(p: [f64; 2], element_size: [f64; 2]) -> [[f64; 2]; 4] {
    let [hx, hy] = element_size;
    NODES.map(|[xi, eta]| {
        [
            0.25 * xi * (1.0 + eta * p[1]) * 2.0 / hx,
            0.25 * eta * (1.0 + xi * p[0]) * 2.0 / hy,
        ]
    })
}

/// A discontinuous bilinear space with four dofs per element.
///
/// Face locations carry the dofs of the minus element followed by those of the plus element.
/// With flipped orientations, every third dof is extracted and deposited with a negative sign,
/// emulating the sign transform of oriented face or edge dofs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DiscontinuousQ1Space {
    mesh: StructuredQuadMesh,
    flip_orientations: bool,
}

impl DiscontinuousQ1Space {
    pub fn new(mesh: StructuredQuadMesh) -> Self {
        Self {
            mesh,
            flip_orientations: false,
        }
    }

    pub fn with_flipped_orientations(self) -> Self {
        Self {
            flip_orientations: true,
            ..self
        }
    }

    pub fn mesh(&self) -> &StructuredQuadMesh {
        &self.mesh
    }

    fn orientation(&self, dof: usize) -> f64 {
        if self.flip_orientations && dof % 3 == 1 {
            -1.0
        } else {
            1.0
        }
    }

    fn populate_element(&self, element: usize, dofs: &mut [usize], orientations: &mut [f64]) {
        for a in 0..4 {
            dofs[a] = 4 * element + a;
            orientations[a] = self.orientation(dofs[a]);
        }
    }
}

impl DofMap<f64> for DiscontinuousQ1Space {
    fn num_dofs(&self) -> usize {
        4 * self.mesh.num_elements()
    }

    fn num_locations(&self, category: IntegratorCategory) -> usize {
        match category {
            IntegratorCategory::Domain => self.mesh.num_elements(),
            IntegratorCategory::InteriorFace => self.mesh.num_interior_faces(),
            IntegratorCategory::BoundaryFace => self.mesh.num_boundary_faces(),
        }
    }

    fn location_dof_count(&self, category: IntegratorCategory, _location: usize) -> usize {
        match category {
            IntegratorCategory::InteriorFace => 8,
            _ => 4,
        }
    }

    fn populate_location_dofs(
        &self,
        category: IntegratorCategory,
        location: usize,
        dofs: &mut [usize],
        orientations: &mut [f64],
    ) {
        match category {
            IntegratorCategory::Domain => self.populate_element(location, dofs, orientations),
            IntegratorCategory::InteriorFace => {
                let face = self.mesh.interior_face(location);
                let (dofs_minus, dofs_plus) = dofs.split_at_mut(4);
                let (orientations_minus, orientations_plus) = orientations.split_at_mut(4);
                self.populate_element(face.minus, dofs_minus, orientations_minus);
                self.populate_element(face.plus, dofs_plus, orientations_plus);
            }
            IntegratorCategory::BoundaryFace => {
                let face = self.mesh.boundary_face(location);
                self.populate_element(face.element, dofs, orientations);
            }
        }
    }

    fn boundary_attribute(&self, face: usize) -> usize {
        self.mesh.boundary_face(face).attribute
    }
}
