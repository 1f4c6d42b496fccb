use crate::assembly::buffers::LocalBuffers;
use crate::assembly::local::{DofMap, QuadratureIntegrator};
use crate::sample::IntegratorCategory;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorView, DVectorViewMut, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Extracts the local state `local[a] = orientations[a] * global[dofs[a]]`.
pub fn gather_global_to_local<'a, 'b, T: Real>(
    global: impl Into<DVectorView<'a, T>>,
    local: impl Into<DVectorViewMut<'b, T>>,
    dofs: &[usize],
    orientations: &[T],
) {
    let global = global.into();
    let mut local = local.into();
    assert_eq!(dofs.len(), local.len());
    assert_eq!(dofs.len(), orientations.len());
    for (a, (&dof, &sign)) in dofs.iter().zip(orientations).enumerate() {
        local[a] = sign * global[dof];
    }
}

/// Deposits a local vector as `global[dofs[a]] += orientations[a] * local[a]`.
pub fn scatter_local_to_global<'a, 'b, T: Real>(
    local: impl Into<DVectorView<'a, T>>,
    global: impl Into<DVectorViewMut<'b, T>>,
    dofs: &[usize],
    orientations: &[T],
) {
    let local = local.into();
    let mut global = global.into();
    assert_eq!(dofs.len(), local.len());
    assert_eq!(dofs.len(), orientations.len());
    for (a, (&dof, &sign)) in dofs.iter().zip(orientations).enumerate() {
        global[dof] += sign * local[a];
    }
}

/// Adds the full-order vector $F(u)$ of one integrator to `output`, using every quadrature point of
/// the given locations with its reference weight.
///
/// # Panics
///
/// Panics if `u` or `output` does not have length `space.num_dofs()`.
pub fn assemble_full_vector<'a, 'b, T, S, I>(
    output: impl Into<DVectorViewMut<'b, T>>,
    space: &S,
    integrator: &I,
    category: IntegratorCategory,
    locations: &[usize],
    u: impl Into<DVectorView<'a, T>>,
) -> eyre::Result<()>
where
    T: Real,
    S: ?Sized + DofMap<T>,
    I: ?Sized + QuadratureIntegrator<T>,
{
    let mut output = output.into();
    let u = u.into();
    assert_eq!(output.len(), space.num_dofs());
    assert_eq!(u.len(), space.num_dofs());

    let mut buffers = LocalBuffers::default();
    for &location in locations {
        buffers.populate_location(space, category, location);
        let LocalBuffers {
            dofs,
            orientations,
            local_state,
            local_vector,
            ..
        } = &mut buffers;
        gather_global_to_local(&u, &mut *local_state, dofs, orientations);

        for (q, &w) in integrator.quadrature_weights(location).iter().enumerate() {
            local_vector.fill(T::zero());
            integrator.assemble_quadrature_vector(
                location,
                q,
                w,
                DVectorView::from(&*local_state),
                DVectorViewMut::from(&mut *local_vector),
            )?;
            scatter_local_to_global(&*local_vector, &mut output, dofs, orientations);
        }
    }
    Ok(())
}

/// An assembler for the sparse full-order Jacobian of an integrator.
#[derive(Debug)]
pub struct CsrAssembler<T: Scalar> {
    // All members are buffers that help prevent unnecessary allocations
    // when assembling multiple matrices with the same assembler
    workspace: RefCell<LocalBuffers<T>>,
}

impl<T: Real> Default for CsrAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(LocalBuffers::default()),
        }
    }
}

impl<T: Real> CsrAssembler<T> {
    /// Computes the sparsity pattern coupling all dofs that share a location.
    pub fn assemble_pattern<S>(&self, space: &S, category: IntegratorCategory, locations: &[usize]) -> SparsityPattern
    where
        S: ?Sized + DofMap<T>,
    {
        // By collecting into a BTreeSet we store each matrix entry exactly once, already sorted
        let ws = &mut *self.workspace.borrow_mut();
        let mut matrix_entries = BTreeSet::new();
        for &location in locations {
            ws.populate_location(space, category, location);
            for &i in &ws.dofs {
                for &j in &ws.dofs {
                    matrix_entries.insert((i, j));
                }
            }
        }

        let num_rows = space.num_dofs();
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(matrix_entries.len());

        offsets.push(0);
        for (i, j) in matrix_entries {
            while i + 1 > offsets.len() {
                // Run in a loop to correctly handle consecutive empty rows
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }

        // Fill out the remaining offsets if the last rows are empty
        while offsets.len() < (num_rows + 1) {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
            .expect("Entries collected from a sorted set always form a valid pattern")
    }

    /// Assembles the Jacobian $\partial F / \partial u$ of one integrator over the given locations.
    pub fn assemble_jacobian<'a, S, I>(
        &self,
        space: &S,
        integrator: &I,
        category: IntegratorCategory,
        locations: &[usize],
        u: impl Into<DVectorView<'a, T>>,
    ) -> eyre::Result<CsrMatrix<T>>
    where
        S: ?Sized + DofMap<T>,
        I: ?Sized + QuadratureIntegrator<T>,
    {
        let pattern = self.assemble_pattern(space, category, locations);
        let initial_values = vec![T::zero(); pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_values)
            .expect("Number of values matches the pattern by construction");
        self.assemble_jacobian_into(&mut matrix, space, integrator, category, locations, u)?;
        Ok(matrix)
    }

    /// Adds the Jacobian of one integrator to a matrix whose pattern contains all couplings of the
    /// given locations.
    ///
    /// # Panics
    ///
    /// Panics if an entry is missing from the pattern of `csr`.
    pub fn assemble_jacobian_into<'a, S, I>(
        &self,
        csr: &mut CsrMatrix<T>,
        space: &S,
        integrator: &I,
        category: IntegratorCategory,
        locations: &[usize],
        u: impl Into<DVectorView<'a, T>>,
    ) -> eyre::Result<()>
    where
        S: ?Sized + DofMap<T>,
        I: ?Sized + QuadratureIntegrator<T>,
    {
        let u = u.into();
        assert_eq!(u.len(), space.num_dofs());
        // Reuse previously allocated buffers
        let ws = &mut *self.workspace.borrow_mut();

        for &location in locations {
            ws.populate_location(space, category, location);
            ws.zero_local_matrix();
            let LocalBuffers {
                dofs,
                orientations,
                local_state,
                local_matrix,
                ..
            } = &mut *ws;
            gather_global_to_local(&u, &mut *local_state, dofs, orientations);

            for (q, &w) in integrator.quadrature_weights(location).iter().enumerate() {
                integrator.assemble_quadrature_gradient(
                    location,
                    q,
                    w,
                    DVectorView::from(&*local_state),
                    DMatrixViewMut::from(&mut *local_matrix),
                )?;
            }

            for (a, &row_dof) in dofs.iter().enumerate() {
                let mut csr_row = csr.row_mut(row_dof);
                let (column_indices, values) = csr_row.cols_and_values_mut();
                for (b, &col_dof) in dofs.iter().enumerate() {
                    let idx = column_indices
                        .binary_search(&col_dof)
                        .expect("Could not find column index associated with dof in CSR row");
                    values[idx] += orientations[a] * orientations[b] * local_matrix[(a, b)];
                }
            }
        }

        Ok(())
    }
}
