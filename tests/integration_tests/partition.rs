use eqp::partition::{PartitionReducer, SinglePartition};
use matrixcompare::assert_matrix_eq;
use std::cell::Cell;
use std::rc::Rc;
use util::fixtures::{deterministic_rng, orthonormal_basis, random_vector, TestProblem};

/// Emulates a run with identical partitions, counting the collective calls.
struct ReplicatedPartitions {
    num_partitions: usize,
    calls: Rc<Cell<usize>>,
}

impl PartitionReducer<f64> for ReplicatedPartitions {
    fn sum_reduce(&self, values: &mut [f64]) {
        self.calls.set(self.calls.get() + 1);
        for value in values {
            *value *= self.num_partitions as f64;
        }
    }
}

#[test]
fn single_partition_leaves_values_untouched() {
    let mut values = [1.0, -2.0, 3.5];
    SinglePartition.sum_reduce(&mut values[..]);
    assert_eq!(values, [1.0, -2.0, 3.5]);
}

#[test]
fn reduced_quantities_are_summed_across_partitions() {
    let mut rng = deterministic_rng();
    let problem = TestProblem::new(2);
    let phi = orthonormal_basis(&mut rng, problem.num_dofs(), 3);
    let x = random_vector(&mut rng, 3);

    let mut single = problem.operator();
    single.set_basis(phi.clone()).unwrap();

    let calls = Rc::new(Cell::new(0));
    let mut replicated = problem.operator().with_partition_reducer(ReplicatedPartitions {
        num_partitions: 3,
        calls: Rc::clone(&calls),
    });
    replicated.set_basis(phi).unwrap();

    let y = replicated.mult(&x).unwrap();
    assert_eq!(calls.get(), 1);
    assert_matrix_eq!(y, 3.0 * single.mult(&x).unwrap(), comp = abs, tol = 1e-14);

    let jacobian = replicated.gradient(&x).unwrap().into_dense();
    assert_eq!(calls.get(), 2);
    assert_matrix_eq!(
        jacobian,
        3.0 * single.gradient(&x).unwrap().into_dense(),
        comp = abs,
        tol = 1e-14
    );
}
