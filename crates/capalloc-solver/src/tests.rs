// Comprehensive integration tests for solver

#[cfg(test)]
mod tests {
    use crate::*;
    use nalgebra::{DMatrix, DVector};
    use std::collections::BTreeMap;

    fn free_meta(n: usize) -> Vec<VarMeta> {
        (0..n).map(VarMeta::Free).collect()
    }

    #[test]
    fn test_qp_model_validation() {
        let model = QpModel::new(
            DMatrix::identity(2, 2),
            DVector::from_vec(vec![0.0, 0.0]),
            DMatrix::identity(2, 2),
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 1.0]),
            free_meta(2),
        );

        assert!(model.validate().is_ok());
        assert_eq!(model.num_vars(), 2);
        assert_eq!(model.num_constraints(), 2);
    }

    #[test]
    fn test_invalid_dimensions() {
        let model = QpModel::new(
            DMatrix::identity(1, 1), // Wrong size
            DVector::from_vec(vec![0.0, 0.0]),
            DMatrix::identity(2, 2),
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 1.0]),
            free_meta(2),
        );
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_inverted_row_bounds_rejected() {
        let model = QpModel::new(
            DMatrix::identity(1, 1),
            DVector::zeros(1),
            DMatrix::identity(1, 1),
            DVector::from_element(1, 1.0),
            DVector::from_element(1, 0.0),
            free_meta(1),
        );
        assert!(model.validate().is_err());
        assert!(ClarabelSolver::new().solve_qp(&model).is_err());
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![
            QpConstraint::eq(BTreeMap::from([(0, 1.0), (1, 1.0)]), 1.0),
            QpConstraint::bound(1, 0.0, f64::INFINITY),
        ];
        let model = QpModel::from_rows(DMatrix::zeros(2, 2), DVector::zeros(2), &rows, free_meta(2)).unwrap();
        assert_eq!(model.a[(0, 1)], 1.0);
        assert!(model.is_equality_row(0));
        assert!(!model.is_equality_row(1));

        let bad = vec![QpConstraint::bound(5, 0.0, 1.0)];
        assert!(QpModel::from_rows(DMatrix::zeros(2, 2), DVector::zeros(2), &bad, free_meta(2)).is_err());
    }

    #[test]
    fn test_simple_qp() {
        // minimize x^2 + y^2 + x + y subject to x, y >= 0 -> origin
        let model = QpModel::new(
            DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 2.0])),
            DVector::from_vec(vec![1.0, 1.0]),
            DMatrix::identity(2, 2),
            DVector::from_element(2, 0.0),
            DVector::from_element(2, f64::INFINITY),
            free_meta(2),
        );
        let solution = ClarabelSolver::new().solve_qp(&model).unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert!(solution.x[0].abs() < 1e-6, "x[0] = {}", solution.x[0]);
        assert!(solution.x[1].abs() < 1e-6, "x[1] = {}", solution.x[1]);
        // Both lower bounds active with multiplier equal to the gradient
        assert!((solution.y[0] - 1.0).abs() < 1e-6, "y[0] = {}", solution.y[0]);
        assert!((solution.y[1] - 1.0).abs() < 1e-6, "y[1] = {}", solution.y[1]);
    }

    #[test]
    fn test_upper_bound_dual_sign() {
        // minimize -x subject to x <= 3: multiplier on the upper bound is -1
        let model = QpModel::new(
            DMatrix::zeros(1, 1),
            DVector::from_element(1, -1.0),
            DMatrix::identity(1, 1),
            DVector::from_element(1, f64::NEG_INFINITY),
            DVector::from_element(1, 3.0),
            free_meta(1),
        );
        let solution = ClarabelSolver::new().solve_qp(&model).unwrap();
        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.x[0] - 3.0).abs() < 1e-6);
        assert!((solution.y[0] + 1.0).abs() < 1e-6, "y = {}", solution.y[0]);
    }

    #[test]
    fn test_equality_row_dual() {
        // maximize 2x + y subject to x + y = 1, 0 <= x, y <= 1 -> x = 1, y = 0
        let rows = vec![
            QpConstraint::eq(BTreeMap::from([(0, 1.0), (1, 1.0)]), 1.0),
            QpConstraint::bound(0, 0.0, 1.0),
            QpConstraint::bound(1, 0.0, 1.0),
        ];
        let model = QpModel::from_rows(
            DMatrix::zeros(2, 2),
            DVector::from_vec(vec![-2.0, -1.0]),
            &rows,
            free_meta(2),
        )
        .unwrap();
        let solution = ClarabelSolver::new().solve_qp(&model).unwrap();

        assert!(solution.status.is_usable());
        assert!((solution.x[0] - 1.0).abs() < 1e-6);
        assert!(solution.x[1].abs() < 1e-6);
        assert!((solution.objective + 2.0).abs() < 1e-6);

        // Stationarity: q = A^T y
        let residual = &model.q - model.a.transpose() * DVector::from_vec(solution.y.clone());
        assert!(residual.amax() < 1e-6, "residual = {}", residual);
    }

    #[test]
    fn test_constrained_qp() {
        // minimize 0.5|x|^2 - 2x0 - x1 subject to x0 + x1 <= 1, x >= 0 -> [1, 0]
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let model = QpModel::new(
            DMatrix::identity(2, 2),
            DVector::from_vec(vec![-2.0, -1.0]),
            a,
            DVector::from_vec(vec![0.0, 0.0, f64::NEG_INFINITY]),
            DVector::from_vec(vec![f64::INFINITY, f64::INFINITY, 1.0]),
            free_meta(2),
        );
        let solution = ClarabelSolver::new().solve_qp(&model).unwrap();

        assert_eq!(solution.status, QpStatus::Optimal);
        assert!((solution.x[0] - 1.0).abs() < 1e-4, "x[0] = {}", solution.x[0]);
        assert!(solution.x[1].abs() < 1e-4, "x[1] = {}", solution.x[1]);
        assert!((model.objective(&solution.x) - solution.objective).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_qp() {
        // x >= 1 and x + 0 <= 0 on separate rows
        let a = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let model = QpModel::new(
            DMatrix::identity(1, 1),
            DVector::zeros(1),
            a,
            DVector::from_vec(vec![1.0, f64::NEG_INFINITY]),
            DVector::from_vec(vec![f64::INFINITY, 0.0]),
            free_meta(1),
        );
        let solution = ClarabelSolver::new().solve_qp(&model).unwrap();
        assert_eq!(solution.status, QpStatus::PrimalInfeasible);
        assert!(!solution.status.is_usable());
    }
}
