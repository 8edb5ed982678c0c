use anyhow::ensure;

use crate::types::{
    Result,
    Vector,
};


/// A real function sampled on an ordered 1-D mesh.
///
/// The running trapezoidal integral is computed once at construction; the
/// object is immutable afterwards, so downstream consumers never observe a
/// half-updated field.
#[derive(Clone, Debug, PartialEq)]
pub struct Function1D {
    mesh:     Vector<f64>,
    values:   Vector<f64>,
    integral: Vector<f64>,
}

impl Function1D {
    /// Fails if the lengths differ or the mesh is not monotonically
    /// non-decreasing.
    pub fn new(mesh: Vector<f64>, values: Vector<f64>) -> Result<Self> {
        ensure!(mesh.len() == values.len(),
                "mesh and values have different lengths: {} vs {}",
                mesh.len(), values.len());
        ensure!(mesh.windows(2).into_iter().all(|w| w[0] <= w[1]),
                "mesh is not monotonically non-decreasing");

        let integral = Self::cumtrapz(&mesh, &values);
        Ok(Self { mesh, values, integral })
    }

    fn cumtrapz(mesh: &Vector<f64>, values: &Vector<f64>) -> Vector<f64> {
        let mut acc = Vector::<f64>::zeros(mesh.len());
        for i in 1 .. mesh.len() {
            acc[i] = acc[i-1] + 0.5 * (values[i] + values[i-1]) * (mesh[i] - mesh[i-1]);
        }
        acc
    }

    pub fn len(&self) -> usize { self.mesh.len() }
    pub fn is_empty(&self) -> bool { self.mesh.is_empty() }

    pub fn mesh(&self) -> &Vector<f64> { &self.mesh }
    pub fn values(&self) -> &Vector<f64> { &self.values }

    /// The running integral as a function on the same mesh.
    pub fn integral(&self) -> Function1D {
        Self {
            mesh:     self.mesh.clone(),
            values:   self.integral.clone(),
            integral: Self::cumtrapz(&self.mesh, &self.integral),
        }
    }

    /// Final value of the running integral, i.e. the integral over the whole
    /// mesh.
    pub fn total_integral(&self) -> f64 {
        self.integral.last().copied().unwrap_or(0.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(Function1D::new(arr1(&[0.0, 1.0]), arr1(&[1.0])).is_err());
    }

    #[test]
    fn test_non_monotonic_mesh_rejected() {
        assert!(Function1D::new(arr1(&[0.0, 2.0, 1.0]), arr1(&[1.0, 1.0, 1.0])).is_err());
    }

    #[test]
    fn test_trapezoidal_running_sum() {
        let f = Function1D::new(arr1(&[0.0, 1.0, 2.0]), arr1(&[1.0, 1.0, 1.0])).unwrap();
        let int = f.integral();
        assert_eq!(int.len(), 3);
        assert_eq!(int.values().to_vec(), vec![0.0, 1.0, 2.0]);
        assert_abs_diff_eq!(f.total_integral(), 2.0);
    }

    #[test]
    fn test_integral_monotonic_for_nonnegative_values() {
        let mesh = Vector::linspace(-1.0, 1.0, 101);
        let values = mesh.mapv(|x: f64| x.cos().abs());
        let f = Function1D::new(mesh, values).unwrap();

        let int = f.integral();
        assert_eq!(int.len(), f.len());
        assert!(int.values().windows(2).into_iter().all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_uneven_mesh_spacing() {
        let f = Function1D::new(arr1(&[0.0, 1.0, 3.0]), arr1(&[2.0, 2.0, 2.0])).unwrap();
        assert_eq!(f.integral().values().to_vec(), vec![0.0, 2.0, 6.0]);
    }
}
