use crate::func1d::Function1D;
use crate::types::{
    Result,
    Vector,
};


/// Phonon density of states on a linear frequency mesh.
///
/// The mesh is in eV, values are in states/eV. The integrated DOS is
/// computed once at construction.
#[derive(Clone, Debug)]
pub struct PhononDos {
    dos:  Function1D,
    idos: Function1D,
}

impl PhononDos {
    pub fn new(mesh: Vector<f64>, values: Vector<f64>) -> Result<Self> {
        let dos = Function1D::new(mesh, values)?;
        let idos = dos.integral();
        Ok(Self { dos, idos })
    }

    pub fn dos(&self) -> &Function1D { &self.dos }

    /// Integrated DOS, number of states below each mesh point.
    pub fn idos(&self) -> &Function1D { &self.idos }

    pub fn mesh(&self) -> &Vector<f64> { self.dos.mesh() }
    pub fn values(&self) -> &Vector<f64> { self.dos.values() }

    /// Total number of states over the whole mesh.
    pub fn num_states(&self) -> f64 { self.dos.total_integral() }
}
