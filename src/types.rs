use std::f64::consts::PI;

use anyhow::ensure;
use ndarray::{
    Array1,
    Array2,
    Array3,
};
use num::complex::Complex64;

pub type Result<T> = anyhow::Result<T>;

pub type Vector<T> = Array1<T>;  // Define this type to use broadcast operations.
pub type Matrix<T> = Array2<T>;
pub type Cube<T>   = Array3<T>;
pub type MatX3<T> = Vec<[T;3]>;  // Nx3 matrix
pub type Mat33<T> = [[T;3];3];   // 3x3 matrix

#[allow(non_camel_case_types)]
pub type c64 = Complex64;

/// Lattice vectors in ETSF containers are stored in Bohr.
pub const ANGSTROM_PER_BOHR: f64 = 0.52917721067;


/// Normalized Gaussian of standard deviation `width` centered at `center`,
/// evaluated on every point of `mesh`.
pub fn gaussian(mesh: &Vector<f64>, width: f64, center: f64) -> Vector<f64> {
    let norm = 1.0 / (width * (2.0 * PI).sqrt());
    mesh.mapv(|x| norm * (-((x - center) / width).powi(2) / 2.0).exp())
}


/// A sampled wavevector in the reciprocal lattice, with its weight in the
/// Brillouin-zone integration.
#[derive(Clone, Debug, PartialEq)]
pub struct Qpoint {
    pub frac_coords: [f64; 3],
    pub weight: f64,
}


#[derive(Clone, Debug)]
pub struct Structure {
    cell:        Mat33<f64>,     // Lattice vectors in Angstrom, one vector per row.
    ion_types:   Vec<String>,    // Unique chemical symbols, file order.
    type_of_ion: Vec<usize>,     // Per-atom index into ion_types.
    car_pos:     MatX3<f64>,
    frac_pos:    MatX3<f64>,
}

impl Structure {
    pub fn new(cell: Mat33<f64>,
               ion_types: Vec<String>,
               type_of_ion: Vec<usize>,
               frac_pos: MatX3<f64>) -> Result<Self> {
        ensure!(type_of_ion.len() == frac_pos.len(),
                "number of atom types ({}) and positions ({}) differ",
                type_of_ion.len(), frac_pos.len());
        ensure!(type_of_ion.iter().all(|&t| t < ion_types.len()),
                "atom type index out of range, only {} species present", ion_types.len());

        let car_pos = frac_pos.iter()
            .map(|f| {
                let mut c = [0.0f64; 3];
                for j in 0 .. 3 {
                    c[j] = f[0] * cell[0][j] + f[1] * cell[1][j] + f[2] * cell[2][j];
                }
                c
            })
            .collect::<MatX3<f64>>();

        Ok(Self { cell, ion_types, type_of_ion, car_pos, frac_pos })
    }

    pub fn cell(&self) -> &Mat33<f64> { &self.cell }
    pub fn ion_types(&self) -> &[String] { &self.ion_types }
    pub fn type_of_ion(&self) -> &[usize] { &self.type_of_ion }
    pub fn car_pos(&self) -> &MatX3<f64> { &self.car_pos }
    pub fn frac_pos(&self) -> &MatX3<f64> { &self.frac_pos }

    pub fn num_atoms(&self) -> usize { self.type_of_ion.len() }
    pub fn num_types(&self) -> usize { self.ion_types.len() }

    /// Position of `symbol` in the species list, if present.
    pub fn type_index(&self, symbol: &str) -> Option<usize> {
        self.ion_types.iter().position(|s| s == symbol)
    }

    /// Indices of the atoms belonging to the given species.
    pub fn ion_indices_of_type(&self, symbol: &str) -> Vec<usize> {
        match self.type_index(symbol) {
            Some(itype) => self.type_of_ion.iter()
                .enumerate()
                .filter(|(_, &t)| t == itype)
                .map(|(i, _)| i)
                .collect(),
            None => vec![],
        }
    }

    /// Cartesian direction indices (3i, 3i+1, 3i+2 for every atom i) of the
    /// given species, used to slice displacement vectors.
    pub fn cart_indices_of_type(&self, symbol: &str) -> Vec<usize> {
        self.ion_indices_of_type(symbol)
            .into_iter()
            .flat_map(|i| [3 * i, 3 * i + 1, 3 * i + 2])
            .collect()
    }

    /// Chemical formula, e.g. "Al2 O3".
    pub fn formula(&self) -> String {
        self.ion_types.iter()
            .enumerate()
            .map(|(itype, symbol)| {
                let n = self.type_of_ion.iter().filter(|&&t| t == itype).count();
                format!("{}{}", symbol, n)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
