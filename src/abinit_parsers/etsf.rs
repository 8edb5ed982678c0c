use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    bail,
    ensure,
    Context,
};
use hdf5::File as H5File;
use ndarray::Ix4;

use crate::types::{
    c64,
    Cube,
    MatX3,
    Mat33,
    Matrix,
    Result,
    Structure,
    Vector,
    ANGSTROM_PER_BOHR,
};


// Chemical symbols indexed by atomic number - 1.
const ELEMENT_SYMBOLS: &[&str] = &[
    "H",  "He", "Li", "Be", "B",  "C",  "N",  "O",  "F",  "Ne",
    "Na", "Mg", "Al", "Si", "P",  "S",  "Cl", "Ar", "K",  "Ca",
    "Sc", "Ti", "V",  "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y",  "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I",  "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W",  "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U",  "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr",
];

fn symbol_of_z(znucl: f64) -> Result<String> {
    let iz = znucl.round() as usize;
    ensure!(iz >= 1 && iz <= ELEMENT_SYMBOLS.len(),
            "atomic number {} out of range", znucl);
    Ok(ELEMENT_SYMBOLS[iz - 1].to_string())
}

/// The containers produced by anaddb are netCDF-4/HDF5 files.
pub(crate) fn check_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("nc") | Some("h5") => Ok(()),
        _ => bail!("{:?} does not look like a phonon container, expected a '.nc' or '.h5' extension",
                   path),
    }
}


/// Generic named-array reader over an ETSF-style scientific container.
///
/// The rest of the crate only depends on this reader's contract: open a
/// path, read typed arrays by name, read the crystal structure. The handle
/// is released when the reader is dropped.
#[derive(Debug)]
pub struct EtsfReader {
    path: PathBuf,
    file: H5File,
}

impl EtsfReader {
    pub fn open(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = H5File::open(&path)
            .with_context(|| format!("failed to open {:?}", path))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn dataset(&self, name: &str) -> Result<hdf5::Dataset> {
        self.file.dataset(name)
            .with_context(|| format!("required array {:?} not found in {:?}", name, self.path))
    }

    pub fn read_vector(&self, name: &str) -> Result<Vector<f64>> {
        Ok(self.dataset(name)?.read_1d::<f64>()?)
    }

    pub fn read_matrix(&self, name: &str) -> Result<Matrix<f64>> {
        Ok(self.dataset(name)?.read_2d::<f64>()?)
    }

    pub fn read_indices(&self, name: &str) -> Result<Vec<i32>> {
        Ok(self.dataset(name)?.read_1d::<i32>()?.to_vec())
    }

    /// Read a complex rank-3 array stored as a real rank-4 array whose last
    /// axis holds (re, im) pairs.
    pub fn read_complex_cube(&self, name: &str) -> Result<Cube<c64>> {
        let raw = self.dataset(name)?.read_dyn::<f64>()?;
        let raw = raw.into_dimensionality::<Ix4>()
            .with_context(|| format!("array {:?} is not of rank 4", name))?;

        let (n0, n1, n2, ncplx) = raw.dim();
        ensure!(ncplx == 2,
                "last axis of {:?} must hold (re, im) pairs, got length {}", name, ncplx);

        let mut out = Cube::<c64>::zeros((n0, n1, n2));
        for ((i, j, k), v) in out.indexed_iter_mut() {
            *v = c64::new(raw[[i, j, k, 0]], raw[[i, j, k, 1]]);
        }
        Ok(out)
    }

    /// Assemble the crystal structure from the standard ETSF arrays.
    /// Lattice vectors are converted from Bohr to Angstrom.
    pub fn read_structure(&self) -> Result<Structure> {
        let prim = self.read_matrix("primitive_vectors")?;
        ensure!(prim.dim() == (3, 3),
                "primitive_vectors has shape {:?}, expected (3, 3)", prim.dim());
        let mut cell = Mat33::<f64>::default();
        for i in 0 .. 3 {
            for j in 0 .. 3 {
                cell[i][j] = prim[[i, j]] * ANGSTROM_PER_BOHR;
            }
        }

        let xred = self.read_matrix("reduced_atom_positions")?;
        ensure!(xred.ncols() == 3,
                "reduced_atom_positions has {} columns, expected 3", xred.ncols());
        let frac_pos = xred.rows()
            .into_iter()
            .map(|r| [r[0], r[1], r[2]])
            .collect::<MatX3<f64>>();

        let znucl = self.read_vector("atomic_numbers")?;
        let ion_types = znucl.iter()
            .map(|&z| symbol_of_z(z))
            .collect::<Result<Vec<String>>>()?;

        // atom_species is 1-based in the container.
        let type_of_ion = self.read_indices("atom_species")?
            .into_iter()
            .map(|t| {
                ensure!(t >= 1 && (t as usize) <= ion_types.len(),
                        "atom species index {} out of range, {} species present",
                        t, ion_types.len());
                Ok(t as usize - 1)
            })
            .collect::<Result<Vec<usize>>>()?;

        Structure::new(cell, ion_types, type_of_ion, frac_pos)
    }

    /// Release the underlying handle. Dropping the reader has the same
    /// effect; this only makes the release explicit at call sites.
    pub fn close(self) {}
}
