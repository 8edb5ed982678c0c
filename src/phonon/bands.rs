use std::fmt;
use std::path::Path;

use anyhow::{
    bail,
    ensure,
    Context,
};
use indexmap::IndexMap;
use itertools::iproduct;
use ndarray::{
    s,
    ArrayD,
    Axis,
};

use crate::abinit_parsers::phbst::PhbstFile;
use crate::phonon::dos::PhononDos;
use crate::types::{
    c64,
    gaussian,
    Cube,
    Matrix,
    Qpoint,
    Result,
    Structure,
    Vector,
};

/// Tolerance on the q-point weight sum when checking for a complete
/// Brillouin-zone mesh.
const WEIGHT_SUM_TOL: f64 = 1e-6;


/// A labelled set of (x, y, size) annotations attached to a band plot,
/// e.g. QP corrections or energy derivatives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Marker {
    x: Vec<f64>,
    y: Vec<f64>,
    s: Vec<f64>,
}

impl Marker {
    pub fn new(x: Vec<f64>, y: Vec<f64>, s: Vec<f64>) -> Result<Self> {
        ensure!(x.len() == y.len() && y.len() == s.len(),
                "marker components have inconsistent lengths: {} {} {}",
                x.len(), y.len(), s.len());
        Ok(Self { x, y, s })
    }

    pub fn from_triples(xys: &[(f64, f64, f64)]) -> Self {
        let x = xys.iter().map(|t| t.0).collect();
        let y = xys.iter().map(|t| t.1).collect();
        let s = xys.iter().map(|t| t.2).collect();
        Self { x, y, s }
    }

    pub fn x(&self) -> &[f64] { &self.x }
    pub fn y(&self) -> &[f64] { &self.y }
    pub fn s(&self) -> &[f64] { &self.s }

    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    /// Append another marker set to this one.
    pub fn extend(&mut self, other: Marker) {
        self.x.extend(other.x);
        self.y.extend(other.y);
        self.s.extend(other.s);
    }
}


/// Container for a phonon band structure.
///
/// Frequencies are in eV with shape (nqpoints, nbranches) where
/// nbranches = 3 * natoms; Cartesian displacements are complex, in
/// Angstrom, with shape (nqpoints, nbranches, nbranches).
#[derive(Clone, Debug)]
pub struct PhononBands {
    structure:    Structure,
    qpoints:      Vec<Qpoint>,
    phfreqs:      Matrix<f64>,
    phdispl_cart: Cube<c64>,

    markers: IndexMap<String, Marker>,
    widths:  IndexMap<String, Matrix<f64>>,
}

impl PhononBands {
    pub fn new(structure: Structure,
               qpoints: Vec<Qpoint>,
               phfreqs: Matrix<f64>,
               phdispl_cart: Cube<c64>) -> Result<Self> {
        let nqpts = qpoints.len();
        let nbranches = 3 * structure.num_atoms();

        ensure!(phfreqs.dim() == (nqpts, nbranches),
                "frequency array has shape {:?}, expected ({}, {})",
                phfreqs.dim(), nqpts, nbranches);
        ensure!(phdispl_cart.dim() == (nqpts, nbranches, nbranches),
                "displacement array has shape {:?}, expected ({}, {}, {})",
                phdispl_cart.dim(), nqpts, nbranches, nbranches);
        ensure!(qpoints.iter().all(|q| q.weight >= 0.0),
                "q-point weights must be non-negative");

        Ok(Self {
            structure,
            qpoints,
            phfreqs,
            phdispl_cart,
            markers: IndexMap::new(),
            widths: IndexMap::new(),
        })
    }

    /// Read the band structure from a PHBST container file.
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        Ok(PhbstFile::from_file(path)?.into_phbands())
    }

    pub fn structure(&self) -> &Structure { &self.structure }
    pub fn qpoints(&self) -> &[Qpoint] { &self.qpoints }
    pub fn phfreqs(&self) -> &Matrix<f64> { &self.phfreqs }
    pub fn phdispl_cart(&self) -> &Cube<c64> { &self.phdispl_cart }

    pub fn num_qpoints(&self) -> usize { self.qpoints.len() }
    pub fn num_branches(&self) -> usize { 3 * self.structure.num_atoms() }
    pub fn num_atoms(&self) -> usize { self.structure.num_atoms() }

    /// Shape of the frequency array, (nqpoints, nbranches).
    pub fn shape(&self) -> (usize, usize) {
        (self.num_qpoints(), self.num_branches())
    }

    pub fn sum_weights(&self) -> f64 {
        self.qpoints.iter().map(|q| q.weight).sum()
    }

    pub fn min_freq(&self) -> f64 {
        self.phfreqs.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max_freq(&self) -> f64 {
        self.phfreqs.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_freq_of_branch(&self, nu: usize) -> f64 {
        self.phfreqs.column(nu).iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max_freq_of_branch(&self, nu: usize) -> f64 {
        self.phfreqs.column(nu).iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Compute the phonon DOS on a linear mesh by broadening the discrete
    /// (q-point, branch) frequencies.
    ///
    /// `step` is the energy step of the mesh in eV, `width` the standard
    /// deviation of the Gaussian in eV. Only `method = "gaussian"` is
    /// supported. Requires a homogeneous sampling of the Brillouin zone:
    /// the q-point weights must sum up to one.
    pub fn get_phdos(&self, method: &str, step: f64, width: f64) -> Result<PhononDos> {
        ensure!(step > 0.0 && width > 0.0,
                "step and width must be positive, got step = {}, width = {}", step, width);

        let wsum = self.sum_weights();
        ensure!((wsum - 1.0).abs() <= WEIGHT_SUM_TOL,
                "q-point weights sum up to {}, not 1: the Brillouin zone is not fully sampled \
                 (a q-path cannot be used to compute a DOS)", wsum);

        // 10% padding on both sides so the tails of the broadening kernel
        // are captured near the spectrum edges. Signed extremes: the mesh
        // must extend below zero when unstable modes are present.
        let mut w_min = self.min_freq();
        w_min -= 0.1 * w_min.abs();
        let mut w_max = self.max_freq();
        w_max += 0.1 * w_max.abs();

        let nw = 1 + ((w_max - w_min) / step) as usize;
        let mesh = Vector::<f64>::linspace(w_min, w_max, nw);

        let values = match method {
            "gaussian" => {
                let mut values = Vector::<f64>::zeros(nw);
                for (iq, qpoint) in self.qpoints.iter().enumerate() {
                    for nu in 0 .. self.num_branches() {
                        values += &(gaussian(&mesh, width, self.phfreqs[[iq, nu]]) * qpoint.weight);
                    }
                }
                values
            },
            m => bail!("unsupported DOS method {:?}, only \"gaussian\" is implemented", m),
        };

        PhononDos::new(mesh, values)
    }

    pub fn markers(&self) -> &IndexMap<String, Marker> { &self.markers }
    pub fn widths(&self) -> &IndexMap<String, Matrix<f64>> { &self.widths }

    /// Store a labelled marker set.
    ///
    /// Re-setting an existing key fails unless `extend` is true, in which
    /// case the new points are appended to the existing set.
    pub fn set_marker(&mut self, key: &str, marker: Marker, extend: bool) -> Result<()> {
        if extend {
            match self.markers.get_mut(key) {
                Some(prev) => prev.extend(marker),
                None => { self.markers.insert(key.to_string(), marker); },
            }
        } else {
            ensure!(!self.markers.contains_key(key),
                    "cannot overwrite marker key {:?}", key);
            self.markers.insert(key.to_string(), marker);
        }
        Ok(())
    }

    /// Store a labelled width array for fatband plotting.
    ///
    /// The array is reshaped to (nqpoints, nbranches); complex or negative
    /// entries are rejected and the container is left unchanged.
    pub fn set_width(&mut self, key: &str, width: ArrayD<c64>) -> Result<()> {
        let (nqpts, nbranches) = self.shape();
        let width = width.into_shape((nqpts, nbranches))
            .with_context(|| format!("width array cannot be reshaped to ({}, {})",
                                     nqpts, nbranches))?;

        ensure!(!self.widths.contains_key(key),
                "cannot overwrite width key {:?}", key);
        ensure!(width.iter().all(|v| v.im == 0.0),
                "found ambiguous complex entry in width array {:?}", key);
        ensure!(width.iter().all(|v| v.re >= 0.0),
                "found negative entry in width array {:?}", key);

        self.widths.insert(key.to_string(), width.mapv(|v| v.re));
        Ok(())
    }

    /// Remove one marker entry, or all of them when `key` is `None`.
    /// Absent keys are a no-op.
    pub fn del_marker(&mut self, key: Option<&str>) {
        match key {
            Some(k) => { self.markers.shift_remove(k); },
            None => self.markers.clear(),
        }
    }

    /// Remove one width entry, or all of them when `key` is `None`.
    /// Absent keys are a no-op.
    pub fn del_width(&mut self, key: Option<&str>) {
        match key {
            Some(k) => { self.widths.shift_remove(k); },
            None => self.widths.clear(),
        }
    }

    /// Displacement sub-tensor restricted to the Cartesian directions of
    /// the atoms of one species, shape (nqpoints, nbranches, 3 * count).
    pub fn displ_of_species(&self, symbol: &str) -> Result<Cube<c64>> {
        let dirs = self.structure.cart_indices_of_type(symbol);
        ensure!(!dirs.is_empty(), "species {:?} not present in structure", symbol);
        Ok(self.phdispl_cart.select(Axis(2), &dirs))
    }

    /// Squared norm of the displacement vector for every (q-point, branch)
    /// pair.
    pub fn displ_norm2(&self) -> Matrix<f64> {
        let (nqpts, nbranches) = self.shape();
        let mut d2 = Matrix::<f64>::zeros((nqpts, nbranches));
        for (iq, nu) in iproduct!(0 .. nqpts, 0 .. nbranches) {
            d2[[iq, nu]] = self.phdispl_cart.slice(s![iq, nu, ..])
                .iter()
                .map(|c| c.norm_sqr())
                .sum();
        }
        d2
    }

    /// Same as `displ_norm2` but restricted to the Cartesian directions of
    /// one species; used for fatband stripes.
    pub fn displ_norm2_of_species(&self, symbol: &str) -> Result<Matrix<f64>> {
        let displ = self.displ_of_species(symbol)?;
        let (nqpts, nbranches) = self.shape();
        let mut d2 = Matrix::<f64>::zeros((nqpts, nbranches));
        for (iq, nu) in iproduct!(0 .. nqpts, 0 .. nbranches) {
            d2[[iq, nu]] = displ.slice(s![iq, nu, ..])
                .iter()
                .map(|c| c.norm_sqr())
                .sum();
        }
        Ok(d2)
    }
}

impl fmt::Display for PhononBands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "formula        : {}", self.structure.formula())?;
        writeln!(f, "num_qpoints    : {}", self.num_qpoints())?;
        writeln!(f, "num_branches   : {}", self.num_branches())?;
        writeln!(f, "sum of weights : {:.6}", self.sum_weights())?;
        writeln!(f, "min frequency  : {:12.6} eV", self.min_freq())?;
        writeln!(f, "max frequency  : {:12.6} eV", self.max_freq())?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use approx::assert_abs_diff_eq;

    fn single_atom_structure() -> Structure {
        let cell = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]];
        Structure::new(cell, vec!["C".to_string()], vec![0], vec![[0.0; 3]]).unwrap()
    }

    fn gamma_only_bands(freqs: [f64; 3], weight: f64) -> PhononBands {
        let qpoints = vec![Qpoint { frac_coords: [0.0; 3], weight }];
        let phfreqs = arr2(&[freqs]);
        let phdispl = Cube::<c64>::zeros((1, 3, 3));
        PhononBands::new(single_atom_structure(), qpoints, phfreqs, phdispl).unwrap()
    }

    #[test]
    fn test_shape_coupling_enforced() {
        let qpoints = vec![Qpoint { frac_coords: [0.0; 3], weight: 1.0 }];
        let bad_freqs = arr2(&[[0.01, 0.02]]);
        let displ = Cube::<c64>::zeros((1, 3, 3));
        assert!(PhononBands::new(single_atom_structure(), qpoints.clone(), bad_freqs, displ).is_err());

        let freqs = arr2(&[[0.01, 0.02, 0.03]]);
        let bad_displ = Cube::<c64>::zeros((1, 3, 2));
        assert!(PhononBands::new(single_atom_structure(), qpoints, freqs, bad_displ).is_err());
    }

    #[test]
    fn test_freq_extremes_per_branch() {
        let qpoints = vec![Qpoint { frac_coords: [0.0; 3], weight: 0.5 },
                           Qpoint { frac_coords: [0.5, 0.0, 0.0], weight: 0.5 }];
        let phfreqs = arr2(&[[0.01, 0.02, 0.03],
                             [-0.005, 0.025, 0.04]]);
        let displ = Cube::<c64>::zeros((2, 3, 3));
        let bands = PhononBands::new(single_atom_structure(), qpoints, phfreqs, displ).unwrap();

        assert_abs_diff_eq!(bands.min_freq(), -0.005);
        assert_abs_diff_eq!(bands.max_freq(), 0.04);
        assert_abs_diff_eq!(bands.min_freq_of_branch(0), -0.005);
        assert_abs_diff_eq!(bands.max_freq_of_branch(0), 0.01);
        assert_abs_diff_eq!(bands.min_freq_of_branch(2), 0.03);
        assert_abs_diff_eq!(bands.max_freq_of_branch(2), 0.04);
    }

    #[test]
    fn test_marker_length_coupling() {
        let m = Marker::new(vec![0.0, 1.0], vec![0.01, 0.02], vec![1.0, 2.0]).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.x(), &[0.0, 1.0]);
        assert_eq!(m, Marker::from_triples(&[(0.0, 0.01, 1.0), (1.0, 0.02, 2.0)]));

        assert!(Marker::new(vec![0.0, 1.0], vec![0.01], vec![1.0, 2.0]).is_err());
        assert!(Marker::new(vec![0.0], vec![0.01], vec![]).is_err());
    }

    #[test]
    fn test_phdos_counts_all_branches() {
        let bands = gamma_only_bands([0.01, 0.02, 0.03], 1.0);
        let dos = bands.get_phdos("gaussian", 1e-4, 4e-4).unwrap();

        // One unit of weighted density per branch.
        assert_abs_diff_eq!(dos.num_states(), 3.0, epsilon = 1e-2);
    }

    #[test]
    fn test_phdos_mesh_covers_spectrum() {
        let bands = gamma_only_bands([0.01, 0.02, 0.03], 1.0);
        let dos = bands.get_phdos("gaussian", 1e-4, 4e-4).unwrap();

        let mesh = dos.mesh();
        assert!(mesh[0] <= bands.min_freq());
        assert!(mesh[mesh.len() - 1] >= bands.max_freq());
        assert_abs_diff_eq!(mesh[0], 0.009, epsilon = 1e-12);
    }

    #[test]
    fn test_phdos_mesh_extends_below_zero_for_unstable_modes() {
        let bands = gamma_only_bands([-0.01, 0.02, 0.03], 1.0);
        let dos = bands.get_phdos("gaussian", 1e-4, 4e-4).unwrap();

        // Signed minimum: the padding must push the mesh below -0.01.
        assert!(dos.mesh()[0] < -0.01);
        assert_abs_diff_eq!(dos.mesh()[0], -0.011, epsilon = 1e-12);
    }

    #[test]
    fn test_phdos_unsupported_method() {
        let bands = gamma_only_bands([0.01, 0.02, 0.03], 1.0);
        assert!(bands.get_phdos("lorentzian", 1e-4, 4e-4).is_err());
        assert!(bands.get_phdos("tetrahedron", 1e-4, 4e-4).is_err());
    }

    #[test]
    fn test_phdos_rejects_unsampled_zone() {
        let bands = gamma_only_bands([0.01, 0.02, 0.03], 0.5);
        let err = bands.get_phdos("gaussian", 1e-4, 4e-4).unwrap_err();
        assert!(err.to_string().contains("not fully sampled"));
    }

    #[test]
    fn test_set_width_validation() {
        let mut bands = gamma_only_bands([0.01, 0.02, 0.03], 1.0);

        let negative = arr1(&[c64::new(-1.0, 0.0); 3]).into_dyn();
        assert!(bands.set_width("neg", negative).is_err());
        assert!(bands.widths().is_empty());

        let complex = arr1(&[c64::new(1.0, 2.0), c64::new(0.0, 0.0), c64::new(0.0, 0.0)]).into_dyn();
        assert!(bands.set_width("cplx", complex).is_err());

        let wrong_size = arr1(&[c64::new(0.0, 0.0); 4]).into_dyn();
        assert!(bands.set_width("size", wrong_size).is_err());

        let zeros = arr1(&[c64::new(0.0, 0.0); 3]).into_dyn();
        bands.set_width("ok", zeros.clone()).unwrap();
        assert_eq!(bands.widths()["ok"].dim(), (1, 3));

        // Duplicate key, no extend option for widths.
        assert!(bands.set_width("ok", zeros).is_err());
    }

    #[test]
    fn test_set_marker_overwrite_and_extend() {
        let mut bands = gamma_only_bands([0.01, 0.02, 0.03], 1.0);
        let m1 = Marker::from_triples(&[(0.0, 0.01, 1.0)]);
        let m2 = Marker::from_triples(&[(0.0, 0.02, 2.0)]);

        bands.set_marker("qp", m1.clone(), false).unwrap();
        assert!(bands.set_marker("qp", m2.clone(), false).is_err());
        assert_eq!(bands.markers()["qp"].len(), 1);

        bands.set_marker("qp", m2, true).unwrap();
        assert_eq!(bands.markers()["qp"].len(), 2);
        assert_eq!(bands.markers()["qp"].y(), &[0.01, 0.02]);

        // Extend on a fresh key behaves as a first insertion.
        bands.set_marker("fresh", m1, true).unwrap();
        assert_eq!(bands.markers()["fresh"].len(), 1);
    }

    #[test]
    fn test_del_marker_idempotent() {
        let mut bands = gamma_only_bands([0.01, 0.02, 0.03], 1.0);
        for key in ["a", "b", "c"] {
            bands.set_marker(key, Marker::from_triples(&[(0.0, 0.0, 1.0)]), false).unwrap();
        }
        assert_eq!(bands.markers().len(), 3);

        bands.del_marker(Some("missing"));
        assert_eq!(bands.markers().len(), 3);

        bands.del_marker(None);
        assert!(bands.markers().is_empty());

        // Deleting again must not fail.
        bands.del_marker(None);
        bands.del_marker(Some("a"));
    }

    #[test]
    fn test_displ_norms_split_by_species() {
        let cell = [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]];
        let st = Structure::new(cell,
                                vec!["C".to_string(), "O".to_string()],
                                vec![0, 1],
                                vec![[0.0; 3], [0.5, 0.5, 0.5]]).unwrap();
        let qpoints = vec![Qpoint { frac_coords: [0.0; 3], weight: 1.0 }];
        let phfreqs = Matrix::<f64>::zeros((1, 6));
        let mut displ = Cube::<c64>::zeros((1, 6, 6));
        // Branch 0 moves only the C atom, branch 1 only the O atom.
        displ[[0, 0, 0]] = c64::new(1.0, 0.0);
        displ[[0, 1, 3]] = c64::new(0.0, 2.0);

        let bands = PhononBands::new(st, qpoints, phfreqs, displ).unwrap();
        let total = bands.displ_norm2();
        assert_abs_diff_eq!(total[[0, 0]], 1.0);
        assert_abs_diff_eq!(total[[0, 1]], 4.0);

        let on_c = bands.displ_norm2_of_species("C").unwrap();
        assert_abs_diff_eq!(on_c[[0, 0]], 1.0);
        assert_abs_diff_eq!(on_c[[0, 1]], 0.0);

        let on_o = bands.displ_norm2_of_species("O").unwrap();
        assert_abs_diff_eq!(on_o[[0, 1]], 4.0);
        assert_eq!(bands.displ_of_species("O").unwrap().dim(), (1, 6, 3));

        assert!(bands.displ_of_species("Si").is_err());
    }
}
