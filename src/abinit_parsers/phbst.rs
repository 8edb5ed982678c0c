use std::path::Path;

use anyhow::ensure;
use log::debug;

use crate::abinit_parsers::etsf::{
    check_extension,
    EtsfReader,
};
use crate::phonon::bands::PhononBands;
use crate::types::{
    Qpoint,
    Result,
    Structure,
};


/// A PHBST container produced by anaddb: the phonon band structure plus the
/// open handle to the backing file.
#[derive(Debug)]
pub struct PhbstFile {
    reader:  EtsfReader,
    phbands: PhononBands,
}

impl PhbstFile {
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path)?;

        let reader = EtsfReader::open(path)?;
        let phbands = Self::read_phbands(&reader)?;
        Ok(Self { reader, phbands })
    }

    fn read_phbands(reader: &EtsfReader) -> Result<PhononBands> {
        let structure = reader.read_structure()?;

        let qcoords = reader.read_matrix("qpoints")?;
        let qweights = reader.read_vector("qweights")?;
        ensure!(qcoords.ncols() == 3,
                "qpoints has {} columns, expected 3", qcoords.ncols());
        ensure!(qcoords.nrows() == qweights.len(),
                "qpoints and qweights disagree on the number of q-points: {} vs {}",
                qcoords.nrows(), qweights.len());

        let qpoints = qcoords.rows()
            .into_iter()
            .zip(qweights.iter())
            .map(|(qc, &w)| Qpoint { frac_coords: [qc[0], qc[1], qc[2]], weight: w })
            .collect::<Vec<Qpoint>>();
        debug!("read {} q-points from {:?}", qpoints.len(), reader.path());

        let phfreqs = reader.read_matrix("phfreqs")?;
        let phdispl_cart = reader.read_complex_cube("phdispl_cart")?;

        PhononBands::new(structure, qpoints, phfreqs, phdispl_cart)
    }

    pub fn phbands(&self) -> &PhononBands { &self.phbands }
    pub fn structure(&self) -> &Structure { self.phbands.structure() }

    /// Give up the file handle and keep only the in-memory band structure.
    pub fn into_phbands(self) -> PhononBands {
        self.reader.close();
        self.phbands
    }

    /// Release the backing file handle.
    pub fn close(self) {
        self.reader.close();
    }
}
