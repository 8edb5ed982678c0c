use std::path::Path;

use anyhow::{
    ensure,
    Context,
};
use indexmap::IndexMap;

use crate::abinit_parsers::etsf::{
    check_extension,
    EtsfReader,
};
use crate::phonon::dos::PhononDos;
use crate::types::{
    Matrix,
    Result,
    Structure,
    Vector,
};


/// Reader for the PHDOS container produced by anaddb.
///
/// The frequency mesh and the per-species projected DOS table are read once
/// at construction, so repeated projected reads slice the same cached
/// arrays and always return equal results.
pub struct PhdosReader {
    reader:     EtsfReader,
    structure:  Structure,
    wmesh:      Vector<f64>,
    pjdos_type: Matrix<f64>,  // (ntypes, len(wmesh))
}

impl PhdosReader {
    pub fn open(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path)?;

        let reader = EtsfReader::open(path)?;
        let structure = reader.read_structure()?;
        let wmesh = reader.read_vector("wmesh")?;
        let pjdos_type = reader.read_matrix("pjdos_type")?;

        ensure!(pjdos_type.dim() == (structure.num_types(), wmesh.len()),
                "pjdos_type has shape {:?}, expected ({}, {})",
                pjdos_type.dim(), structure.num_types(), wmesh.len());

        Ok(Self { reader, structure, wmesh, pjdos_type })
    }

    pub fn structure(&self) -> &Structure { &self.structure }
    pub fn wmesh(&self) -> &Vector<f64> { &self.wmesh }

    /// The total phonon DOS.
    pub fn read_phdos(&self) -> Result<PhononDos> {
        let values = self.reader.read_vector("phdos")?;
        PhononDos::new(self.wmesh.clone(), values)
    }

    /// The contribution to the DOS due to the atoms of one chemical
    /// species, sliced from the cached projected table.
    pub fn read_pjdos_type(&self, symbol: &str) -> Result<PhononDos> {
        let itype = self.structure.type_index(symbol)
            .with_context(|| format!("species {:?} not present in {:?}",
                                     symbol, self.reader.path()))?;
        PhononDos::new(self.wmesh.clone(), self.pjdos_type.row(itype).to_owned())
    }

    pub fn close(self) {
        self.reader.close();
    }
}


/// Container holding the different DOSes stored in a PHDOS file: the total
/// DOS plus one projected DOS per chemical species, keyed in file order.
pub struct PhdosFile {
    reader:          PhdosReader,
    phdos:           PhononDos,
    pjdos_type_map:  IndexMap<String, PhononDos>,
}

impl PhdosFile {
    pub fn from_file(path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let reader = PhdosReader::open(path)?;

        let phdos = reader.read_phdos()?;
        let mut pjdos_type_map = IndexMap::new();
        for symbol in reader.structure().ion_types().to_vec() {
            let pjdos = reader.read_pjdos_type(&symbol)?;
            pjdos_type_map.insert(symbol, pjdos);
        }

        Ok(Self { reader, phdos, pjdos_type_map })
    }

    pub fn structure(&self) -> &Structure { self.reader.structure() }
    pub fn wmesh(&self) -> &Vector<f64> { self.reader.wmesh() }
    pub fn phdos(&self) -> &PhononDos { &self.phdos }

    /// Projected DOS per chemical species, insertion order matching the
    /// species order in the file.
    pub fn pjdos_type_map(&self) -> &IndexMap<String, PhononDos> {
        &self.pjdos_type_map
    }

    /// Release the backing file handle.
    pub fn close(self) {
        self.reader.close();
    }
}
