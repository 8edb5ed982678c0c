pub mod etsf;
pub mod phbst;
pub mod phdos;

pub use etsf::EtsfReader;
pub use phbst::PhbstFile;
pub use phdos::{
    PhdosFile,
    PhdosReader,
};
