pub mod types;
pub mod func1d;
pub mod phonon;
pub mod abinit_parsers;
pub mod commands;
pub mod cli;

pub use types::{
    Qpoint,
    Result,
    Structure,
};

pub use func1d::Function1D;

pub use phonon::{
    Marker,
    PhononBands,
    PhononDos,
};

pub use abinit_parsers::{
    EtsfReader,
    PhbstFile,
    PhdosFile,
    PhdosReader,
};

pub use cli::OptProcess;
