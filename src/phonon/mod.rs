pub mod bands;
pub mod dos;

pub use bands::{
    PhononBands,
    Marker,
};
pub use dos::PhononDos;
