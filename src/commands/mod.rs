pub mod common;
pub mod phband;
pub mod phdos;
