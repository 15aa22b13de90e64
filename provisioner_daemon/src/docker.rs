pub mod archive;
pub mod auxiliary;
pub mod emulation;
pub mod repository;
pub mod resources;
pub mod service;
