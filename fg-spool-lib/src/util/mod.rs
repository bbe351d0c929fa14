pub mod dna;
pub mod io;
pub mod version;
