pub mod format;
pub mod geo;
pub mod hijri;
pub mod locale;
