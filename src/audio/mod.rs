pub mod capture;
pub mod decoder;
pub mod encoder;
pub mod resample;
