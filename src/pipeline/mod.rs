pub mod bitmap;
pub mod color_converter;
pub mod landmarks;
pub mod tracking;
