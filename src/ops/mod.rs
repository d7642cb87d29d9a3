pub mod mask;
pub mod refine;
pub mod rescale;
pub mod shapes;
pub mod text;
pub mod transform;
