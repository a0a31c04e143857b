pub mod bisect;
pub mod density;
pub mod pca;
