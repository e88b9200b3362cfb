use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeblurError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Expected an image tensor of shape (B,1,H,W), got {got:?}")]
    InvalidImageShape { got: Vec<usize> },

    #[error("Expected a kernel tensor of shape (1,1,Kh,Kw), got {got:?}")]
    InvalidKernelShape { got: Vec<usize> },

    #[error("Only batch size 1 is supported, got batch size {got}")]
    UnsupportedBatch { got: usize },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Kernel size must be odd and positive, got {size}")]
    InvalidKernelSize { size: usize },

    #[error("Unknown PSF kind: {0}")]
    UnknownPsfKind(String),

    #[error("Invalid PSF parameter {name} = {value}: must be {requirement}")]
    InvalidPsfParameter {
        name: &'static str,
        value: f64,
        requirement: &'static str,
    },

    #[error("Degenerate PSF: {0}")]
    DegeneratePsf(String),

    #[error("Diffusion prior weight {weight} requires a score model handle")]
    MissingScoreModel { weight: f64 },

    #[error("Score model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, DeblurError>;
