use thiserror::Error;

/// Result type for catphan operations
pub type Result<T> = std::result::Result<T, CatphanError>;

/// Error types for catphan operations
#[derive(Error, Debug)]
pub enum CatphanError {
    /// No connected region above the body threshold
    #[error("No phantom detected: {0}")]
    NoPhantomDetected(String),

    /// Fewer than two fiducial markers found on the search circle
    #[error("Fiducial not found: {0}")]
    FiducialNotFound(String),

    /// Line-pair module could not be located in the stack
    #[error("Module not located: {0}")]
    ModuleNotLocated(String),

    /// Empty or out-of-range slice selection
    #[error("Insufficient slices: {0}")]
    InsufficientSlices(String),

    /// ROI is out of bounds or has a non-positive radius
    #[error("Invalid ROI: {0}")]
    InvalidRoi(String),

    /// Mask selects no pixels
    #[error("Empty mask: {0}")]
    EmptyMask(String),

    /// Stack violates the ordering/shape preconditions
    #[error("Invalid stack: {0}")]
    InvalidStack(String),

    /// Profile-based measurement found no usable feature
    #[error("Feature not resolved: {0}")]
    FeatureNotResolved(String),

    /// Invalid configuration or measurement value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// Tag not found in DICOM file
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for CatphanError {
    fn from(e: dicom_object::ReadError) -> Self {
        CatphanError::DicomError(format!("{}", e))
    }
}

impl From<dicom_core::value::ConvertValueError> for CatphanError {
    fn from(e: dicom_core::value::ConvertValueError) -> Self {
        CatphanError::InvalidValue(format!("{}", e))
    }
}
