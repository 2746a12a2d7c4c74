pub mod error;
pub mod traits;
pub mod types;

pub use error::DiagnosisError;
pub use traits::{GenerationClient, ImageSource};
pub use types::{
    AdvisoryField, EncodedImage, GenerationRequest, ImageRef, NormalizedAdvisory, OutputSchema,
    PersistedAdvisory, RawResponse, INFORMATION_NOT_AVAILABLE, UNKNOWN_DISEASE,
};
