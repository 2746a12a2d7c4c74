pub mod encoder;
pub mod mime_detect;
pub mod normalize;
pub mod prompt;

pub use encoder::{encode, ImageLoader};
pub use mime_detect::detect_image_mime;
pub use normalize::{normalize, Normalized};
pub use prompt::{advisory_schema, PromptBuilder, DIAGNOSIS_PROMPT};
