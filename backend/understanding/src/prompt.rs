//! Diagnostic prompt and output schema.

use cropdoc_core::{AdvisoryField, EncodedImage, GenerationRequest, OutputSchema};

/// Fixed plant-pathology instruction sent with every image.
pub const DIAGNOSIS_PROMPT: &str = "\
You are an expert in plant pathology. Analyze this image of a plant leaf or seed.
Identify any diseases present.
What is the likely name of the disease?
What are the primary causes of this disease?
Provide practical, actionable advice on how to prevent and treat this disease, suitable for a farmer.

Please format your response as a single, valid JSON object with the following keys:
{
  \"diseaseName\": \"The disease name\",
  \"causes\": \"Description of the causes\",
  \"treatment\": \"Practical advice for treatment and prevention\"
}
Do not include any extra text, markdown formatting, or code fences outside of the JSON object itself.";

/// Schema the model is constrained to: three required string fields.
pub fn advisory_schema() -> OutputSchema {
    OutputSchema {
        name: "disease_advisory",
        required: AdvisoryField::ALL.to_vec(),
    }
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Compose the request for one encoded image.
    pub fn build(image: EncodedImage) -> GenerationRequest {
        GenerationRequest {
            prompt: DIAGNOSIS_PROMPT.to_string(),
            image,
            schema: advisory_schema(),
        }
    }
}
