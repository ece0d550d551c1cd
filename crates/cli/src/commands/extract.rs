//! `coursellm extract` — One extraction from the command line.

use coursellm_config::AppConfig;
use coursellm_core::IstRequest;
use coursellm_ist::ExtractorCell;

pub async fn run(
    utterance: String,
    course_context: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let cell = ExtractorCell::new();
    let extractor = cell.initialize(&config)?;

    let mut request = IstRequest::new(utterance);
    if let Some(context) = course_context {
        request = request.with_course_context(context);
    }

    let result = extractor.extract(&request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
