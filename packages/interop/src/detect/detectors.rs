//! Built-in format detectors.

use async_trait::async_trait;

use super::FormatDetector;
use crate::error::Result;
use crate::model::{ContentInput, FormatId};

/// Namespace substring that identifies QTI version 2.2 documents.
const QTI_V2P2_MARKER: &str = "imsqti_v2p2";

/// Detector for IMS QTI 2.2 XML.
///
/// Requires a string input that looks like XML (`<?xml` or `<` prefix) and
/// carries the v2p2 namespace substring.
pub struct QtiFormatDetector;

#[async_trait]
impl FormatDetector for QtiFormatDetector {
    fn id(&self) -> &str {
        "builtin-qti22"
    }

    fn format(&self) -> FormatId {
        FormatId::Qti22
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn detect(&self, input: &ContentInput) -> Result<bool> {
        let Some(text) = input.as_text() else {
            return Ok(false);
        };
        let trimmed = text.trim_start();
        let looks_like_xml = trimmed.starts_with("<?xml") || trimmed.starts_with('<');
        Ok(looks_like_xml && trimmed.contains(QTI_V2P2_MARKER))
    }
}

/// Detector for PIE item JSON.
///
/// Accepts any non-string (already parsed) JSON input outright; string input
/// must parse as a JSON object exposing `id`, `element`, or `pieElement`.
pub struct PieFormatDetector;

#[async_trait]
impl FormatDetector for PieFormatDetector {
    fn id(&self) -> &str {
        "builtin-pie"
    }

    fn format(&self) -> FormatId {
        FormatId::Pie
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn detect(&self, input: &ContentInput) -> Result<bool> {
        match input {
            ContentInput::Json(_) => Ok(true),
            ContentInput::Text(text) => {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
                    return Ok(false);
                };
                let Some(object) = value.as_object() else {
                    return Ok(false);
                };
                Ok(object.contains_key("id")
                    || object.contains_key("element")
                    || object.contains_key("pieElement"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_qti_detector_requires_namespace() {
        let detector = QtiFormatDetector;

        let with_ns = ContentInput::Text(format!(
            r#"<?xml version="1.0"?><assessmentItem xmlns="http://www.imsglobal.org/xsd/{QTI_V2P2_MARKER}"/>"#
        ));
        assert!(detector.detect(&with_ns).await.unwrap());

        let without_ns = ContentInput::Text("<assessmentItem/>".to_string());
        assert!(!detector.detect(&without_ns).await.unwrap());

        let not_xml = ContentInput::Text("just text".to_string());
        assert!(!detector.detect(&not_xml).await.unwrap());
    }

    #[tokio::test]
    async fn test_pie_detector_accepts_json_value() {
        let detector = PieFormatDetector;
        let input = ContentInput::Json(json!({"anything": true}));
        assert!(detector.detect(&input).await.unwrap());
    }

    #[tokio::test]
    async fn test_pie_detector_sniffs_json_text() {
        let detector = PieFormatDetector;

        let with_id = ContentInput::Text(r#"{"id": "x", "config": {}}"#.to_string());
        assert!(detector.detect(&with_id).await.unwrap());

        let with_pie_element = ContentInput::Text(r#"{"pieElement": "x"}"#.to_string());
        assert!(detector.detect(&with_pie_element).await.unwrap());

        let other_object = ContentInput::Text(r#"{"foo": 1}"#.to_string());
        assert!(!detector.detect(&other_object).await.unwrap());

        let not_json = ContentInput::Text("<xml/>".to_string());
        assert!(!detector.detect(&not_json).await.unwrap());
    }
}
