//! Face analysis of a master character image

use crate::error::{Result, RigError};
use crate::types::{BoundingBox, DEFAULT_FACE_BOX};
use serde::{Deserialize, Serialize};

/// Recommendations used when the model returned none
pub const DEFAULT_RECOMMENDATIONS: &str = "No specific recommendations.";

/// Where the face sits in a master image, plus free-text rigging notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiggingAnalysis {
    pub face_box: BoundingBox,
    pub recommendations: String,
}

impl Default for RiggingAnalysis {
    fn default() -> Self {
        Self {
            face_box: DEFAULT_FACE_BOX,
            recommendations: DEFAULT_RECOMMENDATIONS.to_string(),
        }
    }
}

impl RiggingAnalysis {
    /// Strictly parse a `{"faceBoundingBox": [..], "recommendations": ".."}`
    /// response. Any missing or malformed field is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| RigError::AnalysisParseFailed(format!("invalid JSON: {}", e)))?;

        let face_box = face_box_field(&value)?;
        let recommendations = value
            .get("recommendations")
            .and_then(|r| r.as_str())
            .ok_or_else(|| {
                RigError::AnalysisParseFailed("missing recommendations".to_string())
            })?
            .to_string();

        Ok(Self {
            face_box,
            recommendations,
        })
    }

    /// Parse a response, substituting defaults field by field.
    ///
    /// Placement can proceed approximately without a precise face box, so a
    /// bad response degrades to `DEFAULT_FACE_BOX` instead of failing.
    pub fn from_response_or_default(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "face analysis was not JSON, using defaults");
                return Self::default();
            }
        };

        let face_box = face_box_field(&value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, fallback = %DEFAULT_FACE_BOX, "using default face box");
            DEFAULT_FACE_BOX
        });
        let recommendations = value
            .get("recommendations")
            .and_then(|r| r.as_str())
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_RECOMMENDATIONS)
            .to_string();

        Self {
            face_box,
            recommendations,
        }
    }
}

fn face_box_field(value: &serde_json::Value) -> Result<BoundingBox> {
    let raw = value
        .get("faceBoundingBox")
        .and_then(|b| b.as_array())
        .ok_or_else(|| RigError::AnalysisParseFailed("missing faceBoundingBox".to_string()))?;

    let coords: Vec<i64> = raw
        .iter()
        .map(|v| v.as_f64().map(|f| f.round() as i64))
        .collect::<Option<_>>()
        .ok_or_else(|| {
            RigError::AnalysisParseFailed("faceBoundingBox contains non-numbers".to_string())
        })?;

    BoundingBox::from_values(&coords)
        .map_err(|e| RigError::AnalysisParseFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let text = r#"{"faceBoundingBox": [120, 350, 320, 650], "recommendations": "Split the bangs."}"#;
        let analysis = RiggingAnalysis::parse(text).unwrap();
        assert_eq!(analysis.face_box.to_array(), [120, 350, 320, 650]);
        assert_eq!(analysis.recommendations, "Split the bangs.");
    }

    #[test]
    fn test_parse_rejects_missing_box() {
        let err = RiggingAnalysis::parse(r#"{"recommendations": "x"}"#).unwrap_err();
        assert!(matches!(err, RigError::AnalysisParseFailed(_)));
    }

    #[test]
    fn test_fallback_on_garbage() {
        let analysis = RiggingAnalysis::from_response_or_default("I think the face is near the top");
        assert_eq!(analysis, RiggingAnalysis::default());
        assert_eq!(analysis.face_box, DEFAULT_FACE_BOX);
    }

    #[test]
    fn test_fallback_per_field() {
        let analysis =
            RiggingAnalysis::from_response_or_default(r#"{"faceBoundingBox": [1, 2], "recommendations": "Keep eyes separate"}"#);
        assert_eq!(analysis.face_box, DEFAULT_FACE_BOX);
        assert_eq!(analysis.recommendations, "Keep eyes separate");

        let analysis =
            RiggingAnalysis::from_response_or_default(r#"{"faceBoundingBox": [100, 400, 250, 600]}"#);
        assert_eq!(analysis.face_box.to_array(), [100, 400, 250, 600]);
        assert_eq!(analysis.recommendations, DEFAULT_RECOMMENDATIONS);
    }

    #[test]
    fn test_out_of_range_box_is_clamped() {
        let analysis =
            RiggingAnalysis::from_response_or_default(r#"{"faceBoundingBox": [-10, 300, 1040, 700], "recommendations": ""}"#);
        assert_eq!(analysis.face_box.to_array(), [0, 300, 1000, 700]);
        assert_eq!(analysis.recommendations, DEFAULT_RECOMMENDATIONS);
    }
}
