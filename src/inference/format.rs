// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw scores and boxes -> public result shapes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::backend::RawDetection;
use crate::models::ClassTable;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Invalid K {k} for {len} scores")]
    InvalidK { k: usize, len: usize },
    #[error("Class index {index} outside the {table_len}-entry class table")]
    UnknownClassIndex { index: usize, table_len: usize },
    #[error("Model produced {scores} scores for a {table_len}-entry class table")]
    ScoreCountMismatch { scores: usize, table_len: usize },
}

/// One ranked class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
}

/// Top-K classes by descending confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "predictions")]
    pub entries: Vec<ClassScore>,
}

/// Integer pixel box, serialized as `[xmin, ymin, xmax, ymax]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.xmin, b.ymin, b.xmax, b.ymax]
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from(v: [u32; 4]) -> Self {
        Self {
            xmin: v[0],
            ymin: v[1],
            xmax: v[2],
            ymax: v[3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Detections in backend emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

fn lookup(classes: &ClassTable, index: usize) -> Result<String, FormatError> {
    classes
        .get(index)
        .map(str::to_string)
        .ok_or(FormatError::UnknownClassIndex {
            index,
            table_len: classes.len(),
        })
}

/// Select the `k` highest scores. Ties go to the lower index; NaN ranks last.
///
/// `scores` must be index-aligned with `classes`: an extra score is an
/// out-of-table index even when it would not rank in the top `k`.
pub fn top_k(
    scores: &[f32],
    classes: &ClassTable,
    k: usize,
) -> Result<ClassificationResult, FormatError> {
    if k == 0 || k > scores.len() {
        return Err(FormatError::InvalidK {
            k,
            len: scores.len(),
        });
    }

    if scores.len() > classes.len() {
        return Err(FormatError::UnknownClassIndex {
            index: classes.len(),
            table_len: classes.len(),
        });
    }
    if scores.len() < classes.len() {
        return Err(FormatError::ScoreCountMismatch {
            scores: scores.len(),
            table_len: classes.len(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        rank(scores[b])
            .total_cmp(&rank(scores[a]))
            .then(a.cmp(&b))
    });

    let entries = order
        .into_iter()
        .take(k)
        .map(|i| {
            Ok(ClassScore {
                label: lookup(classes, i)?,
                confidence: rank(scores[i]).clamp(0.0, 1.0),
            })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    Ok(ClassificationResult { entries })
}

/// Map tensor-space boxes onto the original image
pub fn rescale_detections(
    raw: Vec<RawDetection>,
    tensor_size: (u32, u32),
    image_size: (u32, u32),
) -> Vec<RawDetection> {
    let sx = image_size.0 as f32 / tensor_size.0.max(1) as f32;
    let sy = image_size.1 as f32 / tensor_size.1.max(1) as f32;
    raw.into_iter().map(|d| d.scaled(sx, sy)).collect()
}

fn clamp_coord(v: f32, dim: u32) -> u32 {
    let max = dim.saturating_sub(1) as f32;
    v.round().clamp(0.0, max) as u32
}

/// Label, threshold, round and clamp raw boxes (original-image coordinates).
///
/// Order is preserved. Boxes that collapse to zero width or height once
/// clamped to `[0, dim)` are dropped, as are boxes with non-finite corners.
pub fn filter_detections(
    raw: &[RawDetection],
    classes: &ClassTable,
    min_confidence: f32,
    image_width: u32,
    image_height: u32,
) -> Result<DetectionResult, FormatError> {
    let mut detections = Vec::with_capacity(raw.len());

    for d in raw {
        let label = lookup(classes, d.class_index)?;
        if !(d.confidence >= min_confidence) {
            continue;
        }

        if ![d.xmin, d.ymin, d.xmax, d.ymax].iter().all(|v| v.is_finite()) {
            continue;
        }

        let bbox = BoundingBox {
            xmin: clamp_coord(d.xmin.min(d.xmax), image_width),
            ymin: clamp_coord(d.ymin.min(d.ymax), image_height),
            xmax: clamp_coord(d.xmin.max(d.xmax), image_width),
            ymax: clamp_coord(d.ymin.max(d.ymax), image_height),
        };
        if bbox.xmin >= bbox.xmax || bbox.ymin >= bbox.ymax {
            continue;
        }

        detections.push(Detection {
            label,
            confidence: d.confidence.clamp(0.0, 1.0),
            bbox,
        });
    }

    Ok(DetectionResult { detections })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(class_index: usize, confidence: f32, b: [f32; 4]) -> RawDetection {
        RawDetection {
            class_index,
            confidence,
            xmin: b[0],
            ymin: b[1],
            xmax: b[2],
            ymax: b[3],
        }
    }

    #[test]
    fn test_top2_mushroom_scores() {
        let scores = [0.92, 0.10, 0.40, 0.05, 0.01];
        let result = top_k(&scores, &ClassTable::mushroom(), 2).unwrap();

        assert_eq!(
            result.entries,
            vec![
                ClassScore {
                    label: "Bacterial Blotch".into(),
                    confidence: 0.92
                },
                ClassScore {
                    label: "Healthy".into(),
                    confidence: 0.40
                },
            ]
        );
    }

    #[test]
    fn test_top_k_ties_prefer_lower_index() {
        let scores = [0.3, 0.5, 0.5, 0.1, 0.0];
        let result = top_k(&scores, &ClassTable::mushroom(), 3).unwrap();
        let labels: Vec<_> = result.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["Dry Bubble", "Healthy", "Bacterial Blotch"]);
    }

    #[test]
    fn test_top_k_nan_ranks_last() {
        let scores = [f32::NAN, 0.2, 0.1, 0.05, 0.0];
        let result = top_k(&scores, &ClassTable::mushroom(), 5).unwrap();
        assert_eq!(result.entries[3].label, "Wilt");
        assert_eq!(result.entries[4].label, "Bacterial Blotch");
        assert_eq!(result.entries[4].confidence, 0.0);
    }

    #[test]
    fn test_top_k_is_idempotent() {
        let scores = [0.05, 0.7, 0.2, 0.9, 0.3];
        let table = ClassTable::mushroom();
        let first = top_k(&scores, &table, 3).unwrap();

        let labels: Vec<_> = first.entries.iter().map(|e| e.label.clone()).collect();
        let again_scores: Vec<_> = first.entries.iter().map(|e| e.confidence).collect();
        let again = top_k(&again_scores, &ClassTable::new(labels).unwrap(), 3).unwrap();
        assert_eq!(first, again);

        for pair in first.entries.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
            assert_ne!(pair[0].label, pair[1].label);
        }
    }

    #[test]
    fn test_top_k_invalid_k() {
        let table = ClassTable::mushroom();
        assert_eq!(
            top_k(&[0.1, 0.2], &table, 0),
            Err(FormatError::InvalidK { k: 0, len: 2 })
        );
        assert_eq!(
            top_k(&[0.1, 0.2], &table, 3),
            Err(FormatError::InvalidK { k: 3, len: 2 })
        );
    }

    #[test]
    fn test_top_k_index_outside_table() {
        let scores = [0.1, 0.1, 0.1, 0.1, 0.1, 0.99];
        assert_eq!(
            top_k(&scores, &ClassTable::mushroom(), 1),
            Err(FormatError::UnknownClassIndex {
                index: 5,
                table_len: 5
            })
        );
    }

    #[test]
    fn test_top_k_extra_scores_rejected_even_when_lowest() {
        let table = ClassTable::mushroom();
        let scores = [0.9, 0.8, 0.1, 0.1, 0.1, 0.05, 0.02];
        assert_eq!(
            top_k(&scores, &table, 2),
            Err(FormatError::UnknownClassIndex {
                index: 5,
                table_len: 5
            })
        );
        assert_eq!(
            top_k(&[0.1; 7], &table, 2),
            Err(FormatError::UnknownClassIndex {
                index: 5,
                table_len: 5
            })
        );
    }

    #[test]
    fn test_top_k_short_score_vector_rejected() {
        assert_eq!(
            top_k(&[0.7, 0.3], &ClassTable::mushroom(), 2),
            Err(FormatError::ScoreCountMismatch {
                scores: 2,
                table_len: 5
            })
        );
    }

    #[test]
    fn test_filter_drops_low_confidence_keeps_order() {
        let table = ClassTable::mushroom();
        let input = [
            raw(4, 0.9, [1.0, 1.0, 10.0, 10.0]),
            raw(0, 0.3, [1.0, 1.0, 10.0, 10.0]),
            raw(2, 0.5, [2.0, 2.0, 20.0, 20.0]),
            raw(1, 0.49, [2.0, 2.0, 20.0, 20.0]),
            raw(3, 0.7, [3.0, 3.0, 30.0, 30.0]),
        ];

        let result = filter_detections(&input, &table, 0.5, 100, 100).unwrap();
        let labels: Vec<_> = result.detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["Wilt", "Healthy", "Trichoderma"]);
    }

    #[test]
    fn test_filter_rounds_and_clamps() {
        let table = ClassTable::mushroom();
        let input = [raw(0, 0.8, [-5.0, 2.4, 120.6, 49.5])];

        let result = filter_detections(&input, &table, 0.0, 100, 50).unwrap();
        assert_eq!(
            result.detections[0].bbox,
            BoundingBox {
                xmin: 0,
                ymin: 2,
                xmax: 99,
                ymax: 49
            }
        );
    }

    #[test]
    fn test_filter_drops_degenerate_boxes() {
        let table = ClassTable::mushroom();
        let input = [
            raw(0, 0.8, [150.0, 10.0, 200.0, 20.0]),
            raw(0, 0.8, [5.0, f32::NAN, 10.0, 20.0]),
            raw(0, 0.8, [5.0, 5.0, 5.2, 20.0]),
        ];
        let result = filter_detections(&input, &table, 0.0, 100, 100).unwrap();
        assert!(result.detections.is_empty());
    }

    #[test]
    fn test_filter_unknown_class() {
        let input = [raw(9, 0.8, [0.0, 0.0, 1.0, 1.0])];
        assert!(matches!(
            filter_detections(&input, &ClassTable::mushroom(), 0.0, 10, 10),
            Err(FormatError::UnknownClassIndex { index: 9, .. })
        ));
    }

    #[test]
    fn test_rescale_to_original() {
        let input = vec![raw(0, 0.9, [320.0, 160.0, 640.0, 320.0])];
        let out = rescale_detections(input, (640, 640), (1280, 960));
        assert_eq!(out[0].xmin, 640.0);
        assert_eq!(out[0].ymin, 240.0);
        assert_eq!(out[0].xmax, 1280.0);
        assert_eq!(out[0].ymax, 480.0);
    }

    #[test]
    fn test_json_shapes() {
        let c = ClassificationResult {
            entries: vec![ClassScore {
                label: "Wilt".into(),
                confidence: 0.5,
            }],
        };
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!({"predictions": [{"class": "Wilt", "confidence": 0.5}]})
        );

        let d = DetectionResult {
            detections: vec![Detection {
                label: "Wilt".into(),
                confidence: 0.5,
                bbox: BoundingBox {
                    xmin: 1,
                    ymin: 2,
                    xmax: 3,
                    ymax: 4,
                },
            }],
        };
        assert_eq!(
            serde_json::to_value(&d).unwrap(),
            serde_json::json!({"detections": [{"class": "Wilt", "confidence": 0.5, "box": [1, 2, 3, 4]}]})
        );
    }
}
