use serde::{Deserialize, Serialize};

/// Fixed-dimension face descriptor produced by the embedding provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Euclidean distance, or `None` when the dimensions differ.
    pub fn distance(&self, other: &Embedding) -> Option<f64> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }

    /// JSON array form used in outbound payloads.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Face bounding box in pixel coordinates, `(top, right, bottom, left)`
/// order as returned by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct FaceLocation {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl From<[i32; 4]> for FaceLocation {
    fn from(v: [i32; 4]) -> Self {
        Self {
            top: v[0],
            right: v[1],
            bottom: v[2],
            left: v[3],
        }
    }
}

impl From<FaceLocation> for [i32; 4] {
    fn from(l: FaceLocation) -> Self {
        [l.top, l.right, l.bottom, l.left]
    }
}

/// One face found in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub embedding: Embedding,
    pub location: FaceLocation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_identical_is_zero() {
        let a = Embedding::new(vec![0.1, 0.2, 0.3]);
        assert_relative_eq!(a.distance(&a).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert_relative_eq!(a.distance(&b).unwrap(), 5.0);
    }

    #[test]
    fn test_distance_dimension_mismatch_is_none() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![0.0, 0.0, 0.0]);
        assert!(a.distance(&b).is_none());
    }

    #[test]
    fn test_to_json_array() {
        let a = Embedding::new(vec![0.5, -1.0]);
        assert_eq!(a.to_json(), "[0.5,-1.0]");
    }

    #[test]
    fn test_detected_face_deserializes_location_array() {
        let json = r#"{"embedding":[0.1,0.2],"location":[10,80,90,20]}"#;
        let face: DetectedFace = serde_json::from_str(json).unwrap();
        assert_eq!(face.embedding.dim(), 2);
        assert_eq!(
            face.location,
            FaceLocation {
                top: 10,
                right: 80,
                bottom: 90,
                left: 20
            }
        );
    }
}
