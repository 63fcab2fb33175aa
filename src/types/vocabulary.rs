//! Vocabulary: the fixed, ordered set of identity dimensions
//!
//! Defined once at genesis and immutable afterwards. The relationship graph
//! is undirected and weighted; its Laplacian couples neighbouring dimensions
//! in the state dynamics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::IdentityError;
use crate::{MAX_DIMENSIONS, MAX_DIMENSION_NAME_LEN};

/// Undirected weighted edge between two dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: usize,
    pub to: usize,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Relationship {
    /// Edge with unit weight
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to, weight: 1.0 }
    }

    /// Edge with explicit weight
    pub fn weighted(from: usize, to: usize, weight: f64) -> Self {
        Self { from, to, weight }
    }
}

/// Validated vocabulary. Construct with [`Vocabulary::define`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVocabulary", into = "RawVocabulary")]
pub struct Vocabulary {
    names: Vec<String>,
    relationships: Vec<Relationship>,
}

/// Unvalidated wire form; deserialization goes through `define`
#[derive(Serialize, Deserialize)]
struct RawVocabulary {
    names: Vec<String>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

impl TryFrom<RawVocabulary> for Vocabulary {
    type Error = IdentityError;

    fn try_from(raw: RawVocabulary) -> Result<Self, Self::Error> {
        Vocabulary::define(raw.names, raw.relationships)
    }
}

impl From<Vocabulary> for RawVocabulary {
    fn from(vocabulary: Vocabulary) -> Self {
        Self {
            names: vocabulary.names,
            relationships: vocabulary.relationships,
        }
    }
}

impl Vocabulary {
    /// Validate names and relationships
    pub fn define<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        relationships: Vec<Relationship>,
    ) -> Result<Self, IdentityError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(IdentityError::EmptyVocabulary);
        }
        if names.len() > MAX_DIMENSIONS {
            return Err(IdentityError::TooManyDimensions {
                count: names.len(),
                max: MAX_DIMENSIONS,
            });
        }

        let mut seen = HashSet::new();
        for name in &names {
            if name.is_empty() || name.len() > MAX_DIMENSION_NAME_LEN {
                return Err(IdentityError::NameTooLong {
                    name: name.clone(),
                    max: MAX_DIMENSION_NAME_LEN,
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(IdentityError::DuplicateName(name.clone()));
            }
        }

        let n = names.len();
        for rel in &relationships {
            let reason = if rel.from >= n || rel.to >= n {
                Some("index out of range")
            } else if rel.from == rel.to {
                Some("self-loop")
            } else if !rel.weight.is_finite() || rel.weight < 0.0 {
                Some("weight must be finite and non-negative")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(IdentityError::InvalidRelationship {
                    from: rel.from,
                    to: rel.to,
                    reason,
                });
            }
        }

        Ok(Self { names, relationships })
    }

    /// Number of dimensions (n)
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a defined vocabulary
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Dimension names in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Index of a dimension by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Graph Laplacian L = Deg − A. Repeated edges accumulate.
    pub fn compute_laplacian(&self) -> Laplacian {
        let n = self.len();
        let mut entries = vec![0.0; n * n];
        for rel in &self.relationships {
            let (i, j, w) = (rel.from, rel.to, rel.weight);
            entries[i * n + j] -= w;
            entries[j * n + i] -= w;
            entries[i * n + i] += w;
            entries[j * n + j] += w;
        }
        Laplacian { n, entries }
    }

    /// SHA-256 over names and relationships, for status reporting
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.names.len() as u32).to_be_bytes());
        for name in &self.names {
            hasher.update((name.len() as u32).to_be_bytes());
            hasher.update(name.as_bytes());
        }
        hasher.update((self.relationships.len() as u32).to_be_bytes());
        for rel in &self.relationships {
            hasher.update((rel.from as u32).to_be_bytes());
            hasher.update((rel.to as u32).to_be_bytes());
            hasher.update(rel.weight.to_be_bytes());
        }
        hasher.finalize().into()
    }
}

/// Dense n×n graph Laplacian, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Laplacian {
    n: usize,
    entries: Vec<f64>,
}

impl Laplacian {
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Entry L[i][j]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.entries[i * self.n + j]
    }

    /// L·x
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.entries
            .chunks(self.n)
            .map(|row| row.iter().zip(x).map(|(l, v)| l * v).sum())
            .collect()
    }

    /// xᵗ·L·x
    pub fn quadratic_form(&self, x: &[f64]) -> f64 {
        self.apply(x).iter().zip(x).map(|(lx, v)| lx * v).sum()
    }

    /// Σ_{j≠i} |L[i][j]|
    pub fn off_diagonal_abs_sum(&self, i: usize) -> f64 {
        (0..self.n)
            .filter(|&j| j != i)
            .map(|j| self.get(i, j).abs())
            .sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ring() -> Vocabulary {
        Vocabulary::define(
            ["curiosity", "precision", "persistence", "empathy"],
            vec![
                Relationship::new(0, 1),
                Relationship::new(1, 2),
                Relationship::new(2, 3),
                Relationship::new(3, 0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty() {
        let err = Vocabulary::define(Vec::<String>::new(), vec![]).unwrap_err();
        assert_eq!(err, IdentityError::EmptyVocabulary);
    }

    #[test]
    fn test_rejects_long_name() {
        let err = Vocabulary::define(["a-name-that-is-way-too-long"], vec![]).unwrap_err();
        assert_eq!(err.code(), "R503_VOCABULARY_NAME_TOO_LONG");
    }

    #[test]
    fn test_rejects_too_many() {
        let names: Vec<String> = (0..MAX_DIMENSIONS + 1).map(|i| format!("d{}", i)).collect();
        let err = Vocabulary::define(names, vec![]).unwrap_err();
        assert_eq!(
            err,
            IdentityError::TooManyDimensions { count: MAX_DIMENSIONS + 1, max: MAX_DIMENSIONS }
        );
    }

    #[test]
    fn test_rejects_duplicates_and_bad_edges() {
        assert!(matches!(
            Vocabulary::define(["a", "a"], vec![]),
            Err(IdentityError::DuplicateName(_))
        ));
        assert!(matches!(
            Vocabulary::define(["a", "b"], vec![Relationship::new(0, 2)]),
            Err(IdentityError::InvalidRelationship { .. })
        ));
        assert!(matches!(
            Vocabulary::define(["a", "b"], vec![Relationship::new(1, 1)]),
            Err(IdentityError::InvalidRelationship { .. })
        ));
        assert!(matches!(
            Vocabulary::define(["a", "b"], vec![Relationship::weighted(0, 1, -1.0)]),
            Err(IdentityError::InvalidRelationship { .. })
        ));
    }

    #[test]
    fn test_laplacian_ring() {
        let l = ring().compute_laplacian();
        assert_eq!(l.dimension(), 4);
        assert_eq!(l.get(0, 0), 2.0);
        assert_eq!(l.get(0, 1), -1.0);
        assert_eq!(l.get(0, 2), 0.0);
        assert_eq!(l.off_diagonal_abs_sum(0), 2.0);

        // Rows sum to zero, so constants are in the kernel
        let lx = l.apply(&[0.3, 0.3, 0.3, 0.3]);
        assert!(lx.iter().all(|v| v.abs() < 1e-12));
        assert!(l.quadratic_form(&[1.0, 0.0, 1.0, 0.0]) > 0.0);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Vocabulary = serde_json::from_str(r#"{"names":["a","b"],"relationships":[{"from":0,"to":1}]}"#).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.relationships()[0].weight, 1.0);

        let bad = serde_json::from_str::<Vocabulary>(r#"{"names":[]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_digest_changes_with_edges() {
        let a = ring();
        let b = Vocabulary::define(["curiosity", "precision", "persistence", "empathy"], vec![]).unwrap();
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), ring().digest());
        assert_eq!(a.index_of("empathy"), Some(3));
    }
}
