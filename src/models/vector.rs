// src/models/vector.rs

//! Profile vectors and their storage literal.
//!
//! Vectors cross the storage boundary as a bracketed, comma-separated literal
//! (`[0.1,0.2,...]`). Floats are printed with Rust's shortest round-trip
//! formatting, so `parse(to_literal(v)) == v` bit for bit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AppError, Result};

/// Length of vectors produced by the multilingual MiniLM encoder.
pub const VECTOR_DIMENSIONS: usize = 384;

/// Dense embedding attached to a scholar or a user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileVector(Vec<f32>);

impl ProfileVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as the storage literal.
    pub fn to_literal(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        format!("[{}]", parts.join(","))
    }
}

/// Cosine similarity in [-1, 1].
///
/// Empty inputs, zero-norm inputs and length mismatches yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0) as f32
}

impl From<Vec<f32>> for ProfileVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl fmt::Display for ProfileVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl FromStr for ProfileVector {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| AppError::validation(format!("vector literal not bracketed: {s:.32}")))?;

        if inner.trim().is_empty() {
            return Ok(Self(Vec::new()));
        }

        inner
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f32>()
                    .map_err(|e| AppError::validation(format!("bad vector component '{part}': {e}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl Serialize for ProfileVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_literal())
    }
}

impl<'de> Deserialize<'de> for ProfileVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(serde::de::Error::custom)
    }
}
