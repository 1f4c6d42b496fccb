//! Persistence of trained sample sets.
//!
//! Sample sets of all integrators of an operator are stored as a single JSON document:
//!
//! ```json
//! { "integrators": [ { "category": "Domain", "samples": [ { "location": 3, "quadrature_point": 1, "weight": 0.25 } ] } ] }
//! ```
//!
//! Integrators appear in registration order. Weights round-trip bit-for-bit.
use crate::error::HyperReductionError;
use crate::sample::{IntegratorCategory, SampleSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSamples<T> {
    pub category: IntegratorCategory,
    pub samples: SampleSet<T>,
}

/// The sample sets of every integrator of an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleArchive<T> {
    pub integrators: Vec<IntegratorSamples<T>>,
}

impl<T: Serialize> SampleArchive<T> {
    pub fn write_json(&self, writer: impl Write) -> Result<(), HyperReductionError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), HyperReductionError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl<T: DeserializeOwned> SampleArchive<T> {
    pub fn read_json(reader: impl Read) -> Result<Self, HyperReductionError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, HyperReductionError> {
        let reader = BufReader::new(File::open(path)?);
        Self::read_json(reader)
    }
}
