//! Binary snapshots of the effective inputs a run was computed from.
//!
//! The input set uses tagged and flattened serde forms that bincode cannot
//! decode, so the inputs travel as JSON inside a versioned bincode envelope.

use crate::PersistError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use ufc_core::{InputSet, SimConfig};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputSnapshot {
    pub version: u32,
    pub scenario: String,
    pub created_at: DateTime<Utc>,
    inputs_json: String,
    config_json: String,
}

impl InputSnapshot {
    pub fn new(scenario: &str, inputs: &InputSet, config: &SimConfig) -> Result<Self, PersistError> {
        Ok(Self {
            version: SNAPSHOT_VERSION,
            scenario: scenario.to_string(),
            created_at: Utc::now(),
            inputs_json: serde_json::to_string(inputs)?,
            config_json: serde_json::to_string(config)?,
        })
    }

    pub fn inputs(&self) -> Result<InputSet, PersistError> {
        Ok(serde_json::from_str(&self.inputs_json)?)
    }

    pub fn config(&self) -> Result<SimConfig, PersistError> {
        Ok(serde_json::from_str(&self.config_json)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        let snap: InputSnapshot = bincode::deserialize(bytes)?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(PersistError::Decode(format!(
                "unsupported snapshot version {}",
                snap.version
            )));
        }
        Ok(snap)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        Self::from_bytes(&fs::read(path)?)
    }
}
