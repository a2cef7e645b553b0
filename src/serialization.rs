//! Serialization of fitted model parameters and tuning artifacts.
//!
//! Fitted models are persisted as plain parameter structs encoded with
//! `bincode`; they never carry training-only state. Human-readable artifacts
//! (tuning reports) are JSON.

use crate::error::{ModelError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, io::BufWriter, path::Path};

/// A parameter representation that can be serialized to and from bytes.
///
/// Implementors should contain only plain numerical data (vectors, scalars,
/// small config structs).
pub trait SerializableParams: Sized {
    /// Serialize the parameters into a byte buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, ModelError>;

    /// Deserialize the parameters from a byte buffer.
    fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError>;
}

impl<T> SerializableParams for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A fitted model (or transformer) whose learned state round-trips through
/// [`SerializableParams`].
///
/// `extract_params` followed by `from_params` must reproduce a model that
/// predicts identically.
pub trait PersistentModel: Sized {
    type Params: SerializableParams;

    fn extract_params(&self) -> Self::Params;

    fn from_params(params: Self::Params) -> Result<Self, ModelError>;

    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let bytes = self.extract_params().to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        Self::from_params(Self::Params::from_bytes(&bytes)?)
    }
}

/// Writes `value` as pretty-printed JSON.
pub(crate) fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
