//  INFO.rs
//
//  Description:
//!   Defines [`Info`], the trait both `ExporterConfig` and `ClientConfig`
//!   implement to load themselves from a YAML file on disk (§6). Reduced
//!   to what the fabric actually does with a config — read it once at
//!   startup — rather than a general read/write serialization layer.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result as FResult};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

/// Errors loading a config of type `E`'s underlying deserializer.
#[derive(Debug)]
pub enum InfoError<E: Debug> {
    /// Failed to open the input file.
    InputOpenError { path: PathBuf, err: std::io::Error },
    /// The file opened, but its contents didn't parse.
    StringDeserializeError { err: E },
    /// The file opened, but its contents didn't parse; carries the path
    /// that was being read for `from_path`'s error message.
    FileDeserializeError { path: PathBuf, err: E },
}
impl<E: Error> Display for InfoError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use InfoError::*;
        match self {
            InputOpenError { path, .. } => write!(f, "Failed to open input file '{}'", path.display()),
            StringDeserializeError { .. } => write!(f, "Failed to deserialize from string"),
            FileDeserializeError { path, .. } => write!(f, "Failed to deserialize from input file '{}'", path.display()),
        }
    }
}
impl<E: 'static + Error> Error for InfoError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use InfoError::*;
        match self {
            InputOpenError { err, .. } => Some(err),
            StringDeserializeError { err } => Some(err),
            FileDeserializeError { err, .. } => Some(err),
        }
    }
}

/// A config loadable from a string or a file on disk.
pub trait Info: Clone + Debug + Sized {
    type Error: Error;

    /// Parses `raw` into an instance of `Self`.
    fn from_string(raw: impl AsRef<str>) -> Result<Self, InfoError<Self::Error>>;

    /// Reads and parses the file at `path`.
    fn from_path(path: impl AsRef<Path>) -> Result<Self, InfoError<Self::Error>> {
        let path: &Path = path.as_ref();

        let mut handle = File::open(path).map_err(|err| InfoError::InputOpenError { path: path.into(), err })?;
        let mut raw = String::new();
        handle.read_to_string(&mut raw).map_err(|err| InfoError::InputOpenError { path: path.into(), err })?;

        Self::from_string(raw).map_err(|err| match err {
            InfoError::StringDeserializeError { err } => InfoError::FileDeserializeError { path: path.into(), err },
            other => other,
        })
    }
}

/// Blanket-implements [`Info`] for any YAML-backed config type via `serde_yaml`.
pub trait YamlInfo: Clone + Debug + DeserializeOwned {}
impl<T: YamlInfo> Info for T {
    type Error = serde_yaml::Error;

    fn from_string(raw: impl AsRef<str>) -> Result<Self, InfoError<Self::Error>> {
        serde_yaml::from_str(raw.as_ref()).map_err(|err| InfoError::StringDeserializeError { err })
    }
}

/// The error type `YamlInfo`-backed configs fail to load with.
pub type YamlError = InfoError<serde_yaml::Error>;
