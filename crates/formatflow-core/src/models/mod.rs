//! Domain models for batch image conversion.

mod file;
mod format;
mod options;
mod result;

pub use file::{ConversionFile, FileStatus, InputFile, StatusKind};
pub use format::{output_file_name, OutputFormat};
pub use options::ConversionOptions;
pub use result::{ConversionResult, ConversionStage};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(
    /// Identity of a file entry in a batch.
    FileId
);
opaque_id!(
    /// Identity of a task submitted to the conversion queue.
    TaskId
);
opaque_id!(
    /// Reference to converted bytes held by the output store.
    OutputHandle
);
