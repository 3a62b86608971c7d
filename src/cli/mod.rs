//! CLI command implementations.
//!
//! Each command returns a serializable value; the binary writes it to stdout
//! as JSON.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `analyze` | Describe an image through the engine cascade |
//! | `identify` | Run the object pipeline and decide what to say |
//! | `voice` | Classify a spoken command and phrase a reply |
//! | `gate` | Rate evidence for a target with the safety gate |
//! | `status` | Show engine availability and configured models |
//!
//! # Example Usage
//!
//! ```bash
//! # Describe what is in front of the camera
//! visualky analyze frame.jpg --mode surroundings
//!
//! # Look for a specific object
//! visualky identify shelf.jpg --target "cereal"
//!
//! # Classify a voice command
//! visualky voice "find my keys"
//! ```

mod factory;
mod status;
mod vision;

pub use factory::{build_pipeline, build_router};
pub use status::{StatusReport, cmd_gate, cmd_status};
pub use vision::{IdentifyOutput, cmd_analyze, cmd_identify, cmd_voice};

use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;

/// Writes a value as pretty-printed JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })?;
    writeln!(writer, "{json}").map_err(|e| Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    })
}
