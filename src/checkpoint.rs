use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::driver::TimeBookkeeping;
use crate::error::{Error, Result};
use crate::level::Hierarchy;




/**
 * Version tag written into every checkpoint; a checkpoint with another
 * version is refused.
 */
pub const CHECKPOINT_VERSION: u32 = 1;




/**
 * Encodings a checkpoint can be written in.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckpointFormat {
    Cbor,
    MessagePack,
}

impl FromStr for CheckpointFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cbor" => Ok(CheckpointFormat::Cbor),
            "msgpack" | "messagepack" => Ok(CheckpointFormat::MessagePack),
            _ => Err(Error::Checkpoint(format!("unknown checkpoint format '{}'", s))),
        }
    }
}




/**
 * Everything needed to resume a run: the levels with their state
 * containers, patch sets, geometry and flux registers, and the time
 * bookkeeping which the next time step selection depends on.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub bookkeeping: TimeBookkeeping,
    pub hierarchy: Hierarchy,
}




// ============================================================================
impl Checkpoint {

    pub fn new(bookkeeping: TimeBookkeeping, hierarchy: Hierarchy) -> Self {
        Self { version: CHECKPOINT_VERSION, bookkeeping, hierarchy }
    }

    pub fn write_to<W: Write>(&self, writer: W, format: CheckpointFormat) -> Result<()> {
        match format {
            CheckpointFormat::Cbor => {
                ciborium::ser::into_writer(self, writer).map_err(|e| Error::Checkpoint(e.to_string()))
            }
            CheckpointFormat::MessagePack => {
                let mut writer = writer;
                rmp_serde::encode::write(&mut writer, self).map_err(|e| Error::Checkpoint(e.to_string()))
            }
        }
    }

    pub fn read_from<R: Read>(reader: R, format: CheckpointFormat) -> Result<Self> {
        let checkpoint: Self = match format {
            CheckpointFormat::Cbor => {
                ciborium::de::from_reader(reader).map_err(|e| Error::Checkpoint(e.to_string()))?
            }
            CheckpointFormat::MessagePack => {
                rmp_serde::decode::from_read(reader).map_err(|e| Error::Checkpoint(e.to_string()))?
            }
        };
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(Error::Checkpoint(format!(
                "checkpoint version {} is not supported (expected {})",
                checkpoint.version,
                CHECKPOINT_VERSION)));
        }
        Ok(checkpoint)
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P, format: CheckpointFormat) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer, format)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_file<P: AsRef<Path>>(path: P, format: CheckpointFormat) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?), format)
    }
}
