//! CSV output of swept envelopes

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use time::OffsetDateTime;

use crate::{envelope::EnvelopeSample, sampling::EnvelopeKind, FloatType, Result};

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeRecord {
    pub kind: EnvelopeKind,
    pub x: FloatType,
    pub y: FloatType,
    pub z: FloatType,
    pub radius: FloatType,
    pub scale: FloatType,
    pub halvings: u32,
    pub peak_force: FloatType,
}

impl EnvelopeRecord {
    /// Takes the direction from the force or torque half of the sample, as `kind` says
    pub fn new(kind: EnvelopeKind, sample: &EnvelopeSample) -> Self {
        let direction = match kind {
            EnvelopeKind::Force => sample.direction.force,
            EnvelopeKind::Torque => sample.direction.torque,
        };

        Self {
            kind,
            x: direction.x,
            y: direction.y,
            z: direction.z,
            radius: sample.radius,
            scale: sample.scale,
            halvings: sample.halvings,
            peak_force: sample.peak_force,
        }
    }

    /// The envelope point, direction scaled by radius
    pub fn point(&self) -> [FloatType; 3] {
        [
            self.x * self.radius,
            self.y * self.radius,
            self.z * self.radius,
        ]
    }
}

pub fn write_records(writer: impl Write, records: &[EnvelopeRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// `<dir>/<stem>-YYYYMMDD-HHMMSS.csv` in local time, UTC if the offset is unknown
pub fn report_path(dir: impl AsRef<Path>, stem: &str) -> PathBuf {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());

    dir.as_ref().join(format!(
        "{stem}-{:04}{:02}{:02}-{:02}{:02}{:02}.csv",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    ))
}
