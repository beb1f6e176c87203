//! Text dump and file output.

use crate::error::Result;
use crate::RrCache;
use iterdns_proto::RRset;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

impl RrCache {
    /// Writes the cache to `path`, in binary form if `binary` is set and as
    /// text otherwise.
    pub fn dump(&self, path: impl AsRef<Path>, binary: bool) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        if binary {
            self.serialize(&mut writer)?;
        } else {
            self.write_text(&mut writer)?;
        }
        writer.flush()?;

        debug!(path = %path.display(), binary, rows = self.len(), "Dumped cache");
        Ok(())
    }

    /// Writes a human-readable dump.
    ///
    /// Negative entries take one comment line
    /// `;; [<RCODE>, TTL=<n>, msglen=<n>] <name>/<class>/<type>`; positive
    /// entries a `;; [msglen=<n>, trust=<n>]` line followed by their records.
    pub fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (key, buckets) in self.sorted_rows() {
            for (rtype, entries) in buckets {
                for entry in entries {
                    if entry.is_negative() {
                        writeln!(
                            writer,
                            ";; [{}, TTL={}, msglen={}] {}/{}/{}",
                            entry.rcode(),
                            entry.ttl(),
                            entry.msglen(),
                            key.name(),
                            key.rclass(),
                            rtype
                        )?;
                    } else {
                        let rrset = RRset::with_rdatas(
                            key.name().clone(),
                            rtype,
                            key.rclass(),
                            entry.ttl(),
                            entry.rdata().to_vec(),
                        );
                        writeln!(
                            writer,
                            ";; [msglen={}, trust={}]",
                            entry.msglen(),
                            entry.trust()
                        )?;
                        writeln!(writer, "{rrset}")?;
                    }
                }
            }
        }
        Ok(())
    }
}
