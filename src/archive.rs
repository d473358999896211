//! Gzip-compressed tar output

use crate::error::{CollectError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tar::{Builder, EntryType, Header};

const ENTRY_MODE: u32 = 0o644;
const NAME_FIELD_LEN: usize = 100;
const LONG_NAME_MARKER: &[u8] = b"././@LongLink";

/// Incremental `.tar.gz` writer.
///
/// Entries are appended in call order. Nothing is valid on disk until
/// [`ArchiveWriter::finish`] has written the tar trailer and the gzip footer.
pub struct ArchiveWriter<W: Write> {
    builder: Builder<GzEncoder<W>>,
    entries: Vec<String>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            builder: Builder::new(GzEncoder::new(inner, Compression::default())),
            entries: Vec::new(),
        }
    }

    /// Names of the entries written so far, in order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Copy the file at `source` into the archive as `name`.
    ///
    /// `source` is opened as given; callers resolve symlinks first.
    pub fn append_file(&mut self, source: &Path, name: &str) -> Result<()> {
        let file = File::open(source).map_err(|e| CollectError::io(source, e))?;
        let meta = file.metadata().map_err(|e| CollectError::io(source, e))?;
        let header = entry_header(meta.len(), mtime_of(&meta));
        self.append_entry(header, name, file)
            .map_err(|e| CollectError::io(source, e))?;
        self.record(name);
        Ok(())
    }

    /// Add an in-memory entry; its size is the length of `data`.
    pub fn append_bytes(&mut self, name: &str, data: &[u8], mtime: u64) -> Result<()> {
        let header = entry_header(data.len() as u64, mtime);
        self.append_entry(header, name, data)
            .map_err(|e| CollectError::io(name, e))?;
        self.record(name);
        Ok(())
    }

    /// Write the tar trailer and gzip footer, handing back the underlying writer.
    pub fn finish(self) -> Result<W> {
        let encoder = self
            .builder
            .into_inner()
            .map_err(|e| CollectError::io("<archive>", e))?;
        encoder.finish().map_err(|e| CollectError::io("<archive>", e))
    }

    /// Names with a `..` component (`../common/macros.sty`) are kept as given.
    /// `tar::Builder::append_data` refuses them, so their name fields are written
    /// directly, with a GNU long-name entry in front when they exceed 100 bytes.
    fn append_entry<R: Read>(
        &mut self,
        mut header: Header,
        name: &str,
        data: R,
    ) -> io::Result<()> {
        if !has_parent_component(name) {
            return self.builder.append_data(&mut header, name, data);
        }

        let bytes = name.as_bytes();
        if bytes.len() > NAME_FIELD_LEN {
            let mut long = entry_header(bytes.len() as u64 + 1, 0);
            long.set_entry_type(EntryType::GNULongName);
            set_name_field(&mut long, LONG_NAME_MARKER);
            long.set_cksum();
            self.builder.append(&long, bytes.chain(&b"\0"[..]))?;
        }
        set_name_field(&mut header, &bytes[..bytes.len().min(NAME_FIELD_LEN)]);
        header.set_cksum();
        self.builder.append(&header, data)
    }

    fn record(&mut self, name: &str) {
        tracing::debug!(entry = name, "added to archive");
        self.entries.push(name.to_string());
    }
}

/// Seconds since the epoch at which `path` was last modified, or 0 if unknown.
pub fn modified_secs(path: &Path) -> u64 {
    fs::metadata(path).map(|m| mtime_of(&m)).unwrap_or(0)
}

fn mtime_of(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn has_parent_component(name: &str) -> bool {
    name.split('/').any(|part| part == "..")
}

fn set_name_field(header: &mut Header, name: &[u8]) {
    let field = &mut header.as_old_mut().name;
    field.fill(0);
    field[..name.len()].copy_from_slice(name);
}

fn entry_header(size: u64, mtime: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);
    header.set_mode(ENTRY_MODE);
    header.set_mtime(mtime);
    header
}
