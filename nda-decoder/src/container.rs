//! File-level entry points: ndax archives and bare nda/ndc files
//!
//! An ndax file is a zip archive holding a small XML manifest
//! (`VersionInfo.xml`) and one or more ndc data files. The manifest's server
//! version string selects the decode path before any data bytes are touched.
//! Bare `.nda`/`.ndc` files are memory-mapped read-only; each map lives only
//! as long as its scan.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use memmap2::Mmap;
use quick_xml::events::Event;
use zip::ZipArchive;

use crate::assemble;
use crate::formats::{nda, ndc, ndc8};
use crate::types::{DecodeError, RecordTable, Result};
use crate::version::{self, FormatRevision};

/// Read any supported Neware file, dispatching on its extension.
pub fn read_file(path: &Path) -> Result<RecordTable> {
    log::info!("reading {:?}", path);
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("ndax") => read_ndax(path),
        Some("ndc") => {
            let map = map_file(path)?;
            let scan = ndc::scan(&map)?;
            Ok(assemble::assemble_legacy(scan.records, scan.aux, scan.aux_variant))
        }
        Some("nda") => {
            let map = map_file(path)?;
            let records = nda::scan(&map)?;
            Ok(assemble::assemble_legacy(records, Vec::new(), None))
        }
        _ => Err(DecodeError::UnsupportedFormat(format!("{:?}", path))),
    }
}

/// Read an ndax container archive.
pub fn read_ndax(path: &Path) -> Result<RecordTable> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let (server, client) = read_version_info(&mut archive)?;
    log::info!("server: {}", server);
    log::info!("client: {}", client);

    match version::route(&server)? {
        FormatRevision::FixedBlock => read_fixed_block(&mut archive),
        FormatRevision::Legacy(rev) => {
            log::debug!("legacy container, revision {}", rev);
            read_legacy(&mut archive)
        }
    }
}

/// Revision 8: three fixed-block streams, merged by index and step.
fn read_fixed_block<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<RecordTable> {
    let samples = ndc8::read_samples(&read_entry(archive, "data.ndc")?);
    let run_info = ndc8::read_run_info(&read_entry(archive, "data_runInfo.ndc")?);
    let steps = ndc8::read_steps(&read_entry(archive, "data_step.ndc")?)?;
    assemble::assemble_fixed_block(samples, run_info, steps)
}

/// Revisions ≤ 7: one main stream plus any number of auxiliary-channel
/// files, recognizable by a numeric suffix in their entry name.
fn read_legacy<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<RecordTable> {
    let scan = ndc::scan(&read_entry(archive, "data.ndc")?)?;

    let aux_names: Vec<String> = archive
        .file_names()
        .filter(|n| is_aux_entry(n))
        .map(String::from)
        .collect();

    let mut aux = Vec::new();
    let mut aux_variant = None;
    for name in aux_names {
        log::debug!("auxiliary channel file: {}", name);
        let aux_scan = ndc::scan(&read_entry(archive, &name)?)?;
        aux.extend(aux_scan.aux);
        aux_variant = aux_variant.or(aux_scan.aux_variant);
    }

    Ok(assemble::assemble_legacy(scan.records, aux, aux_variant))
}

/// True for entry names of the form `<stem>_<digits>.ndc`
fn is_aux_entry(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".ndc") else {
        return false;
    };
    match stem.rsplit_once('_') {
        Some((_, digits)) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Extract one archive entry into memory.
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => DecodeError::MissingEntry(name.to_string()),
        other => DecodeError::Zip(other),
    })?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Pull the server/client version strings out of `VersionInfo.xml`.
///
/// The manifest is nominally GB2312-encoded, but the version attributes are
/// plain ASCII, so a lossy UTF-8 read keeps them intact.
fn read_version_info<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<(String, String)> {
    let raw = read_entry(archive, "VersionInfo.xml")?;
    let text = String::from_utf8_lossy(&raw);

    let mut server = None;
    let mut client = None;
    let mut reader = quick_xml::Reader::from_str(&text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref() == b"ZwjVersion" =>
            {
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"SvrVer" => server = Some(value),
                        b"CurrClientVer" => client = Some(value),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::BadManifest(e.to_string())),
            Ok(_) => {}
        }
    }

    let server = server.ok_or_else(|| DecodeError::BadManifest("missing SvrVer".to_string()))?;
    Ok((server, client.unwrap_or_default()))
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and private to this scan
    let map = unsafe { Mmap::map(&file)? };
    Ok(map)
}
