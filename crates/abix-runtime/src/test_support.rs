//! Fakes for the fetch and process seams, and archive builders.

use abix_core::{AbixError, Result};
use crate::{CommandRunner, ComposedEnv, Fetcher};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// In-memory fetcher: serves registered bodies and records every URL asked for.
#[derive(Default)]
pub struct FakeFetcher {
    bodies: RefCell<HashMap<String, Vec<u8>>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.borrow_mut().insert(url.to_string(), body);
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.calls.borrow_mut().push(url.to_string());
        let body = self
            .bodies
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| AbixError::transport(url, "HTTP 404"))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dest, body).unwrap();
        Ok(())
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        self.calls.borrow_mut().push(url.to_string());
        self.bodies
            .borrow()
            .get(url)
            .map(|b| String::from_utf8_lossy(b).to_string())
            .ok_or_else(|| AbixError::transport(url, "HTTP 404"))
    }
}

/// Records invocations; optionally creates files (relative to `cwd`) to
/// simulate what the real program would have produced.
#[derive(Default)]
pub struct FakeRunner {
    pub invocations: RefCell<Vec<(PathBuf, Vec<String>)>>,
    pub creates: Vec<PathBuf>,
    pub exit_code: i32,
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &Path, args: &[String], cwd: &Path, _env: &ComposedEnv) -> Result<i32> {
        self.invocations
            .borrow_mut()
            .push((program.to_path_buf(), args.to_vec()));
        for rel in &self.creates {
            let p = cwd.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, b"stub").unwrap();
        }
        Ok(self.exit_code)
    }
}

/// Build a `.tar.gz` with the given `(path, contents)` regular files.
pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let enc = GzEncoder::new(Vec::new(), Compression::fast());
    let mut builder = tar::Builder::new(enc);
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut w = zip::ZipWriter::new(&mut cursor);
        for (path, data) in entries {
            w.start_file(*path, zip::write::FileOptions::default()).unwrap();
            w.write_all(data).unwrap();
        }
        w.finish().unwrap();
    }
    cursor.into_inner()
}

pub fn sha256(bytes: &[u8]) -> String {
    crate::transport::sha256_hex(bytes)
}
