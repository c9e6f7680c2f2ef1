//! Filesystem primitives over the raw REPL.
//!
//! Each call enters raw mode, runs a short command batch and leaves again.
//! Anything the board writes to stderr fails the operation. File contents
//! travel hex-encoded so binary data survives the text channel.

use super::FileEntry;
use crate::error::{LinkError, LinkResult};
use crate::protocol::{raw, ProtocolResult};
use crate::session::SerialSession;
use std::path::Path;
use tracing::debug;

/// Bytes per `unhexlify` line when uploading.
const PUT_CHUNK: usize = 64;

/// Bytes per `read` on the board when downloading.
const GET_CHUNK: usize = 32;

const TREE_SCRIPT: &str = "def _t(p):
    for e in (os.ilistdir(p) if p else os.ilistdir()):
        n = p + '/' + e[0] if p else e[0]
        if e[1] & 0x4000:
            print('D', n)
            _t(n)
        else:
            print('F', os.stat(n)[6], n)";

/// Quote `s` as a Python string literal.
pub(crate) fn py_str(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

fn run<S: AsRef<str>>(link: &mut SerialSession, commands: &[S]) -> LinkResult<ProtocolResult> {
    let result = raw::execute(link, commands)?;
    if !result.stderr.is_empty() {
        return Err(LinkError::protocol(&result.stderr));
    }
    Ok(result)
}

/// Names in the device's root directory.
pub fn ls(link: &mut SerialSession) -> LinkResult<Vec<FileEntry>> {
    let result = run(link, &["import os", "print(os.listdir())"])?;
    let names = parse_str_list(result.stdout_text().trim())
        .ok_or_else(|| LinkError::protocol(&result.stdout))?;
    Ok(names.into_iter().map(|n| FileEntry::file(n, None)).collect())
}

/// Recursive listing with file sizes.
pub fn tree(link: &mut SerialSession) -> LinkResult<Vec<FileEntry>> {
    let result = run(link, &["import os", TREE_SCRIPT, "_t('')"])?;
    parse_tree(&result.stdout_text()).ok_or_else(|| LinkError::protocol(&result.stdout))
}

/// Read `device_path` from the board.
pub fn get(link: &mut SerialSession, device_path: &str) -> LinkResult<Vec<u8>> {
    let read_loop = format!(
        "while True:\n    b = r({})\n    if not b:\n        break\n    \
         sys.stdout.write(ubinascii.hexlify(b))",
        GET_CHUNK
    );
    let commands = vec![
        "import sys".to_string(),
        "import ubinascii".to_string(),
        format!("f = open({}, 'rb')", py_str(device_path)),
        "r = f.read".to_string(),
        read_loop,
        "f.close()".to_string(),
    ];
    let result = run(link, &commands)?;

    let text: String = result
        .stdout_text()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(text).map_err(|_| LinkError::protocol(&result.stdout))
}

/// Write `data` to `device_path` on the board, replacing any existing file.
pub fn put(link: &mut SerialSession, data: &[u8], device_path: &str) -> LinkResult<()> {
    let mut commands = vec![
        "import ubinascii".to_string(),
        format!("f = open({}, 'wb')", py_str(device_path)),
        "w = f.write".to_string(),
    ];
    commands.extend(
        data.chunks(PUT_CHUNK)
            .map(|chunk| format!("w(ubinascii.unhexlify('{}'))", hex::encode(chunk))),
    );
    commands.push("f.close()".to_string());

    run(link, &commands)?;
    debug!("Wrote {} bytes to {}", data.len(), device_path);
    Ok(())
}

/// Remove `device_path` from the board.
pub fn delete(link: &mut SerialSession, device_path: &str) -> LinkResult<()> {
    run(link, &["import os".to_string(), format!("os.remove({})", py_str(device_path))])?;
    Ok(())
}

/// Device path for uploading `local` into `dest` (root when `None`).
pub fn upload_target(local: &Path, dest: Option<&str>) -> Option<String> {
    let name = local.file_name()?.to_str()?;
    Some(match dest.map(|d| d.trim_end_matches('/')) {
        Some(dir) if !dir.is_empty() => format!("{}/{}", dir, name),
        _ => name.to_string(),
    })
}

/// Parse a printed Python list of strings, e.g. `['a.py', "b'c.py"]`.
pub(crate) fn parse_str_list(text: &str) -> Option<Vec<String>> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let quote = match chars.next() {
            None => return Some(items),
            Some(q @ ('\'' | '"')) => q,
            Some(_) => return None,
        };

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => match chars.next()? {
                    'n' => item.push('\n'),
                    'r' => item.push('\r'),
                    't' => item.push('\t'),
                    other => item.push(other),
                },
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);
    }
}

/// Build a tree from `D <path>` / `F <size> <path>` lines.
pub(crate) fn parse_tree(text: &str) -> Option<Vec<FileEntry>> {
    let mut root = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (kind, rest) = line.split_once(' ')?;
        match kind {
            "D" => insert(&mut root, rest, None, true),
            "F" => {
                let (size, path) = rest.split_once(' ')?;
                insert(&mut root, path, Some(size.parse().ok()?), false);
            }
            _ => return None,
        }
    }
    Some(root)
}

fn insert(level: &mut Vec<FileEntry>, path: &str, size: Option<u64>, is_dir: bool) {
    match path.split_once('/') {
        Some((dir, rest)) => {
            let index = match level.iter().position(|e| e.name == dir && e.is_dir()) {
                Some(i) => i,
                None => {
                    level.push(FileEntry::dir(dir));
                    level.len() - 1
                }
            };
            if let Some(children) = level[index].children.as_mut() {
                insert(children, rest, size, is_dir);
            }
        }
        None if is_dir => {
            if !level.iter().any(|e| e.name == path && e.is_dir()) {
                level.push(FileEntry::dir(path));
            }
        }
        None => level.push(FileEntry::file(path, size)),
    }
}
