use std::fs::File;
use std::io::BufRead;
use std::path::Path;
use crate::content::ContentId;
use crate::error::{SimError, SimResult};

/// Opens a trace file for buffered line reading
///
/// On unix the trace is memory mapped with sequential access advice, since a replay reads it once
/// front to back. Elsewhere it goes through a plain buffered reader
fn trace_reader(file: File, path: &Path) -> SimResult<impl BufRead> {
    #[cfg(not(unix))]
    {
        let _ = path;
        const BUFFER_SIZE: usize = 64 * 4096;
        Ok(std::io::BufReader::with_capacity(BUFFER_SIZE, file))
    }
    #[cfg(unix)]
    {
        use std::io::Cursor;
        use memmap2::{Advice, Mmap};
        // Safety: the trace is only read, and must not be truncated while it is being replayed
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| SimError::config(format!("Couldn't memory map the trace {}: {e}", path.display())))?;
        map.advise(Advice::Sequential)
            .map_err(|e| SimError::config(format!("Couldn't advise sequential reads of the trace {}: {e}", path.display())))?;
        Ok(Cursor::new(map))
    }
}

/// Reads up to `limit` content ids from a request trace
///
/// The trace holds one decimal content id per line. Blank lines and lines starting with `#` are
/// skipped. Every id must fall inside a catalog of `n_contents` items
pub fn read_trace(path: &Path, n_contents: usize, limit: u64) -> SimResult<Vec<ContentId>> {
    let file = File::open(path).map_err(|e| SimError::config(format!("Couldn't open the trace file at path {}: {e}", path.display())))?;
    // An empty file can't be mapped
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }
    parse_trace(trace_reader(file, path)?, n_contents, limit)
}

/// Parses trace lines from any buffered reader, see [`read_trace`]
pub fn parse_trace<R: BufRead>(reader: R, n_contents: usize, limit: u64) -> SimResult<Vec<ContentId>> {
    let mut ids = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        if ids.len() as u64 >= limit {
            break;
        }
        let line = line?;
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        let id: ContentId = token
            .parse()
            .map_err(|e| SimError::config(format!("trace line {}: {token:?} is not a content id ({e})", line_number + 1)))?;
        if id as usize >= n_contents {
            return Err(SimError::config(format!(
                "trace line {}: content {id} is outside the catalog of {n_contents} items",
                line_number + 1
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skips_comments_and_stops_at_limit() {
        let trace = "# header\n3\n\n1\n 2 \n0\n";
        assert_eq!(parse_trace(trace.as_bytes(), 4, 3).unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn reads_trace_files_from_disk() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("netcache-io-trace-{}.txt", std::process::id()));
        std::fs::write(&path, "# ids\n4\n0\n4\n").unwrap();
        assert_eq!(read_trace(&path, 5, 10).unwrap(), vec![4, 0, 4]);
        assert_eq!(read_trace(&path, 5, 2).unwrap(), vec![4, 0]);

        std::fs::write(&path, "").unwrap();
        assert!(read_trace(&path, 5, 10).unwrap().is_empty());
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(read_trace(&path, 5, 10), Err(SimError::Configuration(_))));
    }

    #[test]
    fn rejects_ids_outside_catalog() {
        let result = parse_trace("1\n9\n".as_bytes(), 4, 10);
        assert!(matches!(result, Err(SimError::Configuration(_))));
        let result = parse_trace("one\n".as_bytes(), 4, 10);
        assert!(matches!(result, Err(SimError::Configuration(_))));
    }
}
