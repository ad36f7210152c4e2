//! Read / write dose values as raw little-endian `f32` streams

use std::fs::File;
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::Path;

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    buf.flush()
}

type IORes<T> = std::io::Result<T>;
pub fn read<'a>(path: &Path) -> IORes<impl Iterator<Item = IORes<f32>> + 'a> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut buffer = [0; 4];

    Ok(std::iter::from_fn(move || {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut buffer) {
            Ok(()) => Some(Ok(f32::from_le_bytes(buffer))),
            Err(e) if e.kind() == UnexpectedEof => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn raw_io_roundtrip() -> std::io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("dose.raw");

        let original_data = vec![0.0, 1.23, 4.56, 70.2];
        write(original_data.iter().copied(), &file_path)?;
        let reloaded_data: Vec<_> = read(&file_path)?.collect::<Result<_, _>>()?;

        assert_eq!(original_data, reloaded_data);
        assert_eq!(std::fs::metadata(&file_path)?.len(), 16);
        Ok(())
    }

    #[test]
    fn missing_file() {
        let dir = tempdir().unwrap();
        assert!(read(&dir.path().join("absent.raw")).is_err());
    }
}
