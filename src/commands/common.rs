use std::{
    fs,
    io::Write,
    path::Path,
};

use anyhow::{
    bail,
    Context,
};

use crate::types::{
    Result,
    Vector,
};


/// Write a set of equally-long columns to a whitespace-separated text file,
/// with a single '#' comment line on top.
pub fn write_array_to_txt(file_name: &(impl AsRef<Path> + ?Sized),
                          ys: Vec<&Vector<f64>>,
                          comment: &str) -> Result<()> {
    let ncol = ys.len();

    let x = ys.first().context("at least one data column is needed")?;
    let nrow = x.len();

    if nrow == 0 || !ys.iter().all(|y| y.len() == nrow) {
        bail!("input columns are empty or do not have consistent lengths");
    }

    let mut f = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(file_name)?;

    writeln!(f, "# {}", comment.trim())?;

    for irow in 0 .. nrow {
        let mut s = String::with_capacity(16 * ncol);
        for col in ys.iter() {
            s.push_str(&format!("  {:15.8}", col[irow]));
        }
        s.push('\n');

        f.write_all(s.as_bytes())?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use tempdir::TempDir;

    #[test]
    fn test_write_array_to_txt() {
        let dir = TempDir::new("rsphon").unwrap();
        let path = dir.path().join("cols.txt");

        let x = arr1(&[0.0, 1.0, 2.0]);
        let y = arr1(&[1.0, 4.0, 9.0]);
        write_array_to_txt(&path, vec![&x, &y], "x y").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# x y\n"));
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_inconsistent_columns_rejected() {
        let dir = TempDir::new("rsphon").unwrap();
        let path = dir.path().join("cols.txt");

        let x = arr1(&[0.0, 1.0]);
        let y = arr1(&[1.0]);
        assert!(write_array_to_txt(&path, vec![&x, &y], "bad").is_err());
        assert!(write_array_to_txt(&path, vec![], "empty").is_err());
    }
}
