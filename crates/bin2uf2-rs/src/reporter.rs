use std::io::Stdout;

use bin2uf2_core::uf2::UF2_BLOCK_SIZE;
use pbr::{ProgressBar, Units};

/// Wraps a writer and advances a progress bar as UF2 blocks go through it.
pub struct ProgressBarReporter<T> {
    pb: ProgressBar<Stdout>,
    inner: T,
}

impl<T> ProgressBarReporter<T>
where
    T: std::io::Write,
{
    pub fn new(block_count: usize, inner: T) -> Self {
        let mut pb = ProgressBar::new((block_count * UF2_BLOCK_SIZE) as u64);
        pb.set_units(Units::Bytes);

        Self { pb, inner }
    }

    pub fn finish(&mut self) {
        self.pb.finish();
    }
}

impl<T> std::io::Write for ProgressBarReporter<T>
where
    T: std::io::Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.pb.add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
