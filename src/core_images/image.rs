use crate::error::{BatchError, BatchResult};

/// Decoded core photograph, row-major, `channels` interleaved bytes per pixel.
/// Rows run along the core's length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreImage {
    rows: usize,
    cols: usize,
    channels: usize,
    data: Vec<u8>,
}

impl CoreImage {
    pub fn new(rows: usize, cols: usize, channels: usize, data: Vec<u8>) -> BatchResult<Self> {
        if channels == 0 {
            return Err(BatchError::InvalidArgument {
                name: "channels".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if data.len() != rows * cols * channels {
            return Err(BatchError::contract(format!(
                "{} bytes for a {rows}x{cols}x{channels} image",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            channels,
            data,
        })
    }

    pub fn filled(rows: usize, cols: usize, channels: usize, value: u8) -> Self {
        Self {
            rows,
            cols,
            channels: channels.max(1),
            data: vec![value; rows * cols * channels.max(1)],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.channels)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn row_len(&self) -> usize {
        self.cols * self.channels
    }

    pub fn row(&self, row: usize) -> Option<&[u8]> {
        let len = self.row_len();
        self.data.get(row * len..(row + 1) * len)
    }

    /// Top-left `rows x cols` region; dimensions larger than the image are clamped
    pub fn truncated(&self, rows: usize, cols: usize) -> Self {
        let rows = rows.min(self.rows);
        let cols = cols.min(self.cols);
        let keep = cols * self.channels;
        let mut data = Vec::with_capacity(rows * keep);
        for row in self.data.chunks_exact(self.row_len().max(1)).take(rows) {
            data.extend_from_slice(&row[..keep]);
        }
        Self {
            rows,
            cols,
            channels: self.channels,
            data,
        }
    }

    /// Image mirrored top to bottom
    pub fn flipped_vertically(&self) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(self.row_len().max(1)).rev() {
            data.extend_from_slice(row);
        }
        Self {
            data,
            ..self.clone()
        }
    }

    /// Rows `offset..offset + length`
    pub fn rows_window(&self, offset: usize, length: usize) -> BatchResult<Self> {
        if offset + length > self.rows {
            return Err(BatchError::contract(format!(
                "window {offset}..{} outside an image of {} rows",
                offset + length,
                self.rows
            )));
        }
        let len = self.row_len();
        Ok(Self {
            rows: length,
            cols: self.cols,
            channels: self.channels,
            data: self.data[offset * len..(offset + length) * len].to_vec(),
        })
    }
}
