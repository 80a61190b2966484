// Capture frame buffer
//
// Mirrors the most recently rendered frame at the capture resolution. The
// host's frame may be any size; it is resampled (nearest neighbour) into the
// capture buffer, the way a full-screen blit into a fixed-size render target
// would.

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// A borrowed RGBA8 frame from the host renderer
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    /// Tightly packed rows, top to bottom
    pub data: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self { width, height, data }
    }

    /// Whether `data` holds exactly `width * height` pixels
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// RGBA buffer owned by the capturing component
#[derive(Debug, Default)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the buffer matches the capture size, reallocating on change
    ///
    /// Returns true when a reallocation happened.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height && !self.pixels.is_empty() {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * BYTES_PER_PIXEL];
        log::debug!("Capture buffer allocated at {}x{}", width, height);
        true
    }

    /// Copy a host frame into the buffer, scaling when sizes differ
    pub fn blit_from(&mut self, source: &FrameView<'_>) {
        if !source.is_well_formed() || self.pixels.is_empty() {
            return;
        }

        if source.width == self.width && source.height == self.height {
            self.pixels.copy_from_slice(source.data);
            return;
        }

        let dst_w = self.width as usize;
        let dst_h = self.height as usize;
        let src_w = source.width as usize;
        let src_h = source.height as usize;

        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            let src_row = &source.data[sy * src_w * BYTES_PER_PIXEL..(sy + 1) * src_w * BYTES_PER_PIXEL];
            let dst_row = &mut self.pixels[y * dst_w * BYTES_PER_PIXEL..(y + 1) * dst_w * BYTES_PER_PIXEL];
            for x in 0..dst_w {
                let sx = x * src_w / dst_w;
                dst_row[x * BYTES_PER_PIXEL..(x + 1) * BYTES_PER_PIXEL]
                    .copy_from_slice(&src_row[sx * BYTES_PER_PIXEL..(sx + 1) * BYTES_PER_PIXEL]);
            }
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Drop the pixel storage
    pub fn release(&mut self) {
        self.pixels = Vec::new();
        self.width = 0;
        self.height = 0;
    }
}
