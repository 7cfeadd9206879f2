use image::GrayImage;

/// One grayscale still from the camera and the wall-clock time its capture
/// completed, in seconds since the Unix epoch.
#[derive(Debug, Clone)]
pub struct Sample {
    pixels: GrayImage,
    captured_at: f64,
}

impl Sample {
    pub fn new(pixels: GrayImage, captured_at: f64) -> Self {
        Self {
            pixels,
            captured_at,
        }
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn captured_at(&self) -> f64 {
        self.captured_at
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Current wall-clock time as fractional Unix seconds.
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
