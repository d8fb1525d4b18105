//! Point-cloud compositors: a compositing rule plus optional background color.

use crate::points::compositing::{
    alpha_composite, norm_weighted_sum, FeatureImages, PointFeatures, PointFragments,
};

/// Accumulates points using front-to-back alpha compositing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlphaCompositor {
    /// RGB or RGBA background for pixels without points
    pub background_color: Option<Vec<f32>>,
}

impl AlphaCompositor {
    pub fn new(background_color: Option<Vec<f32>>) -> Self {
        Self { background_color }
    }

    /// Composite the points; `background_color` overrides the stored one for this call.
    pub fn composite(
        &self,
        fragments: &PointFragments,
        alphas: &[f32],
        features: &PointFeatures,
        background_color: Option<&[f32]>,
    ) -> FeatureImages {
        let images = alpha_composite(fragments, alphas, features);
        let background = background_color.or(self.background_color.as_deref());
        apply_background(fragments, images, background)
    }
}

/// Accumulates points using an alpha-normalized weighted sum.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormWeightedCompositor {
    /// RGB or RGBA background for pixels without points
    pub background_color: Option<Vec<f32>>,
}

impl NormWeightedCompositor {
    pub fn new(background_color: Option<Vec<f32>>) -> Self {
        Self { background_color }
    }

    /// Composite the points; `background_color` overrides the stored one for this call.
    pub fn composite(
        &self,
        fragments: &PointFragments,
        alphas: &[f32],
        features: &PointFeatures,
        background_color: Option<&[f32]>,
    ) -> FeatureImages {
        let images = norm_weighted_sum(fragments, alphas, features);
        let background = background_color.or(self.background_color.as_deref());
        apply_background(fragments, images, background)
    }
}

/// Compositor selected at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum PointCompositor {
    Alpha(AlphaCompositor),
    NormWeighted(NormWeightedCompositor),
}

impl PointCompositor {
    pub fn composite(
        &self,
        fragments: &PointFragments,
        alphas: &[f32],
        features: &PointFeatures,
        background_color: Option<&[f32]>,
    ) -> FeatureImages {
        match self {
            PointCompositor::Alpha(c) => c.composite(fragments, alphas, features, background_color),
            PointCompositor::NormWeighted(c) => {
                c.composite(fragments, alphas, features, background_color)
            }
        }
    }
}

/// Background injection only applies to RGBA images (C == 4).
fn apply_background(
    fragments: &PointFragments,
    images: FeatureImages,
    background_color: Option<&[f32]>,
) -> FeatureImages {
    match background_color {
        Some(bg) if images.channels == 4 => add_background_color_to_images(fragments, images, bg),
        _ => images,
    }
}

/// Overwrite pixels with no nearest point by `background_color`.
///
/// `background_color` must hold 3 (RGB, alpha 1 appended) or 4 (RGBA) values
/// in [0, 1]. Any other length logs a warning and returns `images` unchanged.
/// Only the first four channels are written.
pub fn add_background_color_to_images(
    fragments: &PointFragments,
    mut images: FeatureImages,
    background_color: &[f32],
) -> FeatureImages {
    let rgba: [f32; 4] = match *background_color {
        [r, g, b] => [r, g, b, 1.0],
        [r, g, b, a] => [r, g, b, a],
        _ => {
            tracing::warn!(
                "Background color should be size (3) or (4), but is size ({}) instead",
                background_color.len()
            );
            return images;
        }
    };

    let channels = images.channels.min(4);
    let mut num_background = 0usize;
    for pixel in 0..fragments.num_pixels() {
        if !fragments.is_background(pixel) {
            continue;
        }
        num_background += 1;
        for (c, &v) in rgba.iter().enumerate().take(channels) {
            let i = images.index(pixel, c);
            images.data[i] = v;
        }
    }
    tracing::debug!(num_background, "applied point compositor background");

    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn rgba_scene() -> (PointFragments, Vec<f32>, PointFeatures) {
        // (N, K, H, W) = (1, 1, 1, 2): pixel 0 sees point 0, pixel 1 is empty.
        let frags = PointFragments::new(1, 1, 1, 2, vec![0, -1]);
        let alphas = vec![1.0, 0.0];
        let feats = PointFeatures::from_points(&[vec![0.1, 0.2, 0.3, 1.0]]);
        (frags, alphas, feats)
    }

    #[test]
    fn test_rgb_background_gets_opaque_alpha() {
        let (frags, alphas, feats) = rgba_scene();
        let comp = AlphaCompositor::new(Some(vec![0.5, 0.6, 0.7]));
        let img = comp.composite(&frags, &alphas, &feats, None);
        assert_eq!(img.pixel(1).as_slice(), &[0.5, 0.6, 0.7, 1.0]);
        // Covered pixel untouched
        assert_eq!(img.pixel(0).as_slice(), &[0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn test_override_beats_stored_background() {
        let (frags, alphas, feats) = rgba_scene();
        let comp = NormWeightedCompositor::new(Some(vec![0.5, 0.6, 0.7]));
        let img = comp.composite(&frags, &alphas, &feats, Some(&[0.0, 0.0, 0.0, 0.25]));
        assert_eq!(img.pixel(1).as_slice(), &[0.0, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn test_non_rgba_images_are_untouched() {
        let frags = PointFragments::new(1, 1, 1, 2, vec![0, -1]);
        let feats = PointFeatures::from_points(&[vec![0.1, 0.2, 0.3]]);
        let comp = AlphaCompositor::new(Some(vec![1.0, 1.0, 1.0]));
        let img = comp.composite(&frags, &[1.0, 0.0], &feats, None);
        assert_eq!(img.pixel(1).as_slice(), &[0.0, 0.0, 0.0]);
    }

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_bad_background_length_warns_and_is_identity() {
        let (frags, alphas, feats) = rgba_scene();
        let plain = alpha_composite(&frags, &alphas, &feats);
        let comp = PointCompositor::Alpha(AlphaCompositor::new(Some(vec![0.1; 5])));

        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || sink.clone())
            .finish();
        let img = tracing::subscriber::with_default(subscriber, || {
            comp.composite(&frags, &alphas, &feats, None)
        });

        assert_eq!(img, plain);
        let text = logs.text();
        assert!(text.contains("WARN"), "no warning logged: {text:?}");
        assert!(text.contains("size (3) or (4), but is size (5)"), "{text:?}");
    }

    #[test]
    fn test_valid_background_does_not_warn() {
        let (frags, alphas, feats) = rgba_scene();
        let comp = AlphaCompositor::new(Some(vec![0.5, 0.6, 0.7]));

        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            comp.composite(&frags, &alphas, &feats, None)
        });
        assert!(logs.text().is_empty());
    }
}
