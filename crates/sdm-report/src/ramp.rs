//! Color ramps for the raster overlays.

pub type Rgb = [u8; 3];

/// Viridis-like stops for suitability in [0, 1].
const SUITABILITY_STOPS: &[Rgb] = &[
    [68, 1, 84],
    [59, 82, 139],
    [33, 145, 140],
    [94, 201, 98],
    [253, 231, 37],
];

/// Blue-white-red stops for the symmetric difference domain.
const DIFFERENCE_STOPS: &[Rgb] = &[[33, 102, 172], [247, 247, 247], [178, 24, 43]];

fn sample(stops: &[Rgb], t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let scaled = t * (stops.len() - 1) as f64;
    let i = (scaled as usize).min(stops.len() - 2);
    let frac = scaled - i as f64;
    let (a, b) = (stops[i], stops[i + 1]);
    [
        (a[0] as f64 + (b[0] as f64 - a[0] as f64) * frac) as u8,
        (a[1] as f64 + (b[1] as f64 - a[1] as f64) * frac) as u8,
        (a[2] as f64 + (b[2] as f64 - a[2] as f64) * frac) as u8,
    ]
}

/// Color for a normalized suitability value in [0, 1].
pub fn suitability_color(t: f64) -> Rgb {
    sample(SUITABILITY_STOPS, t)
}

/// Color for a normalized difference value in [0, 1], where 0.5 is
/// "no change".
pub fn difference_color(t: f64) -> Rgb {
    sample(DIFFERENCE_STOPS, t)
}

/// CSS gradient stops for a legend bar.
pub fn gradient_css(ramp: fn(f64) -> Rgb) -> String {
    let stops: Vec<String> = (0..=10)
        .map(|i| {
            let [r, g, b] = ramp(i as f64 / 10.0);
            format!("rgb({r},{g},{b}) {}%", i * 10)
        })
        .collect();
    format!("linear-gradient(to right, {})", stops.join(", "))
}
