//! End-to-end tests of the soft stretch on synthetic histograms and images.

use approx::assert_relative_eq;
use ndarray::Array3;
use softstretch::extract::{self, median_adu};
use softstretch::{
    soft_stretch, Histogram, Image16, PreviewSession, SoftStretchConfig, StretchWarning,
    ToneCurveExecutor, BINS_16BIT,
};

/// Linear rise from `edge` to `center`, then a slower linear fall.
fn sky_channel(bins: usize, edge: usize, center: usize) -> Vec<u64> {
    let height = (center - edge) as u64;
    (0..bins)
        .map(|i| {
            if i < edge {
                0
            } else if i <= center {
                (i - edge) as u64
            } else {
                height.saturating_sub((i - center) as u64 / 2)
            }
        })
        .collect()
}

#[test]
fn test_only_bin_zero_populated() {
    let mut counts = vec![0u64; 1024];
    counts[0] = 5000;
    let hist = Histogram::from_channels(vec![counts]).unwrap();

    let result = soft_stretch(&hist, &hist.medians(), &SoftStretchConfig::default()).unwrap();

    assert_eq!(result.parameters.black_point, 0.0);
    assert_eq!(result.channel_stats[0].white_point_adu, 0);
    assert_eq!(result.channel_stats[0].median_adu, 0);
    assert_eq!(result.channel_stats[0].black_point_adu, 0);
    assert_eq!(result.channel_stats[0].clipped_pixel_count, 0);
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, StretchWarning::DegenerateWindow { .. })));
}

#[test]
fn test_full_range_sky_with_strong_aggressiveness() {
    let hist = Histogram::from_channels(vec![sky_channel(BINS_16BIT, 10_000, 32_768)]).unwrap();
    let config = SoftStretchConfig {
        ht_expand_low: 0.05,
        zero_in_white_point: false,
        aggressiveness: 10.0,
        median_target: 0.2,
    };

    let result = soft_stretch(&hist, &[0.5], &config).unwrap();
    let params = result.parameters;

    assert_eq!(params.white_point, 1.0);
    assert!(params.black_point >= 0.0 && params.black_point < 0.5);
    assert!(params.midtones_balance > 0.0 && params.midtones_balance < 1.0);
    assert_eq!(params.shadows_clip, -0.05);
    assert_eq!(params.highlights_clip, 1.0);
    assert_eq!(result.channel_stats[0].median_adu, 32_768);

    // The median leaves the tone curve at the requested target
    assert_relative_eq!(params.transform_row().map(0.5), 0.2, epsilon = 1e-6);
}

#[test]
fn test_median_bin_is_truncated() {
    let bins = 1000;
    assert_eq!(median_adu(0.4999, bins), 499);
    assert_eq!(median_adu(0.5, bins), 500);

    let hist = Histogram::from_channels(vec![sky_channel(bins, 100, 400)]).unwrap();
    let result = soft_stretch(&hist, &[0.4999], &SoftStretchConfig::default()).unwrap();
    assert_eq!(result.channel_stats[0].median_adu, 499);
}

#[test]
fn test_aggressiveness_moves_window_start_up() {
    let hist = Histogram::from_channels(vec![sky_channel(4096, 300, 900)]).unwrap();
    let medians = hist.medians();

    let starts: Vec<usize> = [1.0, 2.0, 5.0, 10.0, 50.0]
        .iter()
        .map(|&a| extract::extract(&hist, &medians, a).unwrap().profiles[0].mad_min_adu)
        .collect();

    assert!(starts.windows(2).all(|w| w[1] >= w[0]), "{starts:?}");
    assert!(starts[4] > starts[0]);
}

#[test]
fn test_rgb_uses_lowest_black_and_mean_median() {
    let channels = vec![
        sky_channel(4096, 300, 900),
        sky_channel(4096, 400, 1000),
        sky_channel(4096, 500, 1100),
    ];
    let hist = Histogram::from_channels(channels).unwrap();
    let medians = hist.medians();

    let result = soft_stretch(&hist, &medians, &SoftStretchConfig::default()).unwrap();

    let blacks: Vec<usize> = result
        .channel_stats
        .iter()
        .map(|s| s.black_point_adu)
        .collect();
    assert!(blacks[0] < blacks[1] && blacks[1] < blacks[2]);
    assert_relative_eq!(
        result.parameters.black_point,
        hist.normalize(blacks[0]),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        result.median,
        medians.iter().sum::<f64>() / 3.0,
        epsilon = 1e-12
    );
    assert_eq!(result.reports.len(), 3);

    // Every channel is recounted against the common black point
    for (c, stats) in result.channel_stats.iter().enumerate() {
        assert_eq!(
            stats.clipped_pixel_count,
            extract::clipped_pixel_count(hist.channel(c), blacks[0])
        );
    }
}

#[test]
fn test_grayscale_fills_all_three_slots() {
    let hist = Histogram::from_channels(vec![sky_channel(4096, 300, 900)]).unwrap();
    let result = soft_stretch(&hist, &hist.medians(), &SoftStretchConfig::default()).unwrap();

    assert_eq!(result.channel_stats[0], result.channel_stats[1]);
    assert_eq!(result.channel_stats[0], result.channel_stats[2]);
    assert_eq!(result.reports.len(), 1);
}

#[test]
fn test_image_median_lands_on_target() {
    let pixels: Vec<u16> = (0..4096u32)
        .map(|k| (1500 + (k * 7919) % 1000 + (k % 64) * 20) as u16)
        .collect();
    let array = Array3::from_shape_vec((64, 64, 1), pixels).unwrap();
    let mut image = Image16::new(array).unwrap();

    let hist = image.histogram().unwrap();
    let config = SoftStretchConfig::default();
    let result = soft_stretch(&hist, &hist.medians(), &config).unwrap();

    image
        .execute(&result.parameters.to_histogram_transform())
        .unwrap();

    let mut out: Vec<u16> = image.into_inner().iter().copied().collect();
    out.sort_unstable();
    let median_out = out[2047] as f64 / 65535.0;
    assert!(
        (median_out - config.median_target).abs() < 1e-3,
        "stretched median {median_out}"
    );
}

#[test]
fn test_preview_session_tracks_config_changes() {
    let hist = Histogram::from_channels(vec![sky_channel(4096, 300, 900)]).unwrap();
    let medians = hist.medians();
    let session = PreviewSession::new(hist, medians).unwrap();

    let gentle = session
        .try_update(&SoftStretchConfig::default())
        .unwrap()
        .unwrap();
    let strong = session
        .try_update(&SoftStretchConfig {
            median_target: 0.35,
            ..Default::default()
        })
        .unwrap()
        .unwrap();

    assert_eq!(gentle.parameters.black_point, strong.parameters.black_point);
    assert!(strong.parameters.midtones_balance < gentle.parameters.midtones_balance);
}

#[test]
fn test_result_serializes_warnings_by_kind() {
    let mut counts = vec![0u64; 256];
    counts[0] = 10;
    let hist = Histogram::from_channels(vec![counts]).unwrap();
    let result = soft_stretch(&hist, &hist.medians(), &SoftStretchConfig::default()).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    let kinds: Vec<&str> = json["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|w| w["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"degenerate_window"));
    assert!(json["parameters"]["midtones_balance"].is_number());
}
