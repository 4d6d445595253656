use super::*;
use crate::kernel::cache::KernelCacheOpts;
use crate::kernel::interpolator::{BoxInterpolator, CubicInterpolator, LanczosInterpolator};

fn pools<T: KernelWeight>() -> KernelCache<T> {
    KernelCache::new(KernelCacheOpts::default())
}

fn settings_grid() -> Vec<InterpolationSettings> {
    vec![
        InterpolationSettings::nearest(),
        InterpolationSettings::average(),
        InterpolationSettings::linear(),
        InterpolationSettings::catmull_rom(),
        InterpolationSettings::mitchell(),
        InterpolationSettings::lanczos(),
        InterpolationSettings::spline36(),
        InterpolationSettings::new(Arc::new(CubicInterpolator::b_spline()), 1.5).unwrap(),
    ]
}

const SIZES: [(u32, u32); 9] = [
    (100, 60),
    (60, 100),
    (5, 5),
    (1, 7),
    (7, 1),
    (2, 9),
    (640, 480),
    (33, 32),
    (3, 200),
];

/// Minimal filter with a wide triangle and no identity.
#[derive(Debug)]
struct WideTriangle;

impl Interpolator for WideTriangle {
    fn support(&self) -> f64 {
        2.5
    }

    fn value(&self, d: f64) -> f64 {
        (1.0 - d / 2.5).max(0.0)
    }
}

#[test]
fn float_weights_sum_to_one_and_windows_stay_in_bounds() {
    let cache = pools::<f32>();
    for settings in settings_grid() {
        for (input, output) in SIZES {
            for channels in [1, 3, 4] {
                for offset in [0.0, 0.25] {
                    let map =
                        build_map::<f32>(input, output, &settings, channels, offset, cache.pools())
                            .unwrap();
                    let view = map.view().unwrap();
                    assert_eq!(view.pixels(), output as usize);
                    for i in 0..map.pixels() {
                        assert!(view.start(i) + map.samples() <= input as usize);
                        let w = view.weights(i);
                        assert_eq!(w.len(), map.samples() * map.channels());
                        let sum: f64 = w
                            .iter()
                            .step_by(map.channels())
                            .map(|&v| f64::from(v))
                            .sum();
                        assert!(
                            (sum - 1.0).abs() < 1e-5,
                            "{input}->{output} c{channels} i{i}: {sum}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn fixed_weights_sum_exactly() {
    let cache = pools::<i32>();
    for settings in settings_grid() {
        for (input, output) in SIZES {
            let map = build_map::<i32>(input, output, &settings, 3, 0.0, cache.pools()).unwrap();
            assert_eq!(map.channels(), 1);
            let view = map.view().unwrap();
            for i in 0..map.pixels() {
                assert!(view.start(i) + map.samples() <= input as usize);
                let sum: i32 = view.weights(i).iter().sum();
                assert_eq!(sum, UQ15_ONE, "{input}->{output} i{i}");
            }
        }
    }
}

#[test]
fn periodic_ratio_shares_storage() {
    let cache = pools::<f32>();
    let settings = InterpolationSettings::catmull_rom();
    let map = build_map::<f32>(100, 60, &settings, 1, 0.0, cache.pools()).unwrap();
    let view = map.view().unwrap();
    let vlen = map.samples() * map.channels();

    // Positions 0, 1, 58 and 59 touch an edge; everything else repeats with period 3.
    for i in 5..=57 {
        assert_eq!(view.weight_offset(i), view.weight_offset(i - 3), "i={i}");
        let a: Vec<u32> = view.weights(i).iter().map(|w| w.to_bits()).collect();
        let b: Vec<u32> = view.weights(i - 3).iter().map(|w| w.to_bits()).collect();
        assert_eq!(a, b);
        assert_eq!(view.start(i), view.start(i - 3) + 5);
    }
    assert!(view.stored_len() < 60 * vlen);
    assert!(view.stored_len() <= 10 * vlen);
}

#[test]
fn fixed_point_maps_dedup_too() {
    let cache = pools::<i32>();
    let settings = InterpolationSettings::lanczos();
    let map = build_map::<i32>(100, 60, &settings, 1, 0.0, cache.pools()).unwrap();
    let view = map.view().unwrap();
    assert!(view.stored_len() < 60 * map.samples());

    let unit = build_map::<i32>(100, 100, &InterpolationSettings::linear(), 1, 0.0, cache.pools())
        .unwrap();
    let view = unit.view().unwrap();
    assert_eq!(view.weight_offset(50), view.weight_offset(51));
}

#[test]
fn left_edge_folds_out_of_range_weight() {
    let cache = pools::<f32>();
    let settings = InterpolationSettings::new(Arc::new(WideTriangle), 1.0).unwrap();
    let map = build_map::<f32>(5, 5, &settings, 1, 0.0, cache.pools()).unwrap();
    assert_eq!(map.samples(), 5);
    let view = map.view().unwrap();

    // Unclamped window for output 0 starts at -2 with tap distances 2, 1, 0, 1, 2.
    let raw: Vec<f64> = [2.0, 1.0, 0.0, 1.0, 2.0]
        .iter()
        .map(|&d| WideTriangle.value(d))
        .collect();
    let total: f64 = raw.iter().sum();
    let norm: Vec<f64> = raw.iter().map(|w| w / total).collect();

    assert_eq!(view.start(0), 0);
    let w = view.weights(0);
    let folded = norm[0] + norm[1] + norm[2];
    assert!((f64::from(w[0]) - folded).abs() < 1e-6);
    assert!((f64::from(w[1]) - norm[3]).abs() < 1e-6);
    assert!((f64::from(w[2]) - norm[4]).abs() < 1e-6);
    assert_eq!(w[3], 0.0);
    assert_eq!(w[4], 0.0);

    // The mirrored right edge folds onto the last tap.
    let w = view.weights(4);
    assert!((f64::from(w[4]) - folded).abs() < 1e-6);
}

#[test]
fn point_sampler_picks_centers() {
    let cache = pools::<i32>();
    let map = cache
        .create_resample(4, 2, &InterpolationSettings::nearest(), 1, false)
        .unwrap();
    let view = map.view().unwrap();
    assert_eq!(map.samples(), 1);
    assert_eq!(view.start(0), 1);
    assert_eq!(view.start(1), 3);
    assert_eq!(view.weights(0), &[UQ15_ONE]);
}

#[test]
fn float_kernels_pad_for_three_channels() {
    let cache = pools::<f32>();
    let settings = InterpolationSettings::catmull_rom();
    let map = build_map::<f32>(100, 60, &settings, 3, 0.0, cache.pools()).unwrap();
    // ceil(2 * 2 / 0.6) = 7 taps, padded to 8.
    assert_eq!(map.samples(), 8);
    assert_eq!(map.channels(), 3);
    let view = map.view().unwrap();
    let w = view.weights(30);
    assert_eq!(w.len(), 24);
    assert!(w[21..].iter().all(|&v| v == 0.0));
    assert_eq!(w[0], w[1]);
    assert_eq!(w[1], w[2]);

    let fixed = build_map::<i32>(100, 60, &settings, 3, 0.0, pools::<i32>().pools()).unwrap();
    assert_eq!(fixed.samples(), 7);
}

#[test]
fn tiny_inputs_clamp_support() {
    let cache = pools::<f32>();
    let map = build_map::<f32>(2, 4, &InterpolationSettings::lanczos(), 1, 0.0, cache.pools())
        .unwrap();
    assert_eq!(map.samples(), 2);
    let view = map.view().unwrap();
    for i in 0..4 {
        assert_eq!(view.start(i), 0);
    }
}

#[test]
fn invalid_arguments_are_rejected() {
    let cache = pools::<f32>();
    let s = InterpolationSettings::linear();
    assert!(matches!(
        build_map::<f32>(0, 4, &s, 1, 0.0, cache.pools()),
        Err(ScaleError::Validation(_))
    ));
    assert!(matches!(
        build_map::<f32>(4, 0, &s, 1, 0.0, cache.pools()),
        Err(ScaleError::Validation(_))
    ));
    assert!(matches!(
        build_map::<f32>(4, 4, &s, 5, 0.0, cache.pools()),
        Err(ScaleError::Validation(_))
    ));
    assert!(matches!(
        build_map::<f32>(4, 4, &s, 1, f64::NAN, cache.pools()),
        Err(ScaleError::Validation(_))
    ));
}

#[test]
fn short_weight_buffer_is_reported() {
    let mut out = [0i32; 2];
    assert!(matches!(
        <i32 as KernelWeight>::convert(&[0.25, 0.5, 0.25], &mut out, 1),
        Err(ScaleError::BufferTooSmall(_))
    ));
    let mut out = [0f32; 5];
    assert!(matches!(
        <f32 as KernelWeight>::convert(&[0.5, 0.5], &mut out, 3),
        Err(ScaleError::BufferTooSmall(_))
    ));
}

#[test]
fn rounding_drift_lands_on_largest_tap() {
    let mut out = [0i32; 3];
    <i32 as KernelWeight>::convert(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], &mut out, 1).unwrap();
    assert_eq!(out.iter().sum::<i32>(), UQ15_ONE);
    assert_eq!(out, [10923, 10923, 10922]);
}

#[test]
fn last_release_returns_storage_to_pool() {
    let cache = pools::<f32>();
    let map = build_map::<f32>(64, 16, &InterpolationSettings::linear(), 1, 0.0, cache.pools())
        .unwrap();
    let clone = map.try_clone().unwrap();
    assert_eq!(map.ref_count(), 2);
    assert!(map.shares_storage_with(&clone));

    let returned = cache.pools().index.stats().returned_buffers;
    drop(map);
    assert_eq!(cache.pools().index.stats().returned_buffers, returned);
    assert!(clone.view().is_ok());
    assert_eq!(clone.ref_count(), 1);

    drop(clone);
    assert_eq!(cache.pools().index.stats().returned_buffers, returned + 1);
}

#[test]
fn acquire_fails_on_non_positive_count() {
    let cache = pools::<f32>();
    let map = build_map::<f32>(8, 4, &InterpolationSettings::linear(), 1, 0.0, cache.pools())
        .unwrap();
    map.storage.refs.store(0, Ordering::Release);
    assert!(map.try_clone().is_none());
    assert!(matches!(map.view(), Err(ScaleError::Disposed(_))));
    map.storage.refs.store(1, Ordering::Release);
    assert!(map.view().is_ok());
}

#[test]
fn concurrent_acquire_release_never_frees_live_storage() {
    let cache = pools::<f32>();
    let map = build_map::<f32>(
        100,
        60,
        &InterpolationSettings::new(Arc::new(LanczosInterpolator::new(2).unwrap()), 1.0)
            .unwrap(),
        4,
        0.0,
        cache.pools(),
    )
    .unwrap();
    let returned = cache.pools().weights.stats().returned_buffers;

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..500 {
                    let handle = map.try_clone().expect("map is alive");
                    let view = handle.view().expect("storage is live");
                    let sum: f32 = view.weights(10).iter().step_by(4).sum();
                    assert!((sum - 1.0).abs() < 1e-5);
                }
            });
        }
    });

    assert_eq!(map.ref_count(), 1);
    assert_eq!(cache.pools().weights.stats().returned_buffers, returned);
    drop(map);
    assert_eq!(cache.pools().weights.stats().returned_buffers, returned + 1);
}

#[test]
fn box_filter_downscale_by_two_averages_pairs() {
    let cache = pools::<i32>();
    let s = InterpolationSettings::new(Arc::new(BoxInterpolator), 1.0).unwrap();
    let map = build_map::<i32>(8, 4, &s, 1, 0.0, cache.pools()).unwrap();
    let view = map.view().unwrap();
    for i in 1..3 {
        let w = view.weights(i);
        let nonzero: Vec<i32> = w.iter().copied().filter(|&v| v != 0).collect();
        assert_eq!(nonzero, vec![UQ15_ONE / 2, UQ15_ONE / 2], "i={i}");
    }
}
