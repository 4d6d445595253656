use super::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn cubic_family_values() {
    let cr = CubicInterpolator::catmull_rom();
    assert_eq!(cr.support(), 2.0);
    assert!(close(cr.value(0.0), 1.0));
    assert!(close(cr.value(1.0), 0.0));
    assert!(close(cr.value(2.0), 0.0));
    assert!(cr.value(1.5) < 0.0);

    let m = CubicInterpolator::mitchell();
    assert!(close(m.value(0.0), 8.0 / 9.0));

    let hermite = CubicInterpolator::new(0.0, 0.0);
    assert_eq!(hermite.support(), 1.0);
}

#[test]
fn lanczos_and_spline_interpolate_integers() {
    let l = LanczosInterpolator::new(3).unwrap();
    assert_eq!(l.support(), 3.0);
    assert!(close(l.value(0.0), 1.0));
    assert!(l.value(1.0).abs() < 1e-12);
    assert!(l.value(2.0).abs() < 1e-12);
    assert_eq!(l.value(3.0), 0.0);
    assert!(LanczosInterpolator::new(0).is_err());

    let s = Spline36Interpolator;
    assert!(close(s.value(0.0), 1.0));
    assert!(close(s.value(1.0), 0.0));
    assert!(close(s.value(2.0), 0.0));
    assert_eq!(s.value(3.5), 0.0);
}

#[test]
fn simple_filters() {
    assert_eq!(PointInterpolator.value(0.3), 1.0);
    assert!(PointInterpolator.support() < 0.1);
    assert_eq!(BoxInterpolator.value(0.5), 1.0);
    assert_eq!(BoxInterpolator.value(0.51), 0.0);
    assert!(close(LinearInterpolator.value(0.25), 0.75));
    assert_eq!(LinearInterpolator.value(1.5), 0.0);
}

#[test]
fn gaussian_support_and_singletons() {
    let g = GaussianInterpolator::new(2.0).unwrap();
    assert_eq!(g.support(), 6.0);
    assert!(g.value(0.0) > g.value(1.0));
    assert!(GaussianInterpolator::new(0.0).is_err());

    for r in CACHED_BLUR_RADII {
        let a = gaussian(r).unwrap();
        let b = gaussian(r).unwrap();
        assert!(Arc::ptr_eq(&a, &b), "radius {r}");
        assert!(close(a.support(), r * 3.0));
    }
    let a = gaussian(0.8).unwrap();
    let b = gaussian(0.8).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.unique_id(), b.unique_id());
}

#[test]
fn identities_follow_parameters() {
    let l2 = LanczosInterpolator::new(2).unwrap();
    let l3 = LanczosInterpolator::new(3).unwrap();
    assert_ne!(l2.unique_id(), l3.unique_id());
    assert_eq!(
        l3.unique_id(),
        LanczosInterpolator::new(3).unwrap().unique_id()
    );
    assert_ne!(
        CubicInterpolator::catmull_rom().unique_id(),
        CubicInterpolator::mitchell().unique_id()
    );
    assert_ne!(BoxInterpolator.unique_id(), PointInterpolator.unique_id());
}

#[test]
fn settings_validation_and_presets() {
    assert!(InterpolationSettings::new(Arc::new(LinearInterpolator), 0.0).is_err());
    assert!(InterpolationSettings::new(Arc::new(LinearInterpolator), f64::NAN).is_err());
    assert!(InterpolationSettings::nearest().is_point_sampler());
    assert!(!InterpolationSettings::average().is_point_sampler());
    assert_eq!(InterpolationSettings::default().blur, 1.0);
    assert_eq!(InterpolationSettings::lanczos().weighting_function.support(), 3.0);
}

#[test]
fn filter_kind_from_json() {
    let kind: FilterKind = serde_json::from_str(r#"{"kind":"lanczos","lobes":2}"#).unwrap();
    assert_eq!(kind, FilterKind::Lanczos { lobes: 2 });
    let settings = kind.to_settings(1.5).unwrap();
    assert_eq!(settings.blur, 1.5);
    assert_eq!(settings.weighting_function.support(), 2.0);

    let kind: FilterKind = serde_json::from_str(r#"{"kind":"catmull_rom"}"#).unwrap();
    assert_eq!(kind, FilterKind::CatmullRom);
    assert!(FilterKind::Lanczos { lobes: 0 }.to_settings(1.0).is_err());
}
